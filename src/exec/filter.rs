// src/exec/filter.rs

//! External filter commands: bytes in on stdin, bytes out on stdout.

use std::path::Path;
use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Result of a filter run that managed to start.
#[derive(Debug, Clone)]
pub struct FilterOutput {
    pub success: bool,
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: String,
}

/// Run `cmd` through the platform shell in `cwd`, piping `input` to its
/// stdin.
///
/// An `Err` means the command could not be run at all; a non-zero exit is
/// reported through [`FilterOutput::success`].
pub async fn run_filter(cmd: &str, cwd: &Path, input: Vec<u8>) -> Result<FilterOutput> {
    // Build a shell command appropriate for the platform.
    let mut command = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    };

    command
        .current_dir(cwd)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .with_context(|| format!("spawning filter command `{cmd}`"))?;

    // Feed stdin from a separate task so a chatty filter can't deadlock us.
    let stdin = child.stdin.take();
    let writer = tokio::spawn(async move {
        if let Some(mut stdin) = stdin {
            let _ = stdin.write_all(&input).await;
            let _ = stdin.shutdown().await;
        }
    });

    let output = child
        .wait_with_output()
        .await
        .with_context(|| format!("waiting for filter command `{cmd}`"))?;
    let _ = writer.await;

    let exit_code = output.status.code().unwrap_or(-1);
    debug!(cmd, exit_code, bytes = output.stdout.len(), "filter command exited");

    // sh reports a missing program as exit status 127.
    if exit_code == 127 {
        anyhow::bail!(
            "filter command `{cmd}` not found: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(FilterOutput {
        success: output.status.success(),
        exit_code,
        stdout: output.stdout,
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pipes_stdin_to_stdout() {
        let out = run_filter("tr a-z A-Z", Path::new("."), b"abc".to_vec())
            .await
            .unwrap();
        assert!(out.success);
        assert_eq!(out.stdout, b"ABC");
    }

    #[tokio::test]
    async fn nonzero_exit_is_not_an_error() {
        let out = run_filter("echo bad >&2; exit 3", Path::new("."), Vec::new())
            .await
            .unwrap();
        assert!(!out.success);
        assert_eq!(out.exit_code, 3);
        assert_eq!(out.stderr.trim(), "bad");
    }

    #[tokio::test]
    async fn missing_program_is_an_error() {
        let res = run_filter("definitely-not-a-real-tool-xyz", Path::new("."), Vec::new()).await;
        assert!(res.is_err());
    }
}
