use std::error::Error;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use assetflow::config::ServerSection;
use assetflow::fs::RealFileSystem;
use assetflow::graph::Registry;
use assetflow::tasks::{ServeTask, Task};
use assetflow_test_utils::fakes::ManualWatcher;
use assetflow_test_utils::{init_tracing, test_context, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn section(port: u16, reload_port: u16) -> ServerSection {
    ServerSection {
        host: "127.0.0.1".to_string(),
        port,
        base_dir: ".".to_string(),
        reload_port,
    }
}

async fn get(port: u16, path: &str) -> std::io::Result<String> {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).await?;
    stream
        .write_all(format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").as_bytes())
        .await?;
    let mut response = String::new();
    stream.read_to_string(&mut response).await?;
    Ok(response)
}

#[tokio::test]
async fn serves_files_and_client_script() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    std::fs::write(dir.path().join("index.html"), "<h1>preview</h1>")?;

    // Reserve a free port for the preview server.
    let port = std::net::TcpListener::bind("127.0.0.1:0")?.local_addr()?.port();

    let tc = test_context(
        Registry::new(),
        Arc::new(RealFileSystem),
        Arc::new(ManualWatcher::new()),
        dir.path(),
    );
    let task = ServeTask::new(section(port, 0));

    assert!(with_timeout(task.run(&tc.ctx)).await.is_success());
    let reload_port = tc.ctx.reload.port().expect("live reload must be listening");

    let page = get(port, "/index.html").await?;
    assert!(page.starts_with("HTTP/1.1 200"), "{page}");
    assert!(page.contains("<h1>preview</h1>"));

    let script = get(port, "/livereload.js").await?;
    assert!(script.contains(&reload_port.to_string()), "{script}");

    // Second run is a no-op, not a port clash.
    assert!(with_timeout(task.run(&tc.ctx)).await.is_success());
    Ok(())
}

#[tokio::test]
async fn port_in_use_is_fatal() -> TestResult {
    init_tracing();
    let taken = std::net::TcpListener::bind("127.0.0.1:0")?;
    let port = taken.local_addr()?.port();

    let tc = test_context(
        Registry::new(),
        Arc::new(RealFileSystem),
        Arc::new(ManualWatcher::new()),
        ".",
    );
    let settlement = with_timeout(ServeTask::new(section(port, 0)).run(&tc.ctx)).await;

    let fatal = settlement.as_fatal().expect("bind failure must be fatal");
    assert_eq!(fatal.node(), "serve");
    Ok(())
}
