// src/notifier/desktop.rs

use std::io::Write;

use chrono::Local;
use notify_rust::{Notification, Timeout};
use tokio::runtime::Handle;
use tracing::warn;

use crate::config::NotifierSection;
use crate::notifier::{ErrorNotification, Notifier};

const POPUP_TIMEOUT_MS: u32 = 5000;

/// Desktop popup plus terminal bell.
#[derive(Debug, Clone)]
pub struct DesktopNotifier {
    desktop: bool,
    beep: bool,
}

impl DesktopNotifier {
    pub fn new(desktop: bool, beep: bool) -> Self {
        Self { desktop, beep }
    }

    pub fn from_config(section: &NotifierSection) -> Self {
        Self::new(section.desktop, section.beep)
    }
}

/// Blocks on the session bus until the popup is accepted.
fn show_popup(title: &str, body: &str) {
    let result = Notification::new()
        .summary(title)
        .body(body)
        .timeout(Timeout::Milliseconds(POPUP_TIMEOUT_MS))
        .show();

    if let Err(e) = result {
        warn!("failed to show error notification: {}", e);
    }
}

/// Run `job` on the blocking pool when called from a tokio worker, inline
/// otherwise.
fn off_runtime<F>(job: F)
where
    F: FnOnce() + Send + 'static,
{
    match Handle::try_current() {
        Ok(handle) => {
            handle.spawn_blocking(job);
        }
        Err(_) => job(),
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&self, record: &ErrorNotification) {
        if self.desktop {
            let body = format!(
                "{}\n{}",
                record.message,
                Local::now().format("%H:%M:%S")
            );
            let title = record.title();
            off_runtime(move || show_popup(&title, &body));
        }

        if self.beep {
            let mut stderr = std::io::stderr();
            let _ = stderr.write_all(b"\x07");
            let _ = stderr.flush();
        }
    }
}
