// src/notifier/mod.rs

//! Human-facing error notification.
//!
//! Recovered task errors can be routed to a [`Notifier`] by wrapping the task
//! in an [`ErrorBridge`]. The production notifier shows a desktop popup and
//! rings the terminal bell.

use std::fmt;

pub mod bridge;
pub mod desktop;

pub use bridge::ErrorBridge;
pub use desktop::DesktopNotifier;

/// A recoverable task error, as shown to the developer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorNotification {
    /// Tool that produced the error (`sass`, `minify`, `sass-lint`, ...).
    pub source: String,
    pub message: String,
}

impl ErrorNotification {
    pub fn new(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            message: message.into(),
        }
    }

    /// Popup title for this record.
    pub fn title(&self) -> String {
        format!("Build error in {}", self.source)
    }
}

impl fmt::Display for ErrorNotification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source, self.message)
    }
}

/// Sink for error notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, record: &ErrorNotification);
}
