// src/server/mod.rs

//! Local preview: a static HTTP server and the live-reload channel.

pub mod http;
pub mod livereload;

pub use http::start_preview;
pub use livereload::{client_script, LiveReload, ReloadSignal};
