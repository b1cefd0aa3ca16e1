// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module is responsible for:
//! - Compiling source / watch glob lists (`patterns.rs`).
//! - Wiring up a cross-platform filesystem watcher (`notify`), native or
//!   polling (`watcher.rs`).
//! - Turning batches of changes into runs of a graph node (`binding.rs`).
//!
//! It does **not** run anything itself; it only sends triggers to the
//! runtime.

pub mod binding;
pub mod patterns;
pub mod watcher;

pub use binding::{bind_watch, WatchBinding};
pub use patterns::{glob_base, MatchedFile, PatternSet};
pub use watcher::{
    ChangeEvent, FileWatcher, NotifyFileWatcher, WatchOptions, WatcherHandle,
};
