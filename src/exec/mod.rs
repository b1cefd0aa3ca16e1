// src/exec/mod.rs

//! Execution layer.
//!
//! - [`backend`] provides the `RunBackend` trait and the `GraphBackend` the
//!   runtime uses in production, which tests can replace with a fake.
//! - [`filter`] runs external stdin-to-stdout tools (the script minifier).

pub mod backend;
pub mod filter;

pub use backend::{GraphBackend, RunBackend};
pub use filter::{run_filter, FilterOutput};
