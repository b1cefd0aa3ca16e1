// src/graph/mod.rs

//! Task graph: nodes, the registry of named entries and the executor.
//!
//! - [`Node`] is a reference to a named entry, a `Sequence` or a `Parallel`
//!   group.
//! - [`Registry`] holds every named leaf task and named graph.
//! - [`execute`] runs a node to its [`Settlement`].

use std::future::Future;
use std::pin::Pin;

pub mod executor;
pub mod node;
pub mod registry;
pub mod settlement;

pub use executor::execute;
pub use node::Node;
pub use registry::Registry;
pub use settlement::{FatalError, Settlement};

/// Boxed `Send` future, used at every trait-object seam.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
