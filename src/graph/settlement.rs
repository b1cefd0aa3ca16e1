// src/graph/settlement.rs

use std::fmt;
use std::sync::Arc;

use crate::notifier::ErrorNotification;

/// Final outcome of running a node (leaf or composite).
#[derive(Debug, Clone)]
pub enum Settlement {
    Success,
    /// The task failed in a way the pipeline tolerates; siblings and later
    /// sequence members still run.
    Recovered(ErrorNotification),
    /// The task failed in a way that aborts the enclosing sequence and, at
    /// the top level, the process.
    Fatal(FatalError),
}

impl Settlement {
    pub fn recovered(source: impl Into<String>, message: impl Into<String>) -> Self {
        Settlement::Recovered(ErrorNotification::new(source, message))
    }

    pub fn fatal(node: impl Into<String>, cause: anyhow::Error) -> Self {
        Settlement::Fatal(FatalError::new(node, cause))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Settlement::Success)
    }

    pub fn is_recovered(&self) -> bool {
        matches!(self, Settlement::Recovered(_))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Settlement::Fatal(_))
    }

    pub fn as_fatal(&self) -> Option<&FatalError> {
        match self {
            Settlement::Fatal(err) => Some(err),
            _ => None,
        }
    }
}

/// A failure that aborts the run.
///
/// The cause is shared so the same error can travel up through every
/// enclosing sequence unchanged.
#[derive(Debug, Clone)]
pub struct FatalError {
    node: String,
    cause: Arc<anyhow::Error>,
}

impl FatalError {
    pub fn new(node: impl Into<String>, cause: anyhow::Error) -> Self {
        Self {
            node: node.into(),
            cause: Arc::new(cause),
        }
    }

    /// Label of the leaf that failed.
    pub fn node(&self) -> &str {
        &self.node
    }

    pub fn cause(&self) -> &anyhow::Error {
        &self.cause
    }
}

impl fmt::Display for FatalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}': {:#}", self.node, self.cause)
    }
}

impl std::error::Error for FatalError {}
