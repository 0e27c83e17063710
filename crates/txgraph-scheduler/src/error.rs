//! Error types for the scheduler

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use txgraph_primitives::TxHash;

/// Run-level scheduler errors
///
/// A failing transaction is not one of these: it is reported per
/// transaction through [`crate::TxOutcome::Failed`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// Registry lock not acquired within the configured bound
    #[error("registry contention: {operation} did not acquire the lock within {waited:?}")]
    RegistryContention {
        /// `submit` or `drain`
        operation: &'static str,
        /// How long the caller waited
        waited: Duration,
    },

    /// Internal invariant violated while building or partitioning a graph
    #[error("graph inconsistency: {0}")]
    GraphInconsistency(String),

    /// A scheduling task panicked or was cancelled
    #[error("scheduling task failed: {0}")]
    TaskFailed(String),

    /// Invalid scheduler configuration
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SchedulerError {
    /// Edge `(from, to)` points at a vertex the graph does not contain
    pub fn dangling_edge(from: TxHash, to: TxHash) -> Self {
        Self::GraphInconsistency(format!("edge {} -> {} references a missing vertex", from, to))
    }

    /// Recoverable by retrying the same call
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RegistryContention { .. })
    }
}

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Failure reported by the execution collaborator for one transaction
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{reason}")]
pub struct ExecutionError {
    /// Human-readable reason
    pub reason: String,
}

impl ExecutionError {
    /// Create a new execution error
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SchedulerError::RegistryContention {
            operation: "drain",
            waited: Duration::from_millis(5),
        };
        assert!(err.to_string().contains("drain"));
        assert!(err.is_retryable());

        let err = SchedulerError::dangling_edge(TxHash::from_low_u64(1), TxHash::from_low_u64(2));
        assert!(err.to_string().contains("missing vertex"));
        assert!(!err.is_retryable());

        let err = SchedulerError::Config("max_parallelism must be at least 1".into());
        assert!(err.to_string().contains("max_parallelism"));
    }

    #[test]
    fn test_execution_error_display() {
        let err = ExecutionError::new("out of gas");
        assert_eq!(err.to_string(), "out of gas");
        assert_eq!(err, ExecutionError::new(String::from("out of gas")));
    }
}
