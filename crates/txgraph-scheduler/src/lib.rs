//! # txgraph-scheduler
//!
//! Conflict-graph scheduling for parallel transaction execution.
//!
//! Transactions declare the resources they touch. Two transactions that
//! share a resource conflict and never execute at the same time. Each
//! scheduling cycle drains the pending set into a conflict graph, splits
//! it into connected components and drives every component to completion:
//!
//! - a bipartite component runs as two parallel color phases
//! - any other component executes its highest-degree transaction alone
//!   and is decomposed again
//!
//! Features:
//! - Concurrent pending registry with atomic drain
//! - Conflict graph construction and validation
//! - DFS component decomposition with 2-coloring
//! - Sequential and tokio fan-out execution drivers
//! - Cycle reports and lifetime metrics

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod driver;
mod error;
mod graph;
mod manager;
mod metrics;
mod partition;
mod registry;
mod report;
mod transaction;

pub use config::{SchedulerConfig, Strategy, DEFAULT_PARALLELISM};
pub use driver::{FanOutDriver, SequentialDriver, TransactionExecutor, TransactionTable};
pub use error::{ExecutionError, SchedulerError, SchedulerResult};
pub use graph::{ConflictGraph, DegreeTable};
pub use manager::ExecutionManager;
pub use metrics::{Histogram, MetricsSnapshot, SchedulerMetrics};
pub use partition::{decompose, Color, Component, ComponentPlan};
pub use registry::{PendingRegistry, PendingSnapshot};
pub use report::{CycleReport, CycleStats, TxOutcome};
pub use transaction::{SimpleTransaction, Transaction};
