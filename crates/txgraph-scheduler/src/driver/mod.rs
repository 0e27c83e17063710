//! Execution drivers
//!
//! - [`SequentialDriver`]: single-threaded priority reduction, the
//!   correctness baseline
//! - [`FanOutDriver`]: tokio fan-out over independent components and
//!   color phases

mod fanout;
mod sequential;

pub use fanout::FanOutDriver;
pub use sequential::SequentialDriver;

use crate::error::{ExecutionError, SchedulerError, SchedulerResult};
use crate::report::TxOutcome;
use crate::transaction::Transaction;
use std::any::Any;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::task::JoinError;
use txgraph_primitives::TxHash;

/// Applies one transaction to state; called exactly once per transaction
/// per scheduling cycle
pub trait TransactionExecutor<T>: Send + Sync + 'static {
    /// Execute `tx`
    fn execute(&self, tx: &T) -> Result<(), ExecutionError>;
}

impl<T, F> TransactionExecutor<T> for F
where
    F: Fn(&T) -> Result<(), ExecutionError> + Send + Sync + 'static,
{
    fn execute(&self, tx: &T) -> Result<(), ExecutionError> {
        self(tx)
    }
}

/// Identifier -> transaction lookup owned by one cycle
pub type TransactionTable<T> = HashMap<TxHash, Arc<T>>;

pub(crate) fn lookup<'a, T>(
    transactions: &'a TransactionTable<T>,
    hash: &TxHash,
) -> SchedulerResult<&'a Arc<T>> {
    transactions.get(hash).ok_or_else(|| {
        SchedulerError::GraphInconsistency(format!("vertex {} has no transaction", hash))
    })
}

/// Run the executor, turning an error or a panic into a failed outcome
pub(crate) fn execute_guarded<T, E>(executor: &E, tx: &T) -> TxOutcome
where
    T: Transaction,
    E: TransactionExecutor<T>,
{
    let hash = tx.identifier();
    match catch_unwind(AssertUnwindSafe(|| executor.execute(tx))) {
        Ok(Ok(())) => {
            tracing::trace!(tx = %hash, "executed");
            TxOutcome::Executed
        }
        Ok(Err(err)) => {
            tracing::warn!(tx = %hash, reason = %err, "execution failed");
            TxOutcome::Failed(err)
        }
        Err(payload) => {
            let reason = format!("executor panicked: {}", panic_message(payload.as_ref()));
            tracing::warn!(tx = %hash, %reason, "execution failed");
            TxOutcome::Failed(ExecutionError::new(reason))
        }
    }
}

pub(crate) fn task_failed(err: JoinError) -> SchedulerError {
    if err.is_panic() {
        SchedulerError::TaskFailed(format!("task panicked: {}", err))
    } else {
        SchedulerError::TaskFailed(format!("task cancelled: {}", err))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
