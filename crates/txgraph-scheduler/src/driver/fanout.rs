//! Recursive tokio fan-out
//!
//! Every connected component is driven by its own task. A bipartite
//! component runs its `+1` vertices concurrently, waits for all of them,
//! then runs its `-1` vertices. Any other component executes its pivot
//! alone and fans out again over what is left. Executor calls run on the
//! blocking pool, bounded by a shared semaphore.

use super::{execute_guarded, lookup, task_failed, TransactionExecutor, TransactionTable};
use crate::error::{SchedulerError, SchedulerResult};
use crate::graph::{ConflictGraph, DegreeTable};
use crate::partition::{decompose, Component, ComponentPlan};
use crate::report::{CycleReport, CycleStats, TxOutcome};
use crate::transaction::Transaction;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use txgraph_primitives::TxHash;

type DriveFuture = Pin<Box<dyn Future<Output = SchedulerResult<DriveOutput>> + Send + 'static>>;

/// Results of one subtree of the fan-out
#[derive(Debug, Default)]
struct DriveOutput {
    outcomes: Vec<(TxHash, TxOutcome)>,
    stats: CycleStats,
}

impl DriveOutput {
    fn merge(&mut self, other: DriveOutput) {
        self.outcomes.extend(other.outcomes);
        self.stats.absorb(&other.stats);
    }
}

/// State shared by every task of one run
struct DriveContext<T, E> {
    transactions: Arc<TransactionTable<T>>,
    executor: Arc<E>,
    permits: Arc<Semaphore>,
    degrees: Arc<DegreeTable>,
    verify: bool,
}

/// Concurrent execution driver
pub struct FanOutDriver<T, E> {
    transactions: Arc<TransactionTable<T>>,
    executor: Arc<E>,
    max_parallelism: usize,
    verify: bool,
}

impl<T, E> FanOutDriver<T, E>
where
    T: Transaction,
    E: TransactionExecutor<T>,
{
    /// Create a driver; at most `max_parallelism` executor calls overlap
    pub fn new(
        transactions: Arc<TransactionTable<T>>,
        executor: Arc<E>,
        max_parallelism: usize,
    ) -> Self {
        Self {
            transactions,
            executor,
            max_parallelism,
            verify: true,
        }
    }

    /// Toggle coloring checks on every component
    pub fn verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Execute every vertex of `graph` exactly once
    ///
    /// Must be awaited inside a tokio runtime.
    pub async fn run(self, graph: ConflictGraph) -> SchedulerResult<CycleReport> {
        if self.max_parallelism == 0 {
            return Err(SchedulerError::Config(
                "max_parallelism must be at least 1".to_string(),
            ));
        }

        let started = Instant::now();
        let mut report = CycleReport::default();
        report.stats.transactions = graph.vertex_count();
        report.stats.edges = graph.edge_count();

        let ctx = Arc::new(DriveContext {
            transactions: self.transactions,
            executor: self.executor,
            permits: Arc::new(Semaphore::new(self.max_parallelism)),
            degrees: graph.degree_table(),
            verify: self.verify,
        });

        let output = fan_out(ctx, graph).await?;
        for (hash, outcome) in output.outcomes {
            report.record(hash, outcome)?;
        }
        report.stats.absorb(&output.stats);
        report.stats.elapsed = started.elapsed();
        Ok(report)
    }
}

/// Decompose `graph` and drive each component on its own task
fn fan_out<T, E>(ctx: Arc<DriveContext<T, E>>, graph: ConflictGraph) -> DriveFuture
where
    T: Transaction,
    E: TransactionExecutor<T>,
{
    Box::pin(async move {
        let components = decompose(&graph, &ctx.degrees);
        drop(graph);

        let mut output = DriveOutput::default();
        output.stats.components = components.len();

        let mut tasks = JoinSet::new();
        for component in components {
            tasks.spawn(drive_component(Arc::clone(&ctx), component));
        }
        while let Some(joined) = tasks.join_next().await {
            output.merge(joined.map_err(task_failed)??);
        }
        Ok(output)
    })
}

fn drive_component<T, E>(ctx: Arc<DriveContext<T, E>>, component: Component) -> DriveFuture
where
    T: Transaction,
    E: TransactionExecutor<T>,
{
    Box::pin(async move {
        if ctx.verify {
            component.verify_coloring()?;
        }

        let mut output = DriveOutput::default();
        match component.plan() {
            ComponentPlan::TwoPhase { first, second } => {
                for phase in [first, second] {
                    output.stats.record_phase(phase.len());
                    let outcomes = run_phase(&ctx, phase).await?;
                    output.outcomes.extend(outcomes);
                }
            }
            ComponentPlan::Solo { pivot } => {
                tracing::debug!(tx = %pivot, size = component.len(), "solo execution");
                output.stats.solo_executions += 1;
                let outcomes = run_phase(&ctx, vec![pivot]).await?;
                output.outcomes.extend(outcomes);

                let rest = fan_out(Arc::clone(&ctx), component.into_remainder()).await?;
                output.merge(rest);
            }
        }
        Ok(output)
    })
}

/// Execute one independent set; returns once every member has finished
async fn run_phase<T, E>(
    ctx: &Arc<DriveContext<T, E>>,
    phase: Vec<TxHash>,
) -> SchedulerResult<Vec<(TxHash, TxOutcome)>>
where
    T: Transaction,
    E: TransactionExecutor<T>,
{
    let mut tasks = JoinSet::new();
    for hash in phase {
        let tx = Arc::clone(lookup(&ctx.transactions, &hash)?);
        let executor = Arc::clone(&ctx.executor);
        let permit = Arc::clone(&ctx.permits)
            .acquire_owned()
            .await
            .map_err(|err| SchedulerError::TaskFailed(err.to_string()))?;

        tasks.spawn_blocking(move || {
            let outcome = execute_guarded(executor.as_ref(), tx.as_ref());
            drop(permit);
            (hash, outcome)
        });
    }

    let mut outcomes = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        outcomes.push(joined.map_err(task_failed)?);
    }
    Ok(outcomes)
}
