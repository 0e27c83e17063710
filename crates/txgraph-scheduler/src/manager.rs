//! Execution manager
//!
//! Owns the pending registry and runs scheduling cycles: drain, build the
//! conflict graph, hand it to the configured driver.

use crate::config::{SchedulerConfig, Strategy};
use crate::driver::{task_failed, FanOutDriver, SequentialDriver, TransactionExecutor};
use crate::error::SchedulerResult;
use crate::graph::ConflictGraph;
use crate::metrics::SchedulerMetrics;
use crate::registry::PendingRegistry;
use crate::report::CycleReport;
use crate::transaction::Transaction;
use std::sync::Arc;

/// Registry plus driver for one executor
pub struct ExecutionManager<T, E> {
    registry: Arc<PendingRegistry<T>>,
    executor: Arc<E>,
    config: SchedulerConfig,
    metrics: Arc<SchedulerMetrics>,
}

impl<T, E> ExecutionManager<T, E>
where
    T: Transaction,
    E: TransactionExecutor<T>,
{
    /// Create a manager, rejecting an invalid configuration
    pub fn new(executor: E, config: SchedulerConfig) -> SchedulerResult<Self> {
        Self::with_shared_executor(Arc::new(executor), config)
    }

    /// Create a manager over an executor the caller keeps a handle to
    pub fn with_shared_executor(executor: Arc<E>, config: SchedulerConfig) -> SchedulerResult<Self> {
        config.validate()?;
        Ok(Self {
            registry: Arc::new(PendingRegistry::new()),
            executor,
            config,
            metrics: Arc::new(SchedulerMetrics::new()),
        })
    }

    /// Pending transactions
    pub fn registry(&self) -> &Arc<PendingRegistry<T>> {
        &self.registry
    }

    /// Active configuration
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Lifetime counters
    pub fn metrics(&self) -> &Arc<SchedulerMetrics> {
        &self.metrics
    }

    /// Register a transaction for the next cycle
    ///
    /// Returns `false` for a duplicate identifier.
    pub fn submit(&self, tx: T) -> SchedulerResult<bool> {
        self.submit_shared(Arc::new(tx))
    }

    /// Register an already shared transaction
    pub fn submit_shared(&self, tx: Arc<T>) -> SchedulerResult<bool> {
        match self.config.lock_timeout() {
            Some(timeout) => self.registry.try_submit(tx, timeout),
            None => Ok(self.registry.submit(tx)),
        }
    }

    /// Register a transaction without blocking the async caller on the
    /// registry lock
    pub async fn submit_async(&self, tx: T) -> SchedulerResult<bool> {
        let registry = Arc::clone(&self.registry);
        let timeout = self.config.lock_timeout();
        let tx = Arc::new(tx);

        tokio::task::spawn_blocking(move || match timeout {
            Some(timeout) => registry.try_submit(tx, timeout),
            None => Ok(registry.submit(tx)),
        })
        .await
        .map_err(task_failed)?
    }

    /// Drain everything submitted so far and execute it
    ///
    /// Transactions submitted while the cycle runs wait for the next one.
    pub async fn run_scheduling_cycle(&self) -> SchedulerResult<CycleReport> {
        let result = self.drive().await;
        match &result {
            Ok(report) => {
                self.metrics.record_cycle(report);
                if !report.is_empty() {
                    tracing::info!(
                        txs = report.len(),
                        failed = report.failures().count(),
                        components = report.stats.components,
                        solo = report.stats.solo_executions,
                        elapsed = ?report.stats.elapsed,
                        "scheduling cycle done"
                    );
                }
            }
            Err(e) => {
                self.metrics.record_abort();
                tracing::error!(error = %e, "scheduling cycle aborted");
            }
        }
        result
    }

    async fn drive(&self) -> SchedulerResult<CycleReport> {
        let snapshot = match self.config.lock_timeout() {
            Some(timeout) => self.registry.try_drain(timeout)?,
            None => self.registry.drain(),
        };
        if snapshot.is_empty() {
            return Ok(CycleReport::default());
        }

        let graph = ConflictGraph::build(&snapshot);
        if self.config.validate_graph {
            graph.validate()?;
        }
        let transactions = snapshot.into_transactions();
        let verify = self.config.validate_graph;

        tracing::debug!(
            txs = graph.vertex_count(),
            edges = graph.edge_count(),
            strategy = %self.config.strategy,
            "driving conflict graph"
        );

        match self.config.strategy {
            Strategy::Sequential => {
                let executor = Arc::clone(&self.executor);
                tokio::task::spawn_blocking(move || {
                    SequentialDriver::new(&transactions, executor.as_ref())
                        .verify(verify)
                        .run(graph)
                })
                .await
                .map_err(task_failed)?
            }
            Strategy::FanOut => {
                FanOutDriver::new(
                    Arc::new(transactions),
                    Arc::clone(&self.executor),
                    self.config.max_parallelism,
                )
                .verify(verify)
                .run(graph)
                .await
            }
        }
    }
}
