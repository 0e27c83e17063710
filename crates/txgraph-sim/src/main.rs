//! txgraph simulator binary
//!
//! Submits a workload concurrently, runs one scheduling cycle and prints
//! the cycle report with a metrics snapshot.

mod cli;
mod workload;

use anyhow::{Context, Result};
use cli::Cli;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use txgraph_scheduler::{
    CycleReport, ExecutionError, ExecutionManager, MetricsSnapshot, SchedulerConfig,
    SimpleTransaction, TransactionExecutor,
};

/// Default size of a generated workload
const DEFAULT_GENERATED: usize = 1_000;

/// Submitting tasks
const SUBMITTERS: usize = 8;

/// Stand-in for state execution: occupies a blocking thread for a fixed time
struct SimulatedExecutor {
    work: Duration,
}

impl TransactionExecutor<SimpleTransaction> for SimulatedExecutor {
    fn execute(&self, _tx: &SimpleTransaction) -> Result<(), ExecutionError> {
        if !self.work.is_zero() {
            std::thread::sleep(self.work);
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let config = build_config(&cli)?;
    tracing::info!(
        "Scheduler config: strategy={} parallelism={}",
        config.strategy,
        config.max_parallelism
    );

    let entries = match &cli.workload {
        Some(path) => workload::load(path)?,
        None => workload::generate(
            cli.generate.unwrap_or(DEFAULT_GENERATED),
            cli.resources,
            cli.hot_ratio,
            cli.seed,
        )?,
    };
    tracing::info!("Workload: {} transactions", entries.len());

    let executor = SimulatedExecutor {
        work: Duration::from_micros(cli.exec_micros),
    };
    let manager = Arc::new(ExecutionManager::new(executor, config)?);

    // Submit from concurrent tasks
    let chunk = entries.len().div_ceil(SUBMITTERS).max(1);
    let mut submitters = JoinSet::new();
    for part in entries.chunks(chunk) {
        let manager = Arc::clone(&manager);
        let part = part.to_vec();
        submitters.spawn(async move {
            let mut accepted = 0usize;
            for entry in part {
                if manager.submit_async(entry.to_transaction()).await? {
                    accepted += 1;
                }
            }
            Ok::<_, txgraph_scheduler::SchedulerError>(accepted)
        });
    }
    let mut accepted = 0;
    while let Some(joined) = submitters.join_next().await {
        accepted += joined.context("submit task failed")??;
    }
    tracing::info!("Submitted {} transactions", accepted);

    let report = manager.run_scheduling_cycle().await?;
    let metrics = manager.metrics().snapshot();

    if cli.json {
        let output = serde_json::json!({
            "report": report,
            "metrics": metrics,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_summary(&report, &metrics);
    }

    Ok(())
}

/// Defaults, then the TOML file, then flags
fn build_config(cli: &Cli) -> Result<SchedulerConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config_file(path)?,
        None => SchedulerConfig::default(),
    };
    if let Some(strategy) = cli.strategy {
        config.strategy = strategy;
    }
    if let Some(parallelism) = cli.parallelism {
        config.max_parallelism = parallelism;
    }
    config.validate()?;
    Ok(config)
}

fn load_config_file(path: &Path) -> Result<SchedulerConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("parsing config {}", path.display()))
}

fn print_summary(report: &CycleReport, metrics: &MetricsSnapshot) {
    let stats = &report.stats;
    println!("Transactions:    {}", report.len());
    println!("Conflict edges:  {}", stats.edges);
    println!("Components:      {}", stats.components);
    println!("Solo executions: {}", stats.solo_executions);
    println!("Color phases:    {}", stats.color_phases);
    println!("Widest phase:    {}", stats.widest_phase);
    println!("Elapsed:         {:?}", stats.elapsed);

    let failures: Vec<_> = report.failures().collect();
    if !failures.is_empty() {
        println!("Failures:        {}", failures.len());
        for (hash, err) in failures {
            println!("  {} {}", hash.short(), err);
        }
    }
    println!("Mean cycle time: {:.1}us over {} cycle(s)", metrics.mean_cycle_us, metrics.cycles);
}
