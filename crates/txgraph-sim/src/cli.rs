//! CLI argument parsing for txgraph-sim

use clap::Parser;
use std::path::PathBuf;
use txgraph_scheduler::Strategy;

/// Run one scheduling cycle over a synthetic or recorded workload
#[derive(Parser, Debug, Clone)]
#[command(name = "txgraph-sim")]
#[command(about = "Conflict-graph scheduler simulator")]
#[command(version)]
pub struct Cli {
    /// Workload file: JSON list of { "id": label, "resources": [labels] }
    #[arg(long, conflicts_with = "generate")]
    pub workload: Option<PathBuf>,

    /// Generate this many random transactions instead of loading a file
    #[arg(long)]
    pub generate: Option<usize>,

    /// Resource pool size for generated workloads
    #[arg(long, default_value = "64")]
    pub resources: usize,

    /// Share of generated transactions that also touch the hot resource
    #[arg(long, default_value = "0.1")]
    pub hot_ratio: f64,

    /// RNG seed for generated workloads
    #[arg(long, default_value = "7")]
    pub seed: u64,

    /// Scheduler config file (TOML); flags below override it
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Execution driver (sequential, fan_out)
    #[arg(long)]
    pub strategy: Option<Strategy>,

    /// Maximum concurrent executions
    #[arg(long)]
    pub parallelism: Option<usize>,

    /// Simulated execution time per transaction, in microseconds
    #[arg(long, default_value = "200")]
    pub exec_micros: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Print the report and metrics as JSON
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
