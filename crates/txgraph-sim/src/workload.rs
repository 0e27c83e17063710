//! Workload loading and generation

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use txgraph_primitives::{keccak256, ResourceId};
use txgraph_scheduler::SimpleTransaction;

/// Label of the resource generated transactions contend on
pub const HOT_RESOURCE: &str = "hot";

/// One transaction as written in a workload file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadEntry {
    /// Free-form label, hashed into the transaction identifier
    pub id: String,
    /// Labels of the resources the transaction touches
    #[serde(default)]
    pub resources: Vec<String>,
}

impl WorkloadEntry {
    /// Turn the entry into a schedulable transaction
    pub fn to_transaction(&self) -> SimpleTransaction {
        SimpleTransaction::with_resources(
            keccak256(self.id.as_bytes()),
            self.resources.iter().map(|label| ResourceId::named(label)),
        )
    }
}

/// Load a JSON workload file
pub fn load(path: &Path) -> Result<Vec<WorkloadEntry>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading workload {}", path.display()))?;
    let entries: Vec<WorkloadEntry> = serde_json::from_str(&content)
        .with_context(|| format!("parsing workload {}", path.display()))?;

    let mut seen = HashSet::new();
    for entry in &entries {
        if !seen.insert(entry.id.as_str()) {
            anyhow::bail!("duplicate transaction id in workload: {}", entry.id);
        }
    }
    Ok(entries)
}

/// Random workload: each transaction touches one to three pool resources,
/// and the hot resource with probability `hot_ratio`
pub fn generate(
    count: usize,
    resources: usize,
    hot_ratio: f64,
    seed: u64,
) -> Result<Vec<WorkloadEntry>> {
    if !(0.0..=1.0).contains(&hot_ratio) {
        anyhow::bail!("hot ratio must be within [0, 1], got {}", hot_ratio);
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let pool = resources.max(1);

    let entries = (0..count)
        .map(|i| {
            let touched = rng.gen_range(1..=3);
            let mut labels: Vec<String> = (0..touched)
                .map(|_| format!("slot-{}", rng.gen_range(0..pool)))
                .collect();
            if rng.gen_bool(hot_ratio) {
                labels.push(HOT_RESOURCE.to_string());
            }
            labels.sort();
            labels.dedup();
            WorkloadEntry {
                id: format!("tx-{}", i),
                resources: labels,
            }
        })
        .collect();
    Ok(entries)
}
