//! Per-cycle results

use crate::error::{ExecutionError, SchedulerError, SchedulerResult};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use txgraph_primitives::TxHash;

/// What happened to one transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TxOutcome {
    /// The executor returned success
    Executed,
    /// The executor reported a failure
    Failed(ExecutionError),
}

impl TxOutcome {
    /// Returns true if the transaction executed successfully
    pub fn is_success(&self) -> bool {
        matches!(self, TxOutcome::Executed)
    }
}

/// Counters describing how a cycle was driven
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleStats {
    /// Transactions in the drained snapshot
    pub transactions: usize,
    /// Edges of the snapshot conflict graph
    pub edges: usize,
    /// Components examined, re-decompositions included
    pub components: usize,
    /// Transactions executed alone to break a non-bipartite component
    pub solo_executions: usize,
    /// Non-empty color phases executed
    pub color_phases: usize,
    /// Largest color phase
    pub widest_phase: usize,
    /// Wall time of the drive
    pub elapsed: Duration,
}

impl CycleStats {
    /// Fold counters of an independent part of the same cycle into `self`
    pub fn absorb(&mut self, other: &CycleStats) {
        self.components += other.components;
        self.solo_executions += other.solo_executions;
        self.color_phases += other.color_phases;
        self.widest_phase = self.widest_phase.max(other.widest_phase);
    }

    /// Account for one executed color phase of `width` transactions
    pub fn record_phase(&mut self, width: usize) {
        if width == 0 {
            return;
        }
        self.color_phases += 1;
        self.widest_phase = self.widest_phase.max(width);
    }
}

/// Result of one scheduling cycle
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    /// Outcome per transaction
    pub outcomes: BTreeMap<TxHash, TxOutcome>,
    /// Drive counters
    pub stats: CycleStats,
}

impl CycleReport {
    /// Record an outcome; a second outcome for the same transaction is an
    /// internal error
    pub fn record(&mut self, hash: TxHash, outcome: TxOutcome) -> SchedulerResult<()> {
        if self.outcomes.insert(hash, outcome).is_some() {
            return Err(SchedulerError::GraphInconsistency(format!(
                "transaction {} executed twice",
                hash
            )));
        }
        Ok(())
    }

    /// Number of transactions with an outcome
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Check if nothing ran
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Transactions that executed successfully
    pub fn succeeded(&self) -> impl Iterator<Item = &TxHash> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.is_success())
            .map(|(hash, _)| hash)
    }

    /// Transactions the executor rejected, with the reason
    pub fn failures(&self) -> impl Iterator<Item = (&TxHash, &ExecutionError)> {
        self.outcomes.iter().filter_map(|(hash, outcome)| match outcome {
            TxOutcome::Failed(err) => Some((hash, err)),
            TxOutcome::Executed => None,
        })
    }

    /// Check if every transaction succeeded
    pub fn is_clean(&self) -> bool {
        self.outcomes.values().all(TxOutcome::is_success)
    }
}
