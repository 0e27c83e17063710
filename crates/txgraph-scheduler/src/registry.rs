//! Pending registry: resource -> transactions that touch it
//!
//! Submissions only take the shared side of the registry lock and contend
//! per shard inside the `DashMap`s. A drain takes the exclusive side and
//! swaps the whole pending set out, so a drain never observes a
//! transaction registered under some but not all of its resources.

use crate::error::{SchedulerError, SchedulerResult};
use crate::transaction::Transaction;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use txgraph_primitives::{ResourceId, TxHash};

/// Pending transactions accumulated between two drains
struct PendingSet<T> {
    /// Resource -> identifiers of transactions touching it
    by_resource: DashMap<ResourceId, Vec<TxHash>>,
    /// Identifier -> transaction
    transactions: DashMap<TxHash, Arc<T>>,
}

impl<T> Default for PendingSet<T> {
    fn default() -> Self {
        Self {
            by_resource: DashMap::new(),
            transactions: DashMap::new(),
        }
    }
}

impl<T: Transaction> PendingSet<T> {
    fn insert(&self, tx: Arc<T>) -> bool {
        let hash = tx.identifier();
        let resources = tx.conflict_set();

        match self.transactions.entry(hash) {
            Entry::Occupied(_) => {
                tracing::debug!(tx = %hash, "duplicate submission ignored");
                return false;
            }
            Entry::Vacant(slot) => {
                slot.insert(tx);
            }
        }

        // Create the group only when absent; an existing group is extended.
        for resource in resources {
            self.by_resource.entry(resource).or_default().push(hash);
        }
        true
    }

    fn into_snapshot(self) -> PendingSnapshot<T> {
        PendingSnapshot {
            groups: self.by_resource.into_iter().collect(),
            transactions: self.transactions.into_iter().collect(),
        }
    }
}

/// Thread-safe accumulator of submitted transactions
pub struct PendingRegistry<T> {
    pending: RwLock<PendingSet<T>>,
}

impl<T: Transaction> PendingRegistry<T> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            pending: RwLock::new(PendingSet::default()),
        }
    }

    /// Register a transaction under every resource of its conflict set
    ///
    /// Returns `false` if a transaction with the same identifier is already
    /// pending; the registry is left unchanged in that case.
    pub fn submit(&self, tx: Arc<T>) -> bool {
        self.pending.read().insert(tx)
    }

    /// Like [`submit`](Self::submit) but gives up after `timeout`
    pub fn try_submit(&self, tx: Arc<T>, timeout: Duration) -> SchedulerResult<bool> {
        let pending = self
            .pending
            .try_read_for(timeout)
            .ok_or(SchedulerError::RegistryContention {
                operation: "submit",
                waited: timeout,
            })?;
        Ok(pending.insert(tx))
    }

    /// Take everything pending and leave an empty registry behind
    pub fn drain(&self) -> PendingSnapshot<T> {
        let taken = std::mem::take(&mut *self.pending.write());
        taken.into_snapshot()
    }

    /// Like [`drain`](Self::drain) but gives up after `timeout`
    pub fn try_drain(&self, timeout: Duration) -> SchedulerResult<PendingSnapshot<T>> {
        let mut pending = self
            .pending
            .try_write_for(timeout)
            .ok_or(SchedulerError::RegistryContention {
                operation: "drain",
                waited: timeout,
            })?;
        let taken = std::mem::take(&mut *pending);
        drop(pending);
        Ok(taken.into_snapshot())
    }

    /// Number of pending transactions
    pub fn pending_count(&self) -> usize {
        self.pending.read().transactions.len()
    }

    /// Number of resources with at least one pending transaction
    pub fn resource_count(&self) -> usize {
        self.pending.read().by_resource.len()
    }

    /// Check if nothing is pending
    pub fn is_empty(&self) -> bool {
        self.pending_count() == 0
    }
}

impl<T: Transaction> Default for PendingRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Drained registry contents, owned by one scheduling run
pub struct PendingSnapshot<T> {
    groups: HashMap<ResourceId, Vec<TxHash>>,
    transactions: HashMap<TxHash, Arc<T>>,
}

impl<T> PendingSnapshot<T> {
    /// Number of transactions in the snapshot
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// Check if the snapshot holds no transactions
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Number of resource groups
    pub fn resource_count(&self) -> usize {
        self.groups.len()
    }

    /// Transactions registered under `resource`
    pub fn group(&self, resource: &ResourceId) -> Option<&[TxHash]> {
        self.groups.get(resource).map(Vec::as_slice)
    }

    /// All resource groups
    pub fn groups(&self) -> impl Iterator<Item = (&ResourceId, &[TxHash])> {
        self.groups.iter().map(|(r, txs)| (r, txs.as_slice()))
    }

    /// Identifiers of all transactions
    pub fn hashes(&self) -> impl Iterator<Item = &TxHash> {
        self.transactions.keys()
    }

    /// Look up a transaction
    pub fn get(&self, hash: &TxHash) -> Option<&Arc<T>> {
        self.transactions.get(hash)
    }

    /// Split into identifier -> transaction lookup
    pub fn into_transactions(self) -> HashMap<TxHash, Arc<T>> {
        self.transactions
    }
}
