//! Transaction capability consumed by the scheduler

use std::collections::HashSet;
use txgraph_primitives::{ResourceId, TxHash};

/// What the scheduler needs to know about a transaction
///
/// Any concrete transaction type plugs in by exposing a stable identifier
/// and the set of resources it touches. The scheduler only references
/// transactions for the duration of one scheduling run.
pub trait Transaction: Send + Sync + 'static {
    /// Stable unique identifier
    fn identifier(&self) -> TxHash;

    /// Resources this transaction reads or writes
    fn conflict_set(&self) -> HashSet<ResourceId>;
}

/// Plain transaction: an identifier plus a declared resource footprint
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimpleTransaction {
    hash: TxHash,
    resources: HashSet<ResourceId>,
}

impl SimpleTransaction {
    /// Create a transaction with an empty footprint
    pub fn new(hash: TxHash) -> Self {
        Self {
            hash,
            resources: HashSet::new(),
        }
    }

    /// Create a transaction touching `resources`
    pub fn with_resources(hash: TxHash, resources: impl IntoIterator<Item = ResourceId>) -> Self {
        Self {
            hash,
            resources: resources.into_iter().collect(),
        }
    }

    /// Add one resource to the footprint
    pub fn with_resource(mut self, resource: ResourceId) -> Self {
        self.resources.insert(resource);
        self
    }

    /// Number of declared resources
    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }
}

impl Transaction for SimpleTransaction {
    fn identifier(&self) -> TxHash {
        self.hash
    }

    fn conflict_set(&self) -> HashSet<ResourceId> {
        self.resources.clone()
    }
}

impl<T: Transaction> Transaction for std::sync::Arc<T> {
    fn identifier(&self) -> TxHash {
        (**self).identifier()
    }

    fn conflict_set(&self) -> HashSet<ResourceId> {
        (**self).conflict_set()
    }
}
