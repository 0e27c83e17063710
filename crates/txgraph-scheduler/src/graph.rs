//! Undirected conflict graph over transactions
//!
//! Vertices are transaction identifiers; an edge means the two
//! transactions share at least one resource. Adjacency is kept in ordered
//! maps so every traversal visits vertices in ascending hash order.

use crate::error::{SchedulerError, SchedulerResult};
use crate::registry::PendingSnapshot;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use txgraph_primitives::TxHash;

/// Degree of every vertex, captured once from the full snapshot graph
///
/// Used as the solo-execution heuristic while the graph is reduced, so it
/// reflects how contended a transaction was at snapshot time.
#[derive(Clone, Debug, Default)]
pub struct DegreeTable {
    degrees: HashMap<TxHash, usize>,
}

impl DegreeTable {
    /// Snapshot-time degree, zero for unknown vertices
    pub fn get(&self, vertex: &TxHash) -> usize {
        self.degrees.get(vertex).copied().unwrap_or(0)
    }

    /// Number of vertices recorded
    pub fn len(&self) -> usize {
        self.degrees.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.degrees.is_empty()
    }
}

/// Simple undirected graph (no self loops, no parallel edges)
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConflictGraph {
    adjacency: BTreeMap<TxHash, BTreeSet<TxHash>>,
}

impl ConflictGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the conflict graph of a drained registry
    ///
    /// Every transaction becomes a vertex, including ones with an empty
    /// conflict set. Each resource group is closed into a clique.
    pub fn build<T>(snapshot: &PendingSnapshot<T>) -> Self {
        let mut graph = Self::new();

        for hash in snapshot.hashes() {
            graph.add_vertex(*hash);
        }

        for (_, group) in snapshot.groups() {
            for (i, a) in group.iter().enumerate() {
                graph.add_vertex(*a);
                for b in &group[i + 1..] {
                    graph.add_edge(*a, *b);
                }
            }
        }

        tracing::debug!(
            vertices = graph.vertex_count(),
            edges = graph.edge_count(),
            resources = snapshot.resource_count(),
            "conflict graph built"
        );
        graph
    }

    /// Add a vertex (idempotent)
    pub fn add_vertex(&mut self, vertex: TxHash) {
        self.adjacency.entry(vertex).or_default();
    }

    /// Add an undirected edge, creating missing endpoints
    ///
    /// Self loops are ignored. Returns `true` if the edge is new.
    pub fn add_edge(&mut self, a: TxHash, b: TxHash) -> bool {
        if a == b {
            self.add_vertex(a);
            return false;
        }
        let inserted = self.adjacency.entry(a).or_default().insert(b);
        self.adjacency.entry(b).or_default().insert(a);
        inserted
    }

    /// Remove a vertex and all its incident edges
    ///
    /// Returns `false` if the vertex was not present.
    pub fn remove_vertex(&mut self, vertex: &TxHash) -> bool {
        let Some(neighbors) = self.adjacency.remove(vertex) else {
            return false;
        };
        for neighbor in neighbors {
            if let Some(adjacent) = self.adjacency.get_mut(&neighbor) {
                adjacent.remove(vertex);
            }
        }
        true
    }

    /// Check if the vertex is present
    pub fn contains_vertex(&self, vertex: &TxHash) -> bool {
        self.adjacency.contains_key(vertex)
    }

    /// Check if the undirected edge is present
    pub fn contains_edge(&self, a: &TxHash, b: &TxHash) -> bool {
        self.adjacency
            .get(a)
            .map(|adjacent| adjacent.contains(b))
            .unwrap_or(false)
    }

    /// Degree of a vertex in this graph
    pub fn degree(&self, vertex: &TxHash) -> usize {
        self.adjacency.get(vertex).map(BTreeSet::len).unwrap_or(0)
    }

    /// Neighbors in ascending order
    pub fn neighbors(&self, vertex: &TxHash) -> impl Iterator<Item = &TxHash> {
        self.adjacency.get(vertex).into_iter().flatten()
    }

    /// Vertices in ascending order
    pub fn vertices(&self) -> impl Iterator<Item = &TxHash> {
        self.adjacency.keys()
    }

    /// Each undirected edge once, as `(smaller, larger)`
    pub fn edges(&self) -> impl Iterator<Item = (TxHash, TxHash)> + '_ {
        self.adjacency.iter().flat_map(|(a, adjacent)| {
            adjacent
                .iter()
                .filter(move |b| a < *b)
                .map(move |b| (*a, *b))
        })
    }

    /// Number of vertices
    pub fn vertex_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Number of undirected edges
    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(BTreeSet::len).sum::<usize>() / 2
    }

    /// Check if the graph has no vertices
    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    /// Capture the current degree of every vertex
    pub fn degree_table(&self) -> Arc<DegreeTable> {
        Arc::new(DegreeTable {
            degrees: self
                .adjacency
                .iter()
                .map(|(vertex, adjacent)| (*vertex, adjacent.len()))
                .collect(),
        })
    }

    /// Check structural invariants
    ///
    /// Fails on self loops, edges to missing vertices and edges recorded
    /// on one endpoint only.
    pub fn validate(&self) -> SchedulerResult<()> {
        for (vertex, adjacent) in &self.adjacency {
            for neighbor in adjacent {
                if neighbor == vertex {
                    return Err(SchedulerError::GraphInconsistency(format!(
                        "self loop on {}",
                        vertex
                    )));
                }
                match self.adjacency.get(neighbor) {
                    None => return Err(SchedulerError::dangling_edge(*vertex, *neighbor)),
                    Some(back) if !back.contains(vertex) => {
                        return Err(SchedulerError::GraphInconsistency(format!(
                            "edge {} -> {} has no reverse entry",
                            vertex, neighbor
                        )));
                    }
                    Some(_) => {}
                }
            }
        }
        Ok(())
    }

    /// Insert a directed adjacency entry without its mirror.
    #[cfg(test)]
    pub(crate) fn insert_half_edge(&mut self, from: TxHash, to: TxHash) {
        self.adjacency.entry(from).or_default().insert(to);
    }
}
