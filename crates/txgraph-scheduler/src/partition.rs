//! Connected components, 2-coloring and pivot selection
//!
//! One depth-first pass per component collects the induced subgraph,
//! colors it, tracks bipartiteness and picks the most contended vertex.
//! Bipartite components run as two conflict-free phases; any other
//! component serializes its pivot and is decomposed again.

use crate::error::{SchedulerError, SchedulerResult};
use crate::graph::{ConflictGraph, DegreeTable};
use std::collections::{BTreeMap, HashSet};
use txgraph_primitives::TxHash;

/// Vertex label of a 2-coloring
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Color {
    /// `+1`, assigned to the traversal seed
    Positive,
    /// `-1`
    Negative,
}

impl Color {
    /// The other color
    pub fn opposite(self) -> Self {
        match self {
            Color::Positive => Color::Negative,
            Color::Negative => Color::Positive,
        }
    }

    /// `+1` or `-1`
    pub fn sign(self) -> i8 {
        match self {
            Color::Positive => 1,
            Color::Negative => -1,
        }
    }
}

/// How a component is driven to completion
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ComponentPlan {
    /// Two independent sets: all of `first`, barrier, all of `second`
    TwoPhase {
        /// Vertices colored `+1`
        first: Vec<TxHash>,
        /// Vertices colored `-1`
        second: Vec<TxHash>,
    },
    /// Execute `pivot` alone, then decompose what is left
    Solo {
        /// Highest-degree vertex of the component
        pivot: TxHash,
    },
}

/// Maximal connected subgraph with its traversal results
#[derive(Clone, Debug)]
pub struct Component {
    graph: ConflictGraph,
    colors: BTreeMap<TxHash, Color>,
    bipartite: bool,
    pivot: TxHash,
}

impl Component {
    /// Induced subgraph
    pub fn graph(&self) -> &ConflictGraph {
        &self.graph
    }

    /// Color of every vertex
    pub fn colors(&self) -> &BTreeMap<TxHash, Color> {
        &self.colors
    }

    /// Color of one vertex
    pub fn color(&self, vertex: &TxHash) -> Option<Color> {
        self.colors.get(vertex).copied()
    }

    /// No edge joins two vertices of the same color
    pub fn is_bipartite(&self) -> bool {
        self.bipartite
    }

    /// Highest snapshot-degree vertex, first encountered on ties
    pub fn pivot(&self) -> TxHash {
        self.pivot
    }

    /// Number of vertices
    pub fn len(&self) -> usize {
        self.graph.vertex_count()
    }

    /// Always false for components produced by [`decompose`]
    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    /// Vertices of one color, ascending
    pub fn phase(&self, color: Color) -> Vec<TxHash> {
        self.colors
            .iter()
            .filter(|(_, c)| **c == color)
            .map(|(vertex, _)| *vertex)
            .collect()
    }

    /// Classify the component
    pub fn plan(&self) -> ComponentPlan {
        if self.bipartite {
            ComponentPlan::TwoPhase {
                first: self.phase(Color::Positive),
                second: self.phase(Color::Negative),
            }
        } else {
            ComponentPlan::Solo { pivot: self.pivot }
        }
    }

    /// Subgraph with the pivot removed
    pub fn into_remainder(self) -> ConflictGraph {
        let mut graph = self.graph;
        graph.remove_vertex(&self.pivot);
        graph
    }

    /// Check that the coloring covers the subgraph and, for a bipartite
    /// component, that every edge joins opposite colors
    pub fn verify_coloring(&self) -> SchedulerResult<()> {
        for vertex in self.graph.vertices() {
            if !self.colors.contains_key(vertex) {
                return Err(SchedulerError::GraphInconsistency(format!(
                    "vertex {} has no color",
                    vertex
                )));
            }
        }
        if self.bipartite {
            for (a, b) in self.graph.edges() {
                if self.colors.get(&a) == self.colors.get(&b) {
                    return Err(SchedulerError::GraphInconsistency(format!(
                        "edge {} - {} joins equal colors in a bipartite component",
                        a, b
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Split `graph` into connected components
///
/// Seeds are taken in ascending hash order. `degrees` should come from
/// the full snapshot graph, not from the (possibly reduced) `graph`.
pub fn decompose(graph: &ConflictGraph, degrees: &DegreeTable) -> Vec<Component> {
    let mut visited: HashSet<TxHash> = HashSet::with_capacity(graph.vertex_count());
    let mut components = Vec::new();

    for seed in graph.vertices() {
        if visited.contains(seed) {
            continue;
        }
        components.push(traverse(graph, degrees, *seed, &mut visited));
    }

    components
}

/// Iterative DFS from `seed` over its component
fn traverse(
    graph: &ConflictGraph,
    degrees: &DegreeTable,
    seed: TxHash,
    visited: &mut HashSet<TxHash>,
) -> Component {
    let mut subgraph = ConflictGraph::new();
    let mut colors = BTreeMap::new();
    let mut stack = vec![seed];

    subgraph.add_vertex(seed);
    colors.insert(seed, Color::Positive);
    visited.insert(seed);

    let mut pivot = seed;
    let mut pivot_degree = degrees.get(&seed);
    let mut bipartite = true;

    while let Some(current) = stack.pop() {
        let degree = degrees.get(&current);
        if degree > pivot_degree {
            pivot = current;
            pivot_degree = degree;
        }

        let expected = colors
            .get(&current)
            .copied()
            .unwrap_or(Color::Positive)
            .opposite();

        for neighbor in graph.neighbors(&current) {
            match colors.get(neighbor) {
                Some(color) if *color != expected => bipartite = false,
                Some(_) => {}
                None => {
                    colors.insert(*neighbor, expected);
                    visited.insert(*neighbor);
                    subgraph.add_vertex(*neighbor);
                    stack.push(*neighbor);
                }
            }
            subgraph.add_edge(current, *neighbor);
        }
    }

    Component {
        graph: subgraph,
        colors,
        bipartite,
        pivot,
    }
}
