//! Single-threaded priority reduction
//!
//! Components wait in a max-priority queue keyed by the degree of their
//! pivot inside the component. The most contended component is handled
//! first: a bipartite one runs its `+1` then its `-1` phase, any other
//! one executes its pivot alone and is decomposed again.

use super::{execute_guarded, lookup, TransactionExecutor, TransactionTable};
use crate::error::{SchedulerError, SchedulerResult};
use crate::graph::{ConflictGraph, DegreeTable};
use crate::partition::{decompose, Component, ComponentPlan};
use crate::report::CycleReport;
use crate::transaction::Transaction;
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};
use std::marker::PhantomData;
use std::time::Instant;
use txgraph_primitives::TxHash;

/// Queue entry: higher degree first, then earlier insertion
#[derive(Debug, PartialEq, Eq)]
struct QueueEntry {
    degree: usize,
    seq: Reverse<u64>,
    pivot: TxHash,
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.degree, self.seq, self.pivot).cmp(&(other.degree, other.seq, other.pivot))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Pending components of one run
#[derive(Default)]
struct ReductionQueue {
    heap: BinaryHeap<QueueEntry>,
    by_pivot: HashMap<TxHash, Component>,
    next_seq: u64,
}

impl ReductionQueue {
    fn push(&mut self, component: Component) {
        let pivot = component.pivot();
        let degree = component.graph().degree(&pivot);
        self.heap.push(QueueEntry {
            degree,
            seq: Reverse(self.next_seq),
            pivot,
        });
        self.next_seq += 1;
        self.by_pivot.insert(pivot, component);
    }

    fn pop(&mut self) -> Option<SchedulerResult<Component>> {
        let entry = self.heap.pop()?;
        Some(self.by_pivot.remove(&entry.pivot).ok_or_else(|| {
            SchedulerError::GraphInconsistency(format!(
                "queued pivot {} has no component",
                entry.pivot
            ))
        }))
    }
}

/// Sequential execution driver
pub struct SequentialDriver<'a, T, E> {
    transactions: &'a TransactionTable<T>,
    executor: &'a E,
    verify: bool,
    _marker: PhantomData<fn(&T)>,
}

impl<'a, T, E> SequentialDriver<'a, T, E>
where
    T: Transaction,
    E: TransactionExecutor<T>,
{
    /// Create a driver over the transactions of one drained snapshot
    pub fn new(transactions: &'a TransactionTable<T>, executor: &'a E) -> Self {
        Self {
            transactions,
            executor,
            verify: true,
            _marker: PhantomData,
        }
    }

    /// Toggle coloring checks on every component
    pub fn verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Execute every vertex of `graph` exactly once
    pub fn run(&self, graph: ConflictGraph) -> SchedulerResult<CycleReport> {
        let started = Instant::now();
        let degrees = graph.degree_table();

        let mut report = CycleReport::default();
        report.stats.transactions = graph.vertex_count();
        report.stats.edges = graph.edge_count();

        let mut queue = ReductionQueue::default();
        self.enqueue(&graph, &degrees, &mut queue, &mut report);
        drop(graph);

        while let Some(component) = queue.pop() {
            let component = component?;
            if self.verify {
                component.verify_coloring()?;
            }

            match component.plan() {
                ComponentPlan::TwoPhase { first, second } => {
                    for phase in [first, second] {
                        report.stats.record_phase(phase.len());
                        for hash in phase {
                            self.execute(hash, &mut report)?;
                        }
                    }
                }
                ComponentPlan::Solo { pivot } => {
                    tracing::debug!(tx = %pivot, size = component.len(), "solo execution");
                    report.stats.solo_executions += 1;
                    self.execute(pivot, &mut report)?;
                    let remainder = component.into_remainder();
                    self.enqueue(&remainder, &degrees, &mut queue, &mut report);
                }
            }
        }

        report.stats.elapsed = started.elapsed();
        Ok(report)
    }

    fn enqueue(
        &self,
        graph: &ConflictGraph,
        degrees: &DegreeTable,
        queue: &mut ReductionQueue,
        report: &mut CycleReport,
    ) {
        for component in decompose(graph, degrees) {
            report.stats.components += 1;
            queue.push(component);
        }
    }

    fn execute(&self, hash: TxHash, report: &mut CycleReport) -> SchedulerResult<()> {
        let tx = lookup(self.transactions, &hash)?;
        let outcome = execute_guarded(self.executor, tx.as_ref());
        report.record(hash, outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExecutionError;
    use crate::report::TxOutcome;
    use crate::transaction::SimpleTransaction;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use txgraph_primitives::ResourceId;

    fn h(n: u64) -> TxHash {
        TxHash::from_low_u64(n)
    }

    struct Recorder {
        order: Mutex<Vec<TxHash>>,
        fail: Vec<TxHash>,
    }

    impl Recorder {
        fn new() -> Self {
            Self {
                order: Mutex::new(Vec::new()),
                fail: Vec::new(),
            }
        }
    }

    impl TransactionExecutor<SimpleTransaction> for Recorder {
        fn execute(&self, tx: &SimpleTransaction) -> Result<(), ExecutionError> {
            self.order.lock().push(tx.identifier());
            if self.fail.contains(&tx.identifier()) {
                return Err(ExecutionError::new("reverted"));
            }
            Ok(())
        }
    }

    /// Build the table and graph the way a drained registry would
    fn fixture(txs: &[(u64, &[&str])]) -> (TransactionTable<SimpleTransaction>, ConflictGraph) {
        let registry = crate::registry::PendingRegistry::new();
        for (id, resources) in txs {
            registry.submit(Arc::new(SimpleTransaction::with_resources(
                h(*id),
                resources.iter().map(|r| ResourceId::named(r)),
            )));
        }
        let snapshot = registry.drain();
        let graph = ConflictGraph::build(&snapshot);
        (snapshot.into_transactions(), graph)
    }

    #[test]
    fn test_empty_graph() {
        let (table, graph) = fixture(&[]);
        let recorder = Recorder::new();
        let report = SequentialDriver::new(&table, &recorder).run(graph).unwrap();

        assert!(report.is_empty());
        assert_eq!(report.stats.components, 0);
        assert!(recorder.order.lock().is_empty());
    }

    #[test]
    fn test_triangle_pivot_runs_first() {
        let (table, graph) = fixture(&[(1, &["r"]), (2, &["r"]), (3, &["r"])]);
        let recorder = Recorder::new();
        let report = SequentialDriver::new(&table, &recorder).run(graph).unwrap();

        assert_eq!(report.len(), 3);
        assert!(report.is_clean());
        assert_eq!(report.stats.solo_executions, 1);
        // Remaining edge 2-3 is a bipartite pair: two phases
        assert_eq!(report.stats.color_phases, 2);
        assert_eq!(*recorder.order.lock(), vec![h(1), h(2), h(3)]);
    }

    #[test]
    fn test_path_runs_positive_phase_first() {
        let (table, graph) = fixture(&[(1, &["a"]), (2, &["a", "b"]), (3, &["b"])]);
        let recorder = Recorder::new();
        let report = SequentialDriver::new(&table, &recorder).run(graph).unwrap();

        assert_eq!(report.stats.solo_executions, 0);
        assert_eq!(report.stats.widest_phase, 2);
        assert_eq!(*recorder.order.lock(), vec![h(1), h(3), h(2)]);
    }

    #[test]
    fn test_most_contended_component_first() {
        // K4 on "hot" (pivot degree 3) and a separate pair on "cold"
        let (table, graph) = fixture(&[
            (10, &["cold"]),
            (11, &["cold"]),
            (1, &["hot"]),
            (2, &["hot"]),
            (3, &["hot"]),
            (4, &["hot"]),
        ]);
        let recorder = Recorder::new();
        let report = SequentialDriver::new(&table, &recorder).run(graph).unwrap();

        assert_eq!(report.len(), 6);
        let order = recorder.order.lock();
        assert_eq!(order[0], h(1));
        // K4 -> K3 -> pair; the pair of degree-1 pivots ties with the cold
        // pair and the cold pair was queued first
        assert_eq!(report.stats.solo_executions, 2);
    }

    #[test]
    fn test_failure_does_not_stop_reduction() {
        let (table, graph) = fixture(&[(1, &["r"]), (2, &["r"]), (3, &["r"]), (4, &["r"])]);
        let mut recorder = Recorder::new();
        recorder.fail = vec![h(1)];
        let report = SequentialDriver::new(&table, &recorder).run(graph).unwrap();

        assert_eq!(report.len(), 4);
        let failures: Vec<_> = report.failures().map(|(hash, _)| *hash).collect();
        assert_eq!(failures, vec![h(1)]);
        assert_eq!(report.succeeded().count(), 3);
    }

    #[test]
    fn test_missing_transaction_aborts() {
        let (table, mut graph) = fixture(&[(1, &["r"])]);
        graph.add_vertex(h(99));
        let recorder = Recorder::new();

        let err = SequentialDriver::new(&table, &recorder)
            .run(graph)
            .unwrap_err();
        assert!(matches!(err, SchedulerError::GraphInconsistency(_)));
    }

    #[test]
    fn test_queue_entry_ordering_agrees_with_equality() {
        let entry = |pivot| QueueEntry {
            degree: 2,
            seq: Reverse(5),
            pivot: h(pivot),
        };

        assert_ne!(entry(1), entry(2));
        assert_ne!(entry(1).cmp(&entry(2)), Ordering::Equal);
        assert_eq!(entry(1).cmp(&entry(1)), Ordering::Equal);
        assert_eq!(entry(1), entry(1));
    }

    #[test]
    fn test_queue_orders_by_degree_then_insertion() {
        let mut queue = ReductionQueue::default();

        let mut pair = ConflictGraph::new();
        pair.add_edge(h(1), h(2));
        let mut star = ConflictGraph::new();
        star.add_edge(h(10), h(11));
        star.add_edge(h(10), h(12));
        let mut other_pair = ConflictGraph::new();
        other_pair.add_edge(h(20), h(21));

        for graph in [&pair, &star, &other_pair] {
            for component in decompose(graph, &graph.degree_table()) {
                queue.push(component);
            }
        }

        let pivots: Vec<TxHash> = std::iter::from_fn(|| queue.pop())
            .map(|c| c.unwrap().pivot())
            .collect();
        assert_eq!(pivots, vec![h(10), h(1), h(20)]);
    }

    #[test]
    fn test_every_outcome_recorded_once() {
        let (table, graph) = fixture(&[
            (1, &["a", "b"]),
            (2, &["b", "c"]),
            (3, &["c", "a"]),
            (4, &["a"]),
            (5, &["d"]),
        ]);
        let recorder = Recorder::new();
        let report = SequentialDriver::new(&table, &recorder).run(graph).unwrap();

        assert_eq!(report.len(), 5);
        assert!(report.outcomes.values().all(|o| *o == TxOutcome::Executed));
        let mut order = recorder.order.lock().clone();
        order.sort();
        order.dedup();
        assert_eq!(order.len(), 5);
    }
}
