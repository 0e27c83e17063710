//! Property tests for partitioning and both execution drivers
//!
//! Workloads are random transactions over a small resource pool so that
//! dense, sparse, bipartite and odd-cycle components all show up.

use parking_lot::Mutex;
use proptest::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use txgraph_primitives::{ResourceId, TxHash};
use txgraph_scheduler::{
    decompose, ConflictGraph, ExecutionError, FanOutDriver, PendingRegistry, SequentialDriver,
    SimpleTransaction, Transaction, TransactionExecutor, TransactionTable,
};

/// Footprints per transaction, resource indexes into a pool of `pool`
fn arb_workload(max_txs: usize, pool: u8) -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(prop::collection::vec(0..pool, 0..4), 0..max_txs)
}

fn materialize(workload: &[Vec<u8>]) -> (TransactionTable<SimpleTransaction>, ConflictGraph) {
    let registry = PendingRegistry::new();
    for (i, footprint) in workload.iter().enumerate() {
        let tx = SimpleTransaction::with_resources(
            TxHash::from_low_u64(i as u64 + 1),
            footprint
                .iter()
                .map(|r| ResourceId::named(&format!("slot-{}", r))),
        );
        registry.submit(Arc::new(tx));
    }
    let snapshot = registry.drain();
    let graph = ConflictGraph::build(&snapshot);
    (snapshot.into_transactions(), graph)
}

/// Records calls and flags two conflicting transactions in flight together
#[derive(Default)]
struct ConflictDetector {
    in_flight: Mutex<HashMap<ResourceId, TxHash>>,
    overlaps: Mutex<usize>,
    calls: Mutex<Vec<TxHash>>,
}

impl TransactionExecutor<SimpleTransaction> for ConflictDetector {
    fn execute(&self, tx: &SimpleTransaction) -> Result<(), ExecutionError> {
        let resources = tx.conflict_set();
        {
            let mut in_flight = self.in_flight.lock();
            for resource in &resources {
                if in_flight.insert(*resource, tx.identifier()).is_some() {
                    *self.overlaps.lock() += 1;
                }
            }
        }
        std::thread::yield_now();
        {
            let mut in_flight = self.in_flight.lock();
            for resource in &resources {
                in_flight.remove(resource);
            }
        }
        self.calls.lock().push(tx.identifier());
        if tx.identifier().as_bytes()[31] % 7 == 0 {
            return Err(ExecutionError::new("rejected"));
        }
        Ok(())
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn components_partition_the_graph(workload in arb_workload(40, 12)) {
        let (_, graph) = materialize(&workload);
        graph.validate().unwrap();
        let components = decompose(&graph, &graph.degree_table());

        let mut seen = HashSet::new();
        let mut owner = HashMap::new();
        for (idx, component) in components.iter().enumerate() {
            component.verify_coloring().unwrap();
            prop_assert!(!component.is_empty());
            prop_assert!(component.graph().contains_vertex(&component.pivot()));
            for vertex in component.graph().vertices() {
                prop_assert!(seen.insert(*vertex));
                owner.insert(*vertex, idx);
            }
        }
        prop_assert_eq!(seen.len(), graph.vertex_count());

        // No edge crosses two components
        for (a, b) in graph.edges() {
            prop_assert_eq!(owner[&a], owner[&b]);
        }
    }

    #[test]
    fn bipartite_phases_are_independent(workload in arb_workload(40, 12)) {
        let (_, graph) = materialize(&workload);
        for component in decompose(&graph, &graph.degree_table()) {
            if !component.is_bipartite() {
                continue;
            }
            for phase in [component.phase(txgraph_scheduler::Color::Positive),
                          component.phase(txgraph_scheduler::Color::Negative)] {
                for a in &phase {
                    for b in &phase {
                        prop_assert!(!graph.contains_edge(a, b));
                    }
                }
            }
        }
    }

    #[test]
    fn sequential_executes_everything_once(workload in arb_workload(40, 10)) {
        let (table, graph) = materialize(&workload);
        let expected: HashSet<TxHash> = graph.vertices().copied().collect();
        let detector = ConflictDetector::default();

        let report = SequentialDriver::new(&table, &detector).run(graph).unwrap();

        let calls = detector.calls.lock().clone();
        prop_assert_eq!(calls.len(), expected.len());
        prop_assert_eq!(calls.into_iter().collect::<HashSet<_>>(), expected.clone());
        prop_assert_eq!(report.outcomes.keys().copied().collect::<HashSet<_>>(), expected);
        prop_assert!(report.stats.solo_executions <= report.len());
        prop_assert_eq!(*detector.overlaps.lock(), 0);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn fan_out_never_overlaps_conflicts(workload in arb_workload(30, 8), parallelism in 1usize..6) {
        let (table, graph) = materialize(&workload);
        let expected: HashSet<TxHash> = graph.vertices().copied().collect();
        let detector = Arc::new(ConflictDetector::default());

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(4)
            .enable_all()
            .build()
            .unwrap();
        let report = runtime
            .block_on(
                FanOutDriver::new(Arc::new(table), Arc::clone(&detector), parallelism).run(graph),
            )
            .unwrap();

        prop_assert_eq!(*detector.overlaps.lock(), 0);
        let calls = detector.calls.lock().clone();
        prop_assert_eq!(calls.len(), expected.len());
        prop_assert_eq!(report.outcomes.keys().copied().collect::<HashSet<_>>(), expected);
        let rejected = report.failures().count();
        let expected_rejections = report
            .outcomes
            .keys()
            .filter(|h| h.as_bytes()[31] % 7 == 0)
            .count();
        prop_assert_eq!(rejected, expected_rejections);
    }
}
