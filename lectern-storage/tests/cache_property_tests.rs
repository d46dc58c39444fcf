//! Property tests for statistics consistency and cache behaviour.

use std::collections::HashSet;
use std::sync::Arc;

use lectern_core::LecternResult;
use lectern_storage::{queries, CachedLibraryQuery, Gateway, HistoryKey, LibraryQuery};
use lectern_test_utils::assertions::*;
use lectern_test_utils::fixtures::{self, BorrowScenario};
use lectern_test_utils::generators::*;
use lectern_test_utils::InMemoryDatastore;
use proptest::prelude::*;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap_or_else(|e| panic!("runtime: {e}"))
}

fn query(store: &InMemoryDatastore) -> LibraryQuery {
    LibraryQuery::new(Gateway::degrading(Arc::new(store.clone())))
}

/// `count` readers, each with one loan.
fn readers(count: usize) -> (InMemoryDatastore, Vec<String>) {
    let mut scenario = BorrowScenario::default();
    scenario.books.push(fixtures::book("B1", "书", "作者"));
    let ids: Vec<String> = (0..count).map(|i| format!("ABC{:05}", i)).collect();
    for id in &ids {
        scenario.readers.push(fixtures::reader(id, "计算机学院"));
        scenario.loans.push(fixtures::loan(
            &format!("L-{id}"),
            id,
            "B1",
            fixtures::date(2024, 1, 1),
            "returned",
        ));
    }
    (scenario.datastore(), ids)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_statistics_are_consistent(scenario in arb_borrow_scenario()) {
        let store = scenario.datastore();
        let reader_id = scenario.readers[0].reader_id.clone();
        let loans = scenario.loans_of(&reader_id);
        let distinct: HashSet<&str> = loans.iter().map(|l| l.book_id.as_str()).collect();

        let stats = runtime().block_on(query(&store).statistics(&reader_id))
            .unwrap_or_else(|e| panic!("statistics: {e}"));

        prop_assert_eq!(stats.total_records, loans.len() as i64);
        prop_assert_eq!(stats.unique_books, distinct.len() as i64);
        prop_assert_eq!(stats.status_count.values().sum::<i64>(), stats.total_records);
        prop_assert!(stats.is_consistent());
    }

    #[test]
    fn prop_history_is_ordered_and_bounded(
        scenario in arb_borrow_scenario(),
        limit in 1i64..30,
    ) {
        let store = scenario.datastore();
        let reader_id = scenario.readers[0].reader_id.clone();
        let records = runtime().block_on(query(&store).borrow_history(&reader_id, limit))
            .unwrap_or_else(|e| panic!("history: {e}"));

        let expected = scenario.loans_of(&reader_id).len().min(limit as usize);
        prop_assert_eq!(records.len(), expected);
        assert_newest_first(&records);
    }

    #[test]
    fn prop_assembly_is_deterministic(scenario in arb_borrow_scenario(), limit in 1i64..30) {
        let store = scenario.datastore();
        let reader_id = scenario.readers[0].reader_id.clone();
        let q = query(&store);
        let rt = runtime();
        let first = rt.block_on(q.assemble_history(&reader_id, limit));
        let second = rt.block_on(q.assemble_history(&reader_id, limit));
        prop_assert_eq!(first.ok(), second.ok());
    }

    #[test]
    fn prop_eviction_keeps_most_recent(capacity in 1usize..6, extra in 1usize..6) {
        let (store, ids) = readers(capacity + extra);
        let cache = CachedLibraryQuery::new(query(&store), capacity)
            .unwrap_or_else(|e| panic!("cache: {e}"));

        let rt = runtime();
        for id in &ids {
            let result = rt.block_on(cache.get(id, 10)).unwrap_or_else(|e| panic!("get: {e}"));
            prop_assert!(result.success);
        }

        let keys = cache.keys().unwrap_or_default();
        let expected: Vec<HistoryKey> = ids[extra..]
            .iter()
            .map(|id| HistoryKey::new(id.as_str(), 10))
            .collect();
        prop_assert_eq!(keys, expected);
        prop_assert_eq!(cache.stats().map(|s| s.evictions).unwrap_or(0), extra as u64);
    }

    #[test]
    fn prop_hits_never_touch_the_datastore(
        accesses in prop::collection::vec(0usize..4, 1..40),
    ) {
        let (store, ids) = readers(4);
        let cache = CachedLibraryQuery::new(query(&store), 4)
            .unwrap_or_else(|e| panic!("cache: {e}"));
        let rt = runtime();

        let mut seen = HashSet::new();
        for index in accesses {
            let before = store.calls(queries::READER_BY_ID);
            let result: LecternResult<_> = rt.block_on(cache.get(&ids[index], 10));
            prop_assert!(result.is_ok());
            let after = store.calls(queries::READER_BY_ID);
            if seen.insert(index) {
                prop_assert_eq!(after, before + 1);
            } else {
                prop_assert_eq!(after, before);
            }
        }
    }

    #[test]
    fn prop_unknown_readers_are_never_cached(reader_id in arb_reader_id(), repeats in 1usize..5) {
        let store = fixtures::scenario_datastore();
        prop_assume!(reader_id != fixtures::SCENARIO_READER_ID && reader_id != "PHYSX20001");
        let cache = CachedLibraryQuery::new(query(&store), 4)
            .unwrap_or_else(|e| panic!("cache: {e}"));
        let rt = runtime();
        for _ in 0..repeats {
            let result = rt.block_on(cache.get(&reader_id, 10)).unwrap_or_else(|e| panic!("get: {e}"));
            assert_reader_not_found(&result);
        }
        prop_assert_eq!(store.calls(queries::READER_BY_ID), repeats);
        prop_assert!(cache.is_empty().unwrap_or(false));
    }
}
