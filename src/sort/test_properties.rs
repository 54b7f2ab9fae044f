//! Property-based tests for [`super::external::ExternalSortedSet`].
//!
//! Exercises the external sort's core contract directly: for any sequence
//! of appended ids and any spill threshold, `get_ids()` yields every
//! appended id back in the comparator's non-decreasing order, and `close()`
//! leaves no spill files behind.

use proptest::prelude::*;

use crate::sort::external::ExternalSortedSet;
use crate::sort::{compare_composite_ids, default_comparator};

fn arb_doc_id() -> impl Strategy<Value = String> {
    "[a-z]{1,4}(/[a-z]{1,4}){0,3}".prop_map(|p| format!("/{p}"))
}

fn arb_composite_id() -> impl Strategy<Value = String> {
    (arb_doc_id(), 0i64..1_000_000).prop_map(|(doc_id, modified)| format!("{doc_id}/{modified}"))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// `get_ids()` always yields ids in the comparator's non-decreasing
    /// order, regardless of insertion order or how many spills occur.
    #[test]
    fn get_ids_is_non_decreasing_under_any_threshold(
        ids in prop::collection::vec(arb_composite_id(), 0..200),
        threshold in 1usize..16,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let mut set = ExternalSortedSet::new(dir.path(), threshold, default_comparator());
        for id in &ids {
            set.add(id.clone()).unwrap();
        }
        set.sort().unwrap();

        let collected: Vec<String> = set.get_ids().unwrap().map(Result::unwrap).collect();
        prop_assert_eq!(collected.len(), ids.len());

        for window in collected.windows(2) {
            prop_assert_ne!(
                compare_composite_ids(&window[0], &window[1]),
                std::cmp::Ordering::Greater,
                "adjacent pair out of order: {:?} then {:?}", window[0], window[1]
            );
        }

        set.close();
    }

    /// `size()` always equals the number of `add()` calls, independent of
    /// how many of them triggered a spill.
    #[test]
    fn size_matches_append_count_regardless_of_spills(
        ids in prop::collection::vec(arb_composite_id(), 0..200),
        threshold in 1usize..16,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let mut set = ExternalSortedSet::new(dir.path(), threshold, default_comparator());
        for id in &ids {
            set.add(id.clone()).unwrap();
        }
        prop_assert_eq!(set.size(), ids.len() as u64);
        set.sort().unwrap();
        set.close();
        prop_assert_eq!(set.size(), 0);
    }

    /// `close()` always removes every spill file it created, for any
    /// threshold small enough to force at least one spill.
    #[test]
    fn close_leaves_no_spill_files(
        ids in prop::collection::vec(arb_composite_id(), 1..100),
        threshold in 1usize..8,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let mut set = ExternalSortedSet::new(dir.path(), threshold, default_comparator());
        for id in &ids {
            set.add(id.clone()).unwrap();
        }
        set.sort().unwrap();
        set.close();
        prop_assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }
}
