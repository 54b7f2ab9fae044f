//! Previous-doc enumerator (C4): derive first-level previous-document ids
//! without a read, falling back to the store only when some range is an
//! intermediate aggregation.

use crate::model::previous_document::previous_id_for;
use crate::model::NodeDocument;
use crate::store::DocumentStore;

/// Enumerate every previous-document id belonging to `main`.
///
/// Empty if `main` has no previous ranges. If every range is first-level
/// (height 0), ids are derived purely from `main.id` + revision + height —
/// no store read. Otherwise falls through to
/// [`DocumentStore::all_previous_docs`], which is allowed to read.
pub fn previous_doc_ids<'a>(store: &'a dyn DocumentStore, main: &'a NodeDocument) -> Box<dyn Iterator<Item = String> + 'a> {
    if main.previous_ranges.is_empty() {
        return Box::new(std::iter::empty());
    }
    if main.all_previous_ranges_first_level() {
        let ids: Vec<String> = main
            .previous_ranges
            .values()
            .map(|range| previous_id_for(&main.id, &range.revision, range.height))
            .collect();
        Box::new(ids.into_iter())
    } else {
        Box::new(store.all_previous_docs(main).map(|doc| doc.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PreviousDocument, RangeDescriptor};
    use crate::store::memory::InMemoryStore;

    #[test]
    fn empty_ranges_yield_empty_sequence() {
        let store = InMemoryStore::new();
        let doc = NodeDocument::new("/a", 100, false);
        assert_eq!(previous_doc_ids(&store, &doc).count(), 0);
    }

    #[test]
    fn first_level_ranges_are_derived_without_a_store_read() {
        let store = InMemoryStore::new();
        let doc = NodeDocument::new("/a", 100, false)
            .with_previous_range(RangeDescriptor::first_level("r1"))
            .with_previous_range(RangeDescriptor::first_level("r2"));
        let mut ids: Vec<String> = previous_doc_ids(&store, &doc).collect();
        ids.sort();
        assert_eq!(ids, vec![previous_id_for("/a", "r1", 0), previous_id_for("/a", "r2", 0)]);
    }

    #[test]
    fn non_first_level_ranges_fetch_from_the_store() {
        let store = InMemoryStore::new();
        let doc = NodeDocument::new("/a", 100, false).with_previous_range(RangeDescriptor {
            revision: "r1".to_string(),
            height: 2,
        });
        store.insert_previous_docs(
            "/a",
            vec![
                PreviousDocument { id: "/a/prev/agg/1".to_string() },
                PreviousDocument { id: "/a/prev/agg/2".to_string() },
            ],
        );
        let mut ids: Vec<String> = previous_doc_ids(&store, &doc).collect();
        ids.sort();
        assert_eq!(ids, vec!["/a/prev/agg/1".to_string(), "/a/prev/agg/2".to_string()]);
    }
}
