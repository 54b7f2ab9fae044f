//! In-memory test doubles for [`super::DocumentStore`], [`super::CheckpointRegistry`],
//! [`super::Clock`], and [`crate::model::revision::NodeStateResolver`].
//!
//! Backed by `BTreeMap`s guarded by a `parking_lot::Mutex` so the doubles
//! are `Send + Sync` and cheap to share across the orchestrator and its
//! test harness. `bump_modified` simulates a concurrent writer recreating
//! a node mid-run, which is what exercises the conditional-remove and
//! exclude-set scenarios end to end.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::collector::stats::VersionGcStats;
use crate::core::errors::Result;
use crate::model::revision::{HeadRevisionProvider, NodeState, NodeStateResolver, RevisionVector};
use crate::model::{NodeDocument, PreviousDocument};
use crate::store::{Checkpoint, CheckpointRegistry, Clock, ConditionalRemoveBatch, DocumentStore, SplitDocGcType};

/// An in-memory document store, checkpoint registry, clock, and
/// node-state resolver rolled into one fake, for tests.
#[derive(Default)]
pub struct InMemoryStore {
    docs: Mutex<BTreeMap<String, NodeDocument>>,
    previous_by_main: Mutex<BTreeMap<String, Vec<PreviousDocument>>>,
    live_ids: Mutex<HashSet<String>>,
    checkpoint: Mutex<Option<Checkpoint>>,
    split_doc_store: Mutex<HashSet<String>>,
}

impl InMemoryStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) a main document.
    pub fn insert_doc(&self, doc: NodeDocument) {
        self.docs.lock().insert(doc.id.clone(), doc);
    }

    /// Attach previous documents to a main document, reachable only
    /// through [`DocumentStore::all_previous_docs`] (the non-first-level
    /// enumeration path).
    pub fn insert_previous_docs(&self, main_id: &str, docs: Vec<PreviousDocument>) {
        self.previous_by_main.lock().insert(main_id.to_string(), docs);
    }

    /// Register split-document ids as present in the store, so
    /// `delete_split_documents` has something to reclaim.
    pub fn insert_split_doc(&self, id: impl Into<String>) {
        self.split_doc_store.lock().insert(id.into());
    }

    /// Mark a node id as live at head revision (resolvable by
    /// [`NodeStateResolver`]).
    pub fn mark_live(&self, id: impl Into<String>) {
        self.live_ids.lock().insert(id.into());
    }

    /// Simulate a concurrent writer: bump a main document's `modified`
    /// timestamp (and mark it live again), as if the node were recreated
    /// after the GC observed it as a deletion candidate.
    pub fn bump_modified(&self, id: &str, new_modified: i64) {
        if let Some(doc) = self.docs.lock().get_mut(id) {
            doc.modified = new_modified;
        }
        self.live_ids.lock().insert(id.to_string());
    }

    /// Simulate a concurrent writer recreating a node strictly *after* the
    /// head revision the GC captured at run start: `modified` is bumped for
    /// `find`/`remove_conditional` purposes, but `live_ids` is left alone so
    /// resolution at the (older) head revision still correctly answers "not
    /// live". This is the precise race the conditional-remove / exclude-set
    /// machinery (C3) exists to catch — distinct from [`Self::bump_modified`],
    /// which also marks the node live and so would make it resolve as live
    /// again even at the old head.
    pub fn recreate_after_head_revision(&self, id: &str, new_modified: i64) {
        if let Some(doc) = self.docs.lock().get_mut(id) {
            doc.modified = new_modified;
        }
    }

    /// Register a checkpoint with the given retention timestamp (millis).
    pub fn set_checkpoint(&self, timestamp_millis: i64, label: impl Into<String>) {
        *self.checkpoint.lock() = Some(Checkpoint::new(timestamp_millis, label));
    }

    /// Whether a main document with this id is still present.
    #[must_use]
    pub fn contains_doc(&self, id: &str) -> bool {
        self.docs.lock().contains_key(id)
    }

    /// Whether a previous document with this id is still present, among
    /// any main document's attached list.
    #[must_use]
    pub fn contains_previous(&self, id: &str) -> bool {
        self.previous_by_main
            .lock()
            .values()
            .any(|docs| docs.iter().any(|d| d.id == id))
    }

    /// Total number of main documents currently stored.
    #[must_use]
    pub fn doc_count(&self) -> usize {
        self.docs.lock().len()
    }
}

impl DocumentStore for InMemoryStore {
    fn query_possibly_deleted<'a>(
        &'a self,
        cutoff_secs: i64,
    ) -> Box<dyn Iterator<Item = NodeDocument> + 'a> {
        let snapshot: Vec<NodeDocument> = self
            .docs
            .lock()
            .values()
            .filter(|d| d.modified < cutoff_secs)
            .cloned()
            .collect();
        Box::new(snapshot.into_iter())
    }

    fn find(&self, id: &str) -> Result<Option<NodeDocument>> {
        Ok(self.docs.lock().get(id).cloned())
    }

    fn all_previous_docs<'a>(
        &'a self,
        main: &NodeDocument,
    ) -> Box<dyn Iterator<Item = PreviousDocument> + 'a> {
        let docs = self
            .previous_by_main
            .lock()
            .get(&main.id)
            .cloned()
            .unwrap_or_default();
        Box::new(docs.into_iter())
    }

    fn remove_conditional(&self, batch: &ConditionalRemoveBatch) -> Result<usize> {
        let mut docs = self.docs.lock();
        let mut removed = 0usize;
        for (id, expected_modified) in batch {
            if let Some(doc) = docs.get(id) {
                if doc.modified == *expected_modified {
                    docs.remove(id);
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    fn remove_unconditional(&self, ids: &[String]) -> Result<usize> {
        let mut by_main = self.previous_by_main.lock();
        let to_remove: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let mut removed = 0usize;
        for docs in by_main.values_mut() {
            let before = docs.len();
            docs.retain(|d| !to_remove.contains(d.id.as_str()));
            removed += before - docs.len();
        }
        Ok(removed)
    }

    fn delete_split_documents(
        &self,
        gc_types: &[SplitDocGcType],
        _oldest_rev_ts_secs: i64,
        stats: &mut VersionGcStats,
    ) -> Result<()> {
        let mut store = self.split_doc_store.lock();
        let reclaimed = store.len();
        store.clear();
        if gc_types.contains(&SplitDocGcType::DefaultLeaf) || gc_types.contains(&SplitDocGcType::CommitRootOnly) {
            stats.split_doc_gc_count += reclaimed as u64;
        }
        Ok(())
    }
}

impl NodeStateResolver for InMemoryStore {
    fn resolve_node_at_revision(
        &self,
        node: &NodeDocument,
        _revision: &RevisionVector,
    ) -> Option<NodeState> {
        if self.live_ids.lock().contains(&node.id) {
            Some(NodeState { id: node.id.clone() })
        } else {
            None
        }
    }
}

impl CheckpointRegistry for InMemoryStore {
    fn oldest_revision_to_keep(&self) -> Option<Checkpoint> {
        self.checkpoint.lock().clone()
    }
}

impl HeadRevisionProvider for InMemoryStore {
    fn head_revision(&self) -> RevisionVector {
        RevisionVector::new("head")
    }
}

/// A clock whose current time can be set/advanced explicitly from tests.
pub struct FixedClock {
    millis: AtomicI64,
}

impl FixedClock {
    /// A clock starting at the given millis-since-epoch value.
    #[must_use]
    pub fn new(millis: i64) -> Arc<Self> {
        Arc::new(Self {
            millis: AtomicI64::new(millis),
        })
    }

    /// Advance (or rewind) the clock.
    pub fn set(&self, millis: i64) {
        self.millis.store(millis, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_possibly_deleted_filters_by_cutoff() {
        let store = InMemoryStore::new();
        store.insert_doc(NodeDocument::new("/a", 50, false));
        store.insert_doc(NodeDocument::new("/b", 150, false));

        let results: Vec<_> = store.query_possibly_deleted(100).collect();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "/a");
    }

    #[test]
    fn remove_conditional_respects_observed_modified() {
        let store = InMemoryStore::new();
        store.insert_doc(NodeDocument::new("/a", 100, false));

        let mut batch = ConditionalRemoveBatch::new();
        batch.insert("/a".to_string(), 999); // stale expectation
        assert_eq!(store.remove_conditional(&batch).unwrap(), 0);
        assert!(store.contains_doc("/a"));

        let mut batch = ConditionalRemoveBatch::new();
        batch.insert("/a".to_string(), 100);
        assert_eq!(store.remove_conditional(&batch).unwrap(), 1);
        assert!(!store.contains_doc("/a"));
    }

    #[test]
    fn bump_modified_marks_node_live_again() {
        let store = InMemoryStore::new();
        store.insert_doc(NodeDocument::new("/a", 100, false));
        let rv = RevisionVector::new("head");
        let doc = store.find("/a").unwrap().unwrap();
        assert!(doc.resolve_node_at_revision(&store, &rv).is_none());

        store.bump_modified("/a", 200);
        let doc = store.find("/a").unwrap().unwrap();
        assert_eq!(doc.modified, 200);
        assert!(doc.resolve_node_at_revision(&store, &rv).is_some());
    }

    #[test]
    fn recreate_after_head_revision_leaves_resolution_at_old_head_unchanged() {
        let store = InMemoryStore::new();
        store.insert_doc(NodeDocument::new("/a", 100, false));
        let rv = RevisionVector::new("head");
        let doc = store.find("/a").unwrap().unwrap();
        assert!(doc.resolve_node_at_revision(&store, &rv).is_none());

        store.recreate_after_head_revision("/a", 999);

        // `find` sees the new value...
        let current = store.find("/a").unwrap().unwrap();
        assert_eq!(current.modified, 999);
        // ...but resolution at the already-captured head is still "not live",
        // matching a writer whose commit postdates that head revision.
        assert!(current.resolve_node_at_revision(&store, &rv).is_none());
    }

    #[test]
    fn fixed_clock_can_be_advanced() {
        let clock = FixedClock::new(1_000);
        assert_eq!(clock.now_millis(), 1_000);
        clock.set(2_000);
        assert_eq!(clock.now_millis(), 2_000);
    }
}
