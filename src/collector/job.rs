//! GC job orchestrator (C6): single-flight entry point driving the full
//! INIT → CHECK_CHECKPOINT → COLLECTING ⇄ DELETING → SORTING → DELETING →
//! SPLITS_CLEANUP → STATS state machine, plus the split-document cleanup
//! delegation (C7).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::collector::batcher::DeletionBatcher;
use crate::collector::stats::VersionGcStats;
use crate::collector::timer::{Phase, PhaseTimer};
use crate::core::config::GcConfig;
use crate::core::errors::{GcError, Result};
use crate::logger::dual::{GcEvent, GcLoggerHandle};
use crate::model::revision::{HeadRevisionProvider, NodeStateResolver};
use crate::sort::default_comparator;
use crate::store::{CheckpointRegistry, Clock, DocumentStore, SplitDocGcType};

/// Everything the orchestrator needs from its backing store: the document
/// store proper, the checkpoint registry, and the node-state resolver plus
/// head-revision provider. The clock is a separate collaborator: production
/// stores and clock subsystems are typically distinct services, and
/// [`crate::store::memory::FixedClock`] exercises this crate's own tests
/// independently of [`crate::store::memory::InMemoryStore`].
pub trait Collaborators: DocumentStore + CheckpointRegistry + NodeStateResolver + HeadRevisionProvider {}

impl<T> Collaborators for T where T: DocumentStore + CheckpointRegistry + NodeStateResolver + HeadRevisionProvider {}

/// Releases the single-flight guard on drop, including on an early return
/// or panic unwind from inside `gc()`.
struct JobGuard<'a> {
    active: &'a AtomicBool,
}

impl Drop for JobGuard<'_> {
    fn drop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

/// The garbage collector: a thin, reusable orchestrator over a store and a
/// logger. One `gc()` call runs at a time; a second concurrent call gets
/// [`GcError::AlreadyRunning`].
pub struct GarbageCollector<C: Collaborators> {
    store: Arc<C>,
    clock: Arc<dyn Clock>,
    config: GcConfig,
    logger: GcLoggerHandle,
    active: AtomicBool,
    cancel: Arc<AtomicBool>,
}

impl<C: Collaborators> GarbageCollector<C> {
    /// Build a collector over the given collaborators, clock, configuration,
    /// and logger handle. Validates `config` up front.
    pub fn new(config: GcConfig, store: Arc<C>, clock: Arc<dyn Clock>, logger: GcLoggerHandle) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            clock,
            config,
            logger,
            active: AtomicBool::new(false),
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Request cancellation of the run currently in progress, if any.
    /// Cooperative: observed at candidate-iteration and batch boundaries,
    /// never mid-batch.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Run one garbage collection pass. `max_age_secs` sets the cutoff:
    /// only main documents with `modified < now - max_age_secs` are
    /// considered for collection.
    ///
    /// Returns [`GcError::AlreadyRunning`] if another run is already in
    /// progress on this instance.
    pub fn gc(&self, max_age_secs: i64) -> Result<VersionGcStats> {
        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(GcError::AlreadyRunning);
        }
        let _guard = JobGuard { active: &self.active };
        self.cancel.store(false, Ordering::Relaxed);

        match self.run(max_age_secs) {
            Ok(stats) => Ok(stats),
            Err(err) => {
                self.logger.send(GcEvent::Error {
                    code: err.code().to_string(),
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    fn run(&self, max_age_secs: i64) -> Result<VersionGcStats> {
        let mut stats = VersionGcStats::default();
        let mut timer = PhaseTimer::new();
        let started_at = now_rfc3339();
        let config_hash = self.config.stable_hash()?;

        let now_secs = self.clock.now_millis() / 1000;
        let cutoff = now_secs - max_age_secs;
        self.logger.send(GcEvent::RunStarted {
            oldest_rev_ts_secs: cutoff,
            config_hash: config_hash.clone(),
        });

        if let Some(checkpoint) = self.store.oldest_revision_to_keep() {
            let checkpoint_secs = checkpoint.timestamp_millis() / 1000;
            if checkpoint_secs < cutoff {
                stats.ignored_gc_due_to_checkpoint = true;
                self.logger.send(GcEvent::CheckpointBlocked {
                    checkpoint: checkpoint.to_readable_string(),
                });
                return self.finish(stats, &mut timer, started_at, config_hash, cutoff);
            }
        }

        let head_revision = self.store.head_revision();
        let mut batcher = DeletionBatcher::new(
            &self.config.scratch_dir,
            self.config.overflow_to_disk_threshold,
            self.config.delete_batch_size,
            self.config.progress_batch_size,
            default_comparator(),
        );

        timer.start(Phase::Collecting);
        let mut collecting_result = Ok(());
        for doc in self.store.query_possibly_deleted(cutoff) {
            if self.cancel.load(Ordering::Relaxed) {
                stats.canceled = true;
                break;
            }
            if let Err(err) = batcher.possibly_deleted(
                &doc,
                self.store.as_ref(),
                self.store.as_ref(),
                &head_revision,
                &mut timer,
                &self.logger,
            ) {
                collecting_result = Err(err);
                break;
            }
        }
        timer.stop(Phase::Collecting);
        collecting_result?;

        if !stats.canceled {
            batcher.remove_documents(self.store.as_ref(), &self.cancel, &mut timer, &self.logger)?;
            if self.cancel.load(Ordering::Relaxed) {
                stats.canceled = true;
            }
        }

        batcher.apply_to(&mut stats);
        batcher.close();

        if !stats.canceled {
            timer.start(Phase::SplitsCleanup);
            let result = self.store.delete_split_documents(SplitDocGcType::gc_eligible(), cutoff, &mut stats);
            timer.stop(Phase::SplitsCleanup);
            result?;
        }

        self.finish(stats, &mut timer, started_at, config_hash, cutoff)
    }

    fn finish(
        &self,
        mut stats: VersionGcStats,
        timer: &mut PhaseTimer,
        started_at: String,
        config_hash: String,
        cutoff: i64,
    ) -> Result<VersionGcStats> {
        timer.close();
        for (phase_index, duration) in timer.durations().iter().enumerate() {
            stats.phase_durations_millis[phase_index] = duration.as_millis() as u64;
        }
        stats.elapsed_millis = timer.elapsed().as_millis() as u64;

        self.logger.send(GcEvent::RunCompleted {
            started_at,
            config_hash,
            oldest_rev_ts_secs: cutoff,
            stats: stats.clone(),
        });
        Ok(stats)
    }
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NodeDocument, RangeDescriptor};
    use crate::store::memory::{FixedClock, InMemoryStore};

    fn gc_over(store: Arc<InMemoryStore>, config: GcConfig) -> GarbageCollector<InMemoryStore> {
        GarbageCollector::new(config, store, FixedClock::new(1_000_000), GcLoggerHandle::noop()).unwrap()
    }

    fn test_config(scratch: &std::path::Path) -> GcConfig {
        let mut cfg = GcConfig::default();
        cfg.scratch_dir = scratch.to_path_buf();
        cfg.overflow_to_disk_threshold = 4;
        cfg.delete_batch_size = 2;
        cfg.progress_batch_size = 1;
        cfg.run_history_db = None;
        cfg
    }

    #[test]
    fn deletes_stale_leaf_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryStore::new());
        store.insert_doc(NodeDocument::new("/a", 10, false));

        let gc = gc_over(Arc::clone(&store), test_config(dir.path()));
        let stats = gc.gc(5).unwrap();

        assert_eq!(stats.deleted_doc_gc_count, 1);
        assert_eq!(stats.deleted_leaf_doc_gc_count, 1);
        assert!(!store.contains_doc("/a"));
    }

    #[test]
    fn live_document_is_never_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryStore::new());
        store.insert_doc(NodeDocument::new("/a", 10, false));
        store.mark_live("/a");

        let gc = gc_over(Arc::clone(&store), test_config(dir.path()));
        let stats = gc.gc(5).unwrap();

        assert_eq!(stats.deleted_doc_gc_count, 0);
        assert!(store.contains_doc("/a"));
    }

    #[test]
    fn split_doc_cleanup_is_invoked_and_counted() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryStore::new());
        store.insert_split_doc("/a/prev/r1/0");
        store.insert_split_doc("/a/prev/r2/0");

        let gc = gc_over(Arc::clone(&store), test_config(dir.path()));
        let stats = gc.gc(5).unwrap();

        assert_eq!(stats.split_doc_gc_count, 2);
    }

    #[test]
    fn checkpoint_requiring_older_retention_blocks_entire_run() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryStore::new());
        store.insert_doc(NodeDocument::new("/a", 10, false));
        store.set_checkpoint(0, "oldest-checkpoint");

        let gc = gc_over(Arc::clone(&store), test_config(dir.path()));
        let stats = gc.gc(5).unwrap();

        assert!(stats.ignored_gc_due_to_checkpoint);
        assert_eq!(stats.deleted_doc_gc_count, 0);
        assert!(store.contains_doc("/a"));
    }

    #[test]
    fn second_concurrent_run_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryStore::new());
        let gc = gc_over(store, test_config(dir.path()));
        gc.active.store(true, Ordering::SeqCst);

        let err = gc.gc(5).unwrap_err();
        assert!(matches!(err, GcError::AlreadyRunning));
        gc.active.store(false, Ordering::SeqCst);
    }

    #[test]
    fn cancel_called_with_no_active_run_is_a_no_op_for_the_next_run() {
        // `cancel()` addresses whichever job is current; with none active it
        // must not leak into the next, unrelated `gc()` call.
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryStore::new());
        store.insert_doc(NodeDocument::new("/a", 10, false));

        let gc = gc_over(Arc::clone(&store), test_config(dir.path()));
        gc.cancel();
        let stats = gc.gc(5).unwrap();

        assert!(!stats.canceled);
        assert_eq!(stats.deleted_doc_gc_count, 1);
    }

    #[test]
    fn cancel_from_another_thread_mid_run_stops_further_batches() {
        // Sleeping store: query_possibly_deleted pauses briefly per item so
        // the spawned thread below has a real window to call cancel()
        // before every candidate has been classified.
        struct SlowStore(Arc<InMemoryStore>);

        impl DocumentStore for SlowStore {
            fn query_possibly_deleted<'a>(&'a self, cutoff_secs: i64) -> Box<dyn Iterator<Item = NodeDocument> + 'a> {
                let inner: Vec<NodeDocument> = self.0.query_possibly_deleted(cutoff_secs).collect();
                Box::new(inner.into_iter().map(|doc| {
                    std::thread::sleep(std::time::Duration::from_millis(2));
                    doc
                }))
            }
            fn find(&self, id: &str) -> Result<Option<NodeDocument>> {
                self.0.find(id)
            }
            fn all_previous_docs<'a>(&'a self, main: &NodeDocument) -> Box<dyn Iterator<Item = crate::model::PreviousDocument> + 'a> {
                self.0.all_previous_docs(main)
            }
            fn remove_conditional(&self, batch: &crate::store::ConditionalRemoveBatch) -> Result<usize> {
                self.0.remove_conditional(batch)
            }
            fn remove_unconditional(&self, ids: &[String]) -> Result<usize> {
                self.0.remove_unconditional(ids)
            }
            fn delete_split_documents(
                &self,
                gc_types: &[crate::store::SplitDocGcType],
                oldest_rev_ts_secs: i64,
                stats: &mut VersionGcStats,
            ) -> Result<()> {
                self.0.delete_split_documents(gc_types, oldest_rev_ts_secs, stats)
            }
        }
        impl crate::store::CheckpointRegistry for SlowStore {
            fn oldest_revision_to_keep(&self) -> Option<crate::store::Checkpoint> {
                self.0.oldest_revision_to_keep()
            }
        }
        impl crate::model::revision::NodeStateResolver for SlowStore {
            fn resolve_node_at_revision(
                &self,
                node: &NodeDocument,
                revision: &crate::model::revision::RevisionVector,
            ) -> Option<crate::model::revision::NodeState> {
                self.0.resolve_node_at_revision(node, revision)
            }
        }
        impl crate::model::revision::HeadRevisionProvider for SlowStore {
            fn head_revision(&self) -> crate::model::revision::RevisionVector {
                self.0.head_revision()
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let inner = Arc::new(InMemoryStore::new());
        for i in 0..100 {
            inner.insert_doc(NodeDocument::new(format!("/leaf-{i:03}"), 10, false));
        }
        let store = Arc::new(SlowStore(inner));

        let mut cfg = test_config(dir.path());
        cfg.delete_batch_size = 1;
        let gc = Arc::new(GarbageCollector::new(cfg, store, FixedClock::new(1_000_000), GcLoggerHandle::noop()).unwrap());

        let canceller = Arc::clone(&gc);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(20));
            canceller.cancel();
        });
        let stats = gc.gc(5).unwrap();
        handle.join().unwrap();

        assert!(stats.canceled);
        assert!(
            stats.deleted_doc_gc_count < 100,
            "cancellation mid-scan must stop before every candidate is processed"
        );
    }

    #[test]
    fn non_leaf_candidate_with_previous_docs_is_collected() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryStore::new());
        let doc = NodeDocument::new("/a", 10, false).with_previous_range(RangeDescriptor::first_level("r1"));
        store.insert_doc(doc);

        let gc = gc_over(Arc::clone(&store), test_config(dir.path()));
        let stats = gc.gc(5).unwrap();

        assert_eq!(stats.deleted_doc_gc_count, 1);
        assert_eq!(stats.deleted_leaf_doc_gc_count, 0);
    }
}
