//! Deletion batcher (C3): classifies candidates into leaf/non-leaf/previous
//! sets, flushes conditional-delete batches, and tracks documents that were
//! concurrently recreated so their previous docs are never deleted.

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::collector::previous::previous_doc_ids;
use crate::collector::stats::VersionGcStats;
use crate::collector::timer::{Phase, PhaseTimer};
use crate::core::errors::{GcError, Result};
use crate::core::ids::CompositeId;
use crate::logger::dual::{GcEvent, GcLoggerHandle};
use crate::model::revision::NodeStateResolver;
use crate::model::{NodeDocument, RevisionVector};
use crate::sort::{ExternalSortedSet, IdComparator};
use crate::store::{ConditionalRemoveBatch, DocumentStore};

/// Outcome of issuing one conditional-remove batch of main documents.
struct BatchOutcome {
    removed: usize,
    recreated: usize,
    exclude_additions: Vec<String>,
}

/// Buffers candidates across a run and drives the batched-delete pipeline.
pub struct DeletionBatcher {
    leaf_ids: Vec<String>,
    non_leaf_ids: ExternalSortedSet,
    previous_ids: ExternalSortedSet,
    exclude: HashSet<String>,
    delete_batch_size: usize,
    progress_batch_size: u64,
    next_progress_threshold: u64,
    total_candidates: u64,
    deleted_doc_count: u64,
    deleted_leaf_doc_count: u64,
    recreated_count: u64,
    previous_doc_gc_count: u64,
    malformed_id_count: u64,
}

impl DeletionBatcher {
    /// Build an empty batcher. `delete_batch_size` must be smaller than the
    /// store's bulk-query `IN (...)` limit — enforced by
    /// [`crate::core::config::GcConfig::validate`], not re-checked here.
    #[must_use]
    pub fn new(
        scratch_dir: impl AsRef<Path>,
        overflow_to_disk_threshold: usize,
        delete_batch_size: usize,
        progress_batch_size: u64,
        comparator: IdComparator,
    ) -> Self {
        Self {
            leaf_ids: Vec::new(),
            non_leaf_ids: ExternalSortedSet::new(scratch_dir.as_ref(), overflow_to_disk_threshold, comparator.clone()),
            previous_ids: ExternalSortedSet::new(scratch_dir.as_ref(), overflow_to_disk_threshold, comparator),
            exclude: HashSet::new(),
            delete_batch_size: delete_batch_size.max(1),
            progress_batch_size: progress_batch_size.max(1),
            next_progress_threshold: progress_batch_size.max(1),
            total_candidates: 0,
            deleted_doc_count: 0,
            deleted_leaf_doc_count: 0,
            recreated_count: 0,
            previous_doc_gc_count: 0,
            malformed_id_count: 0,
        }
    }

    /// Total number of candidates classified so far (leaf + non-leaf).
    #[must_use]
    pub const fn total_candidates(&self) -> u64 {
        self.total_candidates
    }

    /// Classify one candidate: live documents are dropped, leaf candidates
    /// are buffered for immediate batch deletion, and everything else is
    /// added to the external-memory sorted sets for the later sweep.
    pub fn possibly_deleted(
        &mut self,
        doc: &NodeDocument,
        store: &dyn DocumentStore,
        resolver: &dyn NodeStateResolver,
        head_revision: &RevisionVector,
        timer: &mut PhaseTimer,
        logger: &GcLoggerHandle,
    ) -> Result<()> {
        let composite = match CompositeId::try_new(doc.id.clone(), doc.modified) {
            Ok(id) => id,
            Err(err) => {
                self.malformed_id_count += 1;
                logger.send(GcEvent::MalformedId {
                    id: doc.id.clone(),
                    reason: err.to_string(),
                });
                return Ok(());
            }
        };

        if doc.resolve_node_at_revision(resolver, head_revision).is_some() {
            // Live at head: not actually deleted, drop the candidate.
            return Ok(());
        }

        let previous: Vec<String> = previous_doc_ids(store, doc).collect();
        self.total_candidates += 1;

        if !doc.has_children && previous.is_empty() {
            self.leaf_ids.push(composite.to_string());
            if self.leaf_ids.len() >= self.delete_batch_size {
                timer.start(Phase::Deleting);
                let result = self.flush_leaf_batch(store, logger);
                timer.stop(Phase::Deleting);
                result?;
            }
        } else {
            self.non_leaf_ids.add(composite.to_string())?;
            for id in previous {
                self.previous_ids.add(id)?;
            }
        }
        Ok(())
    }

    /// Drain remaining leaf ids, finalize both external sorts, then delete
    /// non-leaf main documents followed by exclude-filtered previous
    /// documents.
    pub fn remove_documents(
        &mut self,
        store: &dyn DocumentStore,
        cancel: &AtomicBool,
        timer: &mut PhaseTimer,
        logger: &GcLoggerHandle,
    ) -> Result<()> {
        if !self.leaf_ids.is_empty() && !cancel.load(Ordering::Relaxed) {
            timer.start(Phase::Deleting);
            let result = self.flush_leaf_batch(store, logger);
            timer.stop(Phase::Deleting);
            result?;
        }

        timer.start(Phase::Sorting);
        self.non_leaf_ids.sort()?;
        self.previous_ids.sort()?;
        timer.stop(Phase::Sorting);

        timer.start(Phase::Deleting);
        let result = self.delete_non_leaf_and_previous(store, cancel, logger);
        timer.stop(Phase::Deleting);
        result
    }

    /// Copy accumulated counters into the run's overall [`VersionGcStats`].
    pub fn apply_to(&self, stats: &mut VersionGcStats) {
        stats.deleted_doc_gc_count += self.deleted_doc_count;
        stats.deleted_leaf_doc_gc_count += self.deleted_leaf_doc_count;
        stats.previous_doc_gc_count += self.previous_doc_gc_count;
        stats.recreated_count += self.recreated_count;
        stats.malformed_id_count += self.malformed_id_count;
    }

    /// Release the external-memory sets' spill files.
    pub fn close(&mut self) {
        self.non_leaf_ids.close();
        self.previous_ids.close();
    }

    fn flush_leaf_batch(&mut self, store: &dyn DocumentStore, logger: &GcLoggerHandle) -> Result<()> {
        if self.leaf_ids.is_empty() {
            return Ok(());
        }
        let batch: Vec<String> = self.leaf_ids.drain(..).collect();
        let outcome = delete_main_doc_batch(store, &batch)?;
        self.deleted_doc_count += outcome.removed as u64;
        self.deleted_leaf_doc_count += outcome.removed as u64;
        self.recreated_count += outcome.recreated as u64;
        self.exclude.extend(outcome.exclude_additions);
        self.report_progress(logger);
        Ok(())
    }

    fn delete_non_leaf_and_previous(&mut self, store: &dyn DocumentStore, cancel: &AtomicBool, logger: &GcLoggerHandle) -> Result<()> {
        {
            let ids = self.non_leaf_ids.get_ids()?;
            let mut batch = Vec::with_capacity(self.delete_batch_size);
            for id in ids {
                if cancel.load(Ordering::Relaxed) {
                    break;
                }
                batch.push(id?);
                if batch.len() >= self.delete_batch_size {
                    self.flush_non_leaf_batch(store, &mut batch, logger)?;
                    if cancel.load(Ordering::Relaxed) {
                        break;
                    }
                }
            }
            if !batch.is_empty() && !cancel.load(Ordering::Relaxed) {
                self.flush_non_leaf_batch(store, &mut batch, logger)?;
            }
        }

        if cancel.load(Ordering::Relaxed) {
            return Ok(());
        }

        let ids = self.previous_ids.get_ids()?;
        let mut batch = Vec::with_capacity(self.delete_batch_size);
        for id in ids {
            if cancel.load(Ordering::Relaxed) {
                break;
            }
            let id = id?;
            if self.exclude.contains(&id) {
                continue;
            }
            batch.push(id);
            if batch.len() >= self.delete_batch_size {
                self.flush_previous_batch(store, &mut batch)?;
                if cancel.load(Ordering::Relaxed) {
                    break;
                }
            }
        }
        if !batch.is_empty() && !cancel.load(Ordering::Relaxed) {
            self.flush_previous_batch(store, &mut batch)?;
        }
        Ok(())
    }

    fn flush_non_leaf_batch(&mut self, store: &dyn DocumentStore, batch: &mut Vec<String>, logger: &GcLoggerHandle) -> Result<()> {
        let outcome = delete_main_doc_batch(store, batch)?;
        self.deleted_doc_count += outcome.removed as u64;
        self.recreated_count += outcome.recreated as u64;
        self.exclude.extend(outcome.exclude_additions);
        batch.clear();
        self.report_progress(logger);
        Ok(())
    }

    fn flush_previous_batch(&mut self, store: &dyn DocumentStore, batch: &mut Vec<String>) -> Result<()> {
        let removed = store.remove_unconditional(batch)?;
        self.previous_doc_gc_count += removed as u64;
        batch.clear();
        Ok(())
    }

    fn report_progress(&mut self, logger: &GcLoggerHandle) {
        let total_done = self.deleted_doc_count + self.recreated_count;
        if total_done < self.next_progress_threshold {
            return;
        }
        let percent = if self.total_candidates > 0 {
            (total_done as f64 / self.total_candidates as f64 * 100.0).min(100.0)
        } else {
            0.0
        };
        logger.send(GcEvent::Progress {
            deleted: self.deleted_doc_count,
            recreated: self.recreated_count,
            percent,
        });
        while self.next_progress_threshold <= total_done {
            self.next_progress_threshold += self.progress_batch_size;
        }
    }
}

/// Build the conditional map from a batch of composite ids, issue the
/// conditional remove, then for any short-batch (fewer removed than
/// requested) fetch every id in the batch and, if still present, fold its
/// previous-doc ids into the exclude set so a concurrently recreated
/// node's history is never swept out from under it.
fn delete_main_doc_batch(store: &dyn DocumentStore, batch: &[String]) -> Result<BatchOutcome> {
    let mut condition = ConditionalRemoveBatch::new();
    for composite in batch {
        match CompositeId::parse(composite) {
            Ok(id) => {
                condition.insert(id.doc_id().to_string(), id.modified());
            }
            Err(GcError::InvalidModifiedSuffix { .. }) => {
                if let Some((doc_id, _)) = composite.rsplit_once('/') {
                    // Sentinel: never matches a real `modified` value, so
                    // this row is effectively skipped rather than deleted.
                    condition.insert(doc_id.to_string(), -1);
                }
            }
            Err(_) => {}
        }
    }

    let removed = store.remove_conditional(&condition)?;
    let mut exclude_additions = Vec::new();
    if removed < condition.len() {
        for doc_id in condition.keys() {
            if let Some(current) = store.find(doc_id)? {
                exclude_additions.extend(previous_doc_ids(store, &current));
            }
        }
    }
    let recreated = condition.len().saturating_sub(removed);

    Ok(BatchOutcome {
        removed,
        recreated,
        exclude_additions,
    })
}
