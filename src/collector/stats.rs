//! Public run statistics (`VersionGCStats`), returned from every `gc()` call
//! and persisted to the run-history store.

use serde::{Deserialize, Serialize};

use crate::collector::timer::Phase;

/// Statistics for a single garbage collection run.
///
/// `previous_doc_gc_count` is kept strictly disjoint from
/// `split_doc_gc_count`: the latter only ever reflects C7's native
/// split-document cleanup delegate, never C3's previous-doc deletions (see
/// DESIGN.md for why the upstream implementation this is modeled on
/// conflates the two).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionGcStats {
    /// Set when a checkpoint blocked this run entirely; no deletions ran.
    pub ignored_gc_due_to_checkpoint: bool,
    /// Set when `cancel()` was observed before the run completed normally.
    pub canceled: bool,
    /// Total main documents removed this run (leaf + non-leaf).
    pub deleted_doc_gc_count: u64,
    /// Of `deleted_doc_gc_count`, how many had no children and no previous
    /// documents at observation time.
    pub deleted_leaf_doc_gc_count: u64,
    /// Previous (split) documents removed via the unconditional,
    /// exclude-filtered batch path (C3).
    pub previous_doc_gc_count: u64,
    /// Candidates whose conditional remove failed because the document was
    /// recreated (or otherwise survived) between observation and delete.
    pub recreated_count: u64,
    /// Split documents reclaimed by the native delegate (C7).
    pub split_doc_gc_count: u64,
    /// Intermediate split documents reclaimed by the native delegate (C7).
    pub intermediate_split_doc_gc_count: u64,
    /// Malformed composite ids dropped during candidate processing.
    pub malformed_id_count: u64,
    /// Cumulative time spent in each of the five phases, in milliseconds,
    /// indexed by [`Phase::index`].
    pub phase_durations_millis: [u64; Phase::COUNT],
    /// Total wall-clock time for the run, in milliseconds.
    pub elapsed_millis: u64,
}

impl VersionGcStats {
    /// Duration spent in a given phase.
    #[must_use]
    pub const fn phase_millis(&self, phase: Phase) -> u64 {
        self.phase_durations_millis[phase.index()]
    }
}
