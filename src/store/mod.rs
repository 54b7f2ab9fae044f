//! External collaborators, modeled as named-interface traits: the document
//! store, the checkpoint registry, and the clock. Implementations live
//! outside this crate in production; [`memory`] provides in-memory test
//! doubles used by this crate's own test suite.

pub mod memory;

use crate::core::errors::Result;
use crate::model::{NodeDocument, PreviousDocument};

/// Split-document classes the GC is allowed to ask the store to reclaim
/// natively, once the main-document sweep completes. Intermediate
/// splits are handled by the store itself and never named here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SplitDocGcType {
    /// A leaf-level previous document with no further aggregation above it.
    DefaultLeaf,
    /// A previous document that only exists to pin a commit root.
    CommitRootOnly,
}

impl SplitDocGcType {
    /// The fixed set of types the orchestrator hands to the cleanup
    /// delegate at SPLITS_CLEANUP.
    #[must_use]
    pub const fn gc_eligible() -> &'static [Self] {
        &[Self::DefaultLeaf, Self::CommitRootOnly]
    }
}

/// A checkpoint: a client-registered revision the store must retain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    timestamp_millis: i64,
    label: String,
}

impl Checkpoint {
    /// Construct a checkpoint from its retention timestamp (millis since
    /// epoch) and a human-readable label.
    #[must_use]
    pub fn new(timestamp_millis: i64, label: impl Into<String>) -> Self {
        Self {
            timestamp_millis,
            label: label.into(),
        }
    }

    /// Retention timestamp, in milliseconds since epoch.
    #[must_use]
    pub const fn timestamp_millis(&self) -> i64 {
        self.timestamp_millis
    }

    /// Human-readable rendering for log lines.
    #[must_use]
    pub fn to_readable_string(&self) -> String {
        format!("{} (ts={})", self.label, self.timestamp_millis)
    }
}

/// External collaborator: the checkpoint registry.
pub trait CheckpointRegistry: Send + Sync {
    /// The oldest revision any registered checkpoint requires retained, if
    /// any checkpoints are registered.
    fn oldest_revision_to_keep(&self) -> Option<Checkpoint>;
}

/// External collaborator: a millis-since-epoch clock. Monotonicity is not
/// required but recommended.
pub trait Clock: Send + Sync {
    /// Current time, in milliseconds since epoch.
    fn now_millis(&self) -> i64;
}

/// Per-entry conditional-remove predicate: delete `id` only if its current
/// `modified` value still equals `expected_modified`.
pub type ConditionalRemoveBatch = std::collections::BTreeMap<String, i64>;

/// External collaborator: the document store.
///
/// `query` and the previous-document enumeration path return boxed,
/// forward-only iterators standing in for a lazy, closeable store cursor;
/// dropping the iterator is the store's cue to release any underlying
/// cursor resources.
pub trait DocumentStore: Send + Sync {
    /// Lazily enumerate every main document whose `modified` (seconds since
    /// epoch) is below `cutoff_secs`. May return false positives — the GC
    /// re-verifies liveness before deleting anything.
    fn query_possibly_deleted<'a>(
        &'a self,
        cutoff_secs: i64,
    ) -> Box<dyn Iterator<Item = NodeDocument> + 'a>;

    /// Fetch a single main document by id, if present.
    fn find(&self, id: &str) -> Result<Option<NodeDocument>>;

    /// Enumerate every previous document belonging to `main`, regardless of
    /// height. Only called when at least one range descriptor has
    /// height > 0.
    fn all_previous_docs<'a>(
        &'a self,
        main: &NodeDocument,
    ) -> Box<dyn Iterator<Item = PreviousDocument> + 'a>;

    /// Conditional bulk remove: delete each `id` in `batch` only if its
    /// current `modified` still equals the paired value. Each entry's
    /// check-and-delete is atomic; the batch as a whole is not
    /// transactional. Returns the number of entries actually removed.
    fn remove_conditional(&self, batch: &ConditionalRemoveBatch) -> Result<usize>;

    /// Unconditional bulk remove by id. Returns the number removed.
    fn remove_unconditional(&self, ids: &[String]) -> Result<usize>;

    /// Blocking delegate call: reclaim split documents of the given types
    /// older than `oldest_rev_ts_secs`, updating `stats` in place. Must
    /// respect cancellation on a best-effort basis.
    fn delete_split_documents(
        &self,
        gc_types: &[SplitDocGcType],
        oldest_rev_ts_secs: i64,
        stats: &mut crate::collector::stats::VersionGcStats,
    ) -> Result<()>;
}
