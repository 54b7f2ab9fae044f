//! The revision/clock subsystem is an external collaborator; this module
//! only carries the identifiers the GC needs to pass through opaquely.

use std::fmt;

/// An opaque point in the store's revision history.
///
/// The real revision subsystem encodes a vector clock per cluster node;
/// the GC never interprets its internals, only compares instances for
/// equality and threads them through to [`crate::store::DocumentStore`]
/// calls. Modeled here as an opaque string so callers can plug in whatever
/// their store's revision encoding actually is.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RevisionVector(String);

impl RevisionVector {
    /// Wrap an opaque revision-vector encoding.
    #[must_use]
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// The opaque encoding, for passing to store calls.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RevisionVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The result of resolving a node at a given revision: present iff the node
/// exists (is live) at that point in history.
///
/// Resolution logic itself belongs to the node-state resolver, an external
/// collaborator; this crate only needs to know whether resolution found a
/// live node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeState {
    /// The resolved node's id, for logging/debugging.
    pub id: String,
}

/// External collaborator: resolves a node's state at a given revision.
///
/// A faithful implementation walks the node's commit history and any
/// overlay/branch structure to answer "does this node exist at `revision`
/// considering writes visible at that point". The GC only ever asks this
/// question at `head_revision`, captured once at run start.
pub trait NodeStateResolver: Send + Sync {
    /// Resolve whether `node` is live at `revision`.
    fn resolve_node_at_revision(
        &self,
        node: &crate::model::NodeDocument,
        revision: &RevisionVector,
    ) -> Option<NodeState>;
}

/// External collaborator: supplies the revision vector captured once at
/// run start and used throughout that run to decide whether a candidate
/// is truly live "now".
pub trait HeadRevisionProvider: Send + Sync {
    /// The current head revision vector.
    fn head_revision(&self) -> RevisionVector;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revision_vector_round_trips_as_str() {
        let rv = RevisionVector::new("r1-2-3");
        assert_eq!(rv.as_str(), "r1-2-3");
        assert_eq!(rv.to_string(), "r1-2-3");
    }
}
