//! The main document: the authoritative record of a node at the current
//! revision, plus the range descriptors pointing at its previous documents.

use std::collections::BTreeMap;

use crate::model::revision::{NodeState, NodeStateResolver, RevisionVector};

/// A range descriptor for one previous (split) document belonging to a
/// main document: which revision range it covers and at what aggregation
/// height.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeDescriptor {
    /// The revision this range is keyed under in the main document's map.
    pub revision: String,
    /// `0` means the previous document is directly addressable from the
    /// main document (first-level); `> 0` means it is an intermediate
    /// aggregation that must be fetched to enumerate further.
    pub height: u32,
}

impl RangeDescriptor {
    /// A first-level (height 0) range descriptor.
    #[must_use]
    pub fn first_level(revision: impl Into<String>) -> Self {
        Self {
            revision: revision.into(),
            height: 0,
        }
    }

    /// Whether this range is directly addressable without a store read.
    #[must_use]
    pub const fn is_first_level(&self) -> bool {
        self.height == 0
    }
}

/// The authoritative record of a node: identifier, modification timestamp,
/// whether it has children, and the range descriptors for its previous
/// documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDocument {
    /// Path-derived node identifier.
    pub id: String,
    /// `modified_in_secs`: seconds since epoch.
    pub modified: i64,
    /// Whether this node currently has children.
    pub has_children: bool,
    /// Ordered mapping from revision to range descriptor, one entry per
    /// previous document belonging to this node.
    pub previous_ranges: BTreeMap<String, RangeDescriptor>,
}

impl NodeDocument {
    /// Construct a node document with no previous ranges.
    #[must_use]
    pub fn new(id: impl Into<String>, modified: i64, has_children: bool) -> Self {
        Self {
            id: id.into(),
            modified,
            has_children,
            previous_ranges: BTreeMap::new(),
        }
    }

    /// Attach a previous-document range descriptor.
    #[must_use]
    pub fn with_previous_range(mut self, descriptor: RangeDescriptor) -> Self {
        self.previous_ranges.insert(descriptor.revision.clone(), descriptor);
        self
    }

    /// Resolve this node's state at `revision`, delegating to the external
    /// node-state resolver. Returns `None` if the node does not exist at
    /// that revision (i.e. it is actually deleted, not just a candidate).
    pub fn resolve_node_at_revision(
        &self,
        resolver: &dyn NodeStateResolver,
        revision: &RevisionVector,
    ) -> Option<NodeState> {
        resolver.resolve_node_at_revision(self, revision)
    }

    /// Whether every previous-range descriptor is first-level (height 0),
    /// meaning the fast derivation path in the previous-doc enumerator
    /// applies without further I/O.
    #[must_use]
    pub fn all_previous_ranges_first_level(&self) -> bool {
        self.previous_ranges.values().all(RangeDescriptor::is_first_level)
    }
}
