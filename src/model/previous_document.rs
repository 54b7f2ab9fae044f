//! Previous (split) documents: historical slices of a node's revisions.

/// A historical slice of a node's revisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviousDocument {
    /// The previous document's own id.
    pub id: String,
}

/// Deterministically derive a first-level previous document's id from its
/// owning main document's path, the covered revision, and height `0`.
///
/// No store read is required: the id encoding is a pure function of these
/// three inputs, which is exactly the property the previous-doc enumerator
/// (C4) relies on to skip I/O for the common case.
#[must_use]
pub fn previous_id_for(main_path: &str, revision: &str, height: u32) -> String {
    format!("{main_path}/prev/{revision}/{height}")
}
