//! Composite GC identifier grammar: `"<doc-id>/<modified-seconds>"`.
//!
//! The suffix carries the modification timestamp observed at collection
//! time through to the conditional remove. Consumers split on the *last*
//! `/`, since node-document ids are themselves path-derived and may
//! contain `/`. `CompositeId::new` asserts that the constructed string
//! round-trips through that split.

use crate::core::errors::GcError;

/// A GC identifier tagging a candidate document id with its observed
/// `modified` timestamp (seconds since epoch).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CompositeId {
    doc_id: String,
    modified: i64,
}

impl CompositeId {
    /// Build a composite id from a document id and its observed
    /// modification timestamp.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if `doc_id` is empty, since an empty id can
    /// never round-trip through [`CompositeId::parse`].
    pub fn new(doc_id: impl Into<String>, modified: i64) -> Self {
        let doc_id = doc_id.into();
        debug_assert!(!doc_id.is_empty(), "composite id requires a non-empty doc id");
        let id = Self { doc_id, modified };
        debug_assert_eq!(
            Self::parse(&id.to_string()).as_ref(),
            Ok(&id),
            "composite id must round-trip through parse()"
        );
        id
    }

    /// Fallible constructor: build a composite id, rejecting an empty doc
    /// id instead of panicking. Used at candidate-observation time where a
    /// malformed id must be warned-and-skipped rather than crash the run.
    pub fn try_new(doc_id: impl Into<String>, modified: i64) -> Result<Self, GcError> {
        let doc_id = doc_id.into();
        if doc_id.is_empty() {
            return Err(GcError::MalformedCandidateId {
                id: format!("/{modified}"),
                reason: "empty doc id",
            });
        }
        Ok(Self { doc_id, modified })
    }

    /// Parse `"<doc-id>/<modified>"`, splitting on the last `/`.
    ///
    /// Malformed ids (no `/`, or a suffix that isn't a signed integer) are
    /// reported via [`GcError::MalformedCandidateId`] /
    /// [`GcError::InvalidModifiedSuffix`] respectively, matching the
    /// warn-and-skip policy for individual candidates.
    pub fn parse(composite: &str) -> Result<Self, GcError> {
        let (doc_id, suffix) = composite.rsplit_once('/').ok_or_else(|| GcError::MalformedCandidateId {
            id: composite.to_string(),
            reason: "missing '/' separator",
        })?;
        if doc_id.is_empty() {
            return Err(GcError::MalformedCandidateId {
                id: composite.to_string(),
                reason: "empty doc id",
            });
        }
        let modified = suffix.parse::<i64>().map_err(|_| GcError::InvalidModifiedSuffix {
            id: composite.to_string(),
        })?;
        Ok(Self {
            doc_id: doc_id.to_string(),
            modified,
        })
    }

    /// The underlying document id.
    #[must_use]
    pub fn doc_id(&self) -> &str {
        &self.doc_id
    }

    /// The observed modification timestamp, in seconds since epoch.
    #[must_use]
    pub const fn modified(&self) -> i64 {
        self.modified
    }
}

impl std::fmt::Display for CompositeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.doc_id, self.modified)
    }
}

/// Parse a stored composite id's `modified` suffix, substituting `-1` on
/// failure so the conditional remove predicate can never match (effectively
/// skipping that row rather than failing the batch).
#[must_use]
pub fn modified_suffix_or_sentinel(composite: &str) -> i64 {
    CompositeId::parse(composite).map_or(-1, |id| id.modified())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_display_and_parse() {
        let id = CompositeId::new("/content/foo/bar", 1_700_000_000);
        let text = id.to_string();
        assert_eq!(text, "/content/foo/bar/1700000000");
        let parsed = CompositeId::parse(&text).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn doc_id_may_contain_slashes() {
        let id = CompositeId::new("/a/b/c", 5);
        assert_eq!(id.doc_id(), "/a/b/c");
        assert_eq!(id.modified(), 5);
    }

    #[test]
    fn negative_modified_parses() {
        let parsed = CompositeId::parse("doc-1/-42").unwrap();
        assert_eq!(parsed.modified(), -42);
    }

    #[test]
    fn missing_separator_is_malformed() {
        let err = CompositeId::parse("no-separator-here").unwrap_err();
        assert!(matches!(err, GcError::MalformedCandidateId { .. }));
    }

    #[test]
    fn non_numeric_suffix_is_invalid() {
        let err = CompositeId::parse("doc-1/not-a-number").unwrap_err();
        assert!(matches!(err, GcError::InvalidModifiedSuffix { .. }));
    }

    #[test]
    fn sentinel_substitution_on_bad_suffix() {
        assert_eq!(modified_suffix_or_sentinel("doc-1/garbage"), -1);
        assert_eq!(modified_suffix_or_sentinel("doc-1/99"), 99);
    }

    #[test]
    fn try_new_rejects_empty_doc_id() {
        assert!(CompositeId::try_new("", 1).is_err());
        assert!(CompositeId::try_new("/a/b", 1).is_ok());
    }
}
