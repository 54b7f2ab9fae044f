//! RGC-prefixed error types with structured error codes.
//!
//! Error classes follow the taxonomy of the GC job orchestrator: a second
//! concurrent run, store/sort I/O, and the two per-candidate id problems
//! (malformed composite id, unparseable modified-suffix) that are warned
//! on and skipped rather than treated as fatal.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the crate.
pub type Result<T> = std::result::Result<T, GcError>;

/// Top-level error type for the revision garbage collector.
#[derive(Debug, Error)]
pub enum GcError {
    #[error("[RGC-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[RGC-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[RGC-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    /// A second `gc()` invocation while one is already active.
    #[error("[RGC-2001] a garbage collection run is already in progress")]
    AlreadyRunning,

    /// Underlying document-store read/write failure. Fatal for the run.
    #[error("[RGC-2002] document store I/O failure in {context}: {details}")]
    StoreIo {
        context: &'static str,
        details: String,
    },

    /// Spill/read failure in the external-memory sort. Fatal for the run.
    #[error("[RGC-2003] external sort I/O failure: {details}")]
    SortIo { details: String },

    /// A composite id failed to parse under the path-depth rule. The
    /// candidate is dropped; the run continues.
    #[error("[RGC-2101] malformed composite id {id:?}: {reason}")]
    MalformedCandidateId { id: String, reason: &'static str },

    /// The `<modified>` suffix of a composite id was not a valid integer.
    #[error("[RGC-2102] invalid modified-timestamp suffix in composite id {id:?}")]
    InvalidModifiedSuffix { id: String },

    #[error("[RGC-2201] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[RGC-2202] SQL failure in {context}: {details}")]
    Sql {
        context: &'static str,
        details: String,
    },

    #[error("[RGC-3001] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[RGC-3002] channel closed in component {component}")]
    ChannelClosed { component: &'static str },

    #[error("[RGC-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl GcError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "RGC-1001",
            Self::MissingConfig { .. } => "RGC-1002",
            Self::ConfigParse { .. } => "RGC-1003",
            Self::AlreadyRunning => "RGC-2001",
            Self::StoreIo { .. } => "RGC-2002",
            Self::SortIo { .. } => "RGC-2003",
            Self::MalformedCandidateId { .. } => "RGC-2101",
            Self::InvalidModifiedSuffix { .. } => "RGC-2102",
            Self::Serialization { .. } => "RGC-2201",
            Self::Sql { .. } => "RGC-2202",
            Self::Io { .. } => "RGC-3001",
            Self::ChannelClosed { .. } => "RGC-3002",
            Self::Runtime { .. } => "RGC-3900",
        }
    }

    /// Whether the failure is fatal for the current run (bubbles up after
    /// releasing scratch files) rather than warn-and-skip for one candidate.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::StoreIo { .. } | Self::SortIo { .. } | Self::Io { .. } | Self::ChannelClosed { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for GcError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sql {
            context: "rusqlite",
            details: value.to_string(),
        }
    }
}

impl From<serde_json::Error> for GcError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for GcError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
