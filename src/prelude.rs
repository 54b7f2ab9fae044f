//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use revision_gc::prelude::*;
//! ```

// Core
pub use crate::core::config::GcConfig;
pub use crate::core::errors::{GcError, Result};
pub use crate::core::ids::CompositeId;

// Model
pub use crate::model::{HeadRevisionProvider, NodeDocument, NodeState, NodeStateResolver, PreviousDocument, RangeDescriptor, RevisionVector};

// Store
pub use crate::store::{Checkpoint, CheckpointRegistry, Clock, ConditionalRemoveBatch, DocumentStore, SplitDocGcType};

// Collector
pub use crate::collector::{Collaborators, GarbageCollector, Phase, VersionGcStats};

// Logger
pub use crate::logger::dual::{DualLoggerConfig, GcEvent, GcLoggerHandle, spawn_logger};
#[cfg(feature = "sqlite")]
pub use crate::logger::stats::{RunHistory, RunHistorySummary};
