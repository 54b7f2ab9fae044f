//! The garbage collector itself: candidate classification and batched
//! deletion (C3), previous-document enumeration (C4), phase timing (C5),
//! the job orchestrator and split-document cleanup delegation (C6/C7), and
//! the statistics every run returns.

pub mod batcher;
pub mod job;
pub mod previous;
pub mod stats;
pub mod timer;

pub use job::{Collaborators, GarbageCollector};
pub use stats::VersionGcStats;
pub use timer::{Phase, PhaseTimer};
