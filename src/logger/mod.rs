//! Dual-write run-history logging: SQLite (WAL) + JSONL append-only with
//! graceful degradation through a chain of fallbacks.

pub mod dual;
pub mod jsonl;
#[cfg(feature = "sqlite")]
pub mod sqlite;
#[cfg(feature = "sqlite")]
pub mod stats;
