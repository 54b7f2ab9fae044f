//! Dual-write coordinator: writes every GC event to JSONL and, when the
//! `sqlite` feature is enabled, appends completed runs to the run-history
//! database.
//!
//! Architecture: a dedicated logger thread owns the [`JsonlWriter`] and the
//! optional [`SqliteLogger`]. All other threads send [`GcEvent`] values
//! through a bounded crossbeam channel. `send()` uses `try_send()` so the GC
//! job is never blocked by logging back-pressure.

#![allow(missing_docs)]

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::collector::stats::VersionGcStats;
use crate::core::errors::{GcError, Result};
use crate::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};
#[cfg(feature = "sqlite")]
use crate::logger::sqlite::{GcRunRow, SqliteLogger};

/// Default bounded channel capacity for log events.
const CHANNEL_CAPACITY: usize = 1024;

/// Events the GC job reports to the logger thread over its run.
#[derive(Debug, Clone)]
pub enum GcEvent {
    /// Emitted once at the start of a run, before the checkpoint gate.
    RunStarted {
        oldest_rev_ts_secs: i64,
        config_hash: String,
    },
    /// Emitted when the checkpoint gate blocked the run entirely.
    CheckpointBlocked { checkpoint: String },
    /// Emitted periodically during COLLECTING/DELETING.
    Progress {
        deleted: u64,
        recreated: u64,
        percent: f64,
    },
    /// Emitted for each candidate whose composite id failed to parse.
    MalformedId { id: String, reason: String },
    /// Emitted once at the end of a run that completed (whether or not it
    /// was canceled partway through).
    RunCompleted {
        started_at: String,
        config_hash: String,
        oldest_rev_ts_secs: i64,
        stats: VersionGcStats,
    },
    /// Emitted for a fatal error that aborted the run.
    Error { code: String, message: String },
    /// Sentinel to request graceful shutdown of the logger thread.
    Shutdown,
}

/// Thread-safe, cheaply-cloneable handle for sending log events.
///
/// Internally wraps a bounded crossbeam `Sender`. `send()` uses
/// `try_send()` so callers are never blocked by logging back-pressure.
#[derive(Clone)]
pub struct GcLoggerHandle {
    tx: Sender<GcEvent>,
    dropped_events: Arc<AtomicU64>,
}

impl GcLoggerHandle {
    /// A handle that discards every event, for tests and demos that don't
    /// care about log output.
    #[must_use]
    pub fn noop() -> Self {
        let (tx, rx) = bounded::<GcEvent>(1);
        drop(rx);
        Self {
            tx,
            dropped_events: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Send an event to the logger thread. Non-blocking.
    ///
    /// If the channel is full the event is dropped and the dropped-events
    /// counter is incremented. A disconnected receiver (logger thread
    /// exited) is treated the same way.
    pub fn send(&self, event: GcEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) => {
                self.dropped_events.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Number of events dropped due to channel back-pressure.
    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Request graceful shutdown of the logger thread. Does not block; join
    /// the thread handle returned by [`spawn_logger`] to wait for drain.
    pub fn shutdown(&self) {
        let _ = self.tx.send(GcEvent::Shutdown);
    }
}

/// Options for building the dual-write logger.
pub struct DualLoggerConfig {
    /// Path to the run-history SQLite database. `None` disables SQLite.
    pub sqlite_path: Option<PathBuf>,
    /// JSONL writer config (always active).
    pub jsonl_config: JsonlConfig,
    /// Bounded channel capacity.
    pub channel_capacity: usize,
}

impl Default for DualLoggerConfig {
    fn default() -> Self {
        Self {
            sqlite_path: Some(PathBuf::from(default_sqlite_path())),
            jsonl_config: JsonlConfig::default(),
            channel_capacity: CHANNEL_CAPACITY,
        }
    }
}

fn default_sqlite_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    format!("{home}/.local/share/revision-gc/runs.sqlite3")
}

/// Spawn the logger thread and return a handle.
///
/// The returned handle is `Clone + Send` and can be shared across threads.
/// The logger thread runs until `handle.shutdown()` is called or every
/// sender is dropped.
pub fn spawn_logger(config: DualLoggerConfig) -> Result<(GcLoggerHandle, thread::JoinHandle<()>)> {
    let (tx, rx) = bounded::<GcEvent>(config.channel_capacity);
    let dropped = Arc::new(AtomicU64::new(0));
    let dropped_clone = Arc::clone(&dropped);

    let handle = GcLoggerHandle {
        tx,
        dropped_events: dropped,
    };

    let join = thread::Builder::new()
        .name("revision-gc-logger".to_string())
        .spawn(move || {
            logger_thread_main(rx, config.sqlite_path, config.jsonl_config, dropped_clone);
        })
        .map_err(|e| GcError::Runtime {
            details: format!("failed to spawn logger thread: {e}"),
        })?;

    Ok((handle, join))
}

#[allow(clippy::needless_pass_by_value)]
fn logger_thread_main(
    rx: Receiver<GcEvent>,
    sqlite_path: Option<PathBuf>,
    jsonl_config: JsonlConfig,
    dropped: Arc<AtomicU64>,
) {
    #[cfg(feature = "sqlite")]
    let mut sqlite = sqlite_path.and_then(|p| match SqliteLogger::open(&p) {
        Ok(db) => Some(db),
        Err(e) => {
            eprintln!("[RGC-DUAL] failed to open SQLite at {}: {e}", p.display());
            None
        }
    });
    #[cfg(not(feature = "sqlite"))]
    let _ = sqlite_path;

    let mut jsonl = JsonlWriter::open(jsonl_config);
    #[cfg(feature = "sqlite")]
    let mut sqlite_failures: u32 = 0;

    while let Ok(event) = rx.recv() {
        let d = dropped.swap(0, Ordering::Relaxed);
        if d > 0 {
            let mut warn = LogEntry::new(EventType::Error, Severity::Warning);
            warn.error_message = Some(format!("{d} log events dropped due to back-pressure"));
            jsonl.write_entry(&warn);
        }

        if matches!(event, GcEvent::Shutdown) {
            jsonl.flush();
            jsonl.fsync();
            break;
        }

        #[cfg(feature = "sqlite")]
        if let GcEvent::RunCompleted {
            started_at,
            config_hash,
            oldest_rev_ts_secs,
            stats,
        } = &event
        {
            if let Some(db) = &sqlite {
                let row = GcRunRow {
                    started_at: started_at.clone(),
                    finished_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
                    config_hash: config_hash.clone(),
                    oldest_rev_ts_secs: *oldest_rev_ts_secs,
                    ignored_due_to_checkpoint: stats.ignored_gc_due_to_checkpoint,
                    canceled: stats.canceled,
                    stats: stats.clone(),
                };
                if db.log_run(&row).is_ok() {
                    sqlite_failures = 0;
                } else {
                    sqlite_failures += 1;
                    if sqlite_failures >= 3 {
                        eprintln!("[RGC-DUAL] SQLite write failed {sqlite_failures} times, disabling");
                        sqlite = None;
                    }
                }
            }
        }

        let entry = event_to_log_entry(&event);
        jsonl.write_entry(&entry);
    }

    jsonl.flush();
    jsonl.fsync();
}

fn event_to_log_entry(event: &GcEvent) -> LogEntry {
    match event {
        GcEvent::RunStarted {
            oldest_rev_ts_secs,
            config_hash,
        } => {
            let mut e = LogEntry::new(EventType::RunStarted, Severity::Info);
            e.oldest_rev_ts_secs = Some(*oldest_rev_ts_secs);
            e.config_hash = Some(config_hash.clone());
            e
        }
        GcEvent::CheckpointBlocked { checkpoint } => {
            let mut e = LogEntry::new(EventType::CheckpointBlocked, Severity::Info);
            e.checkpoint = Some(checkpoint.clone());
            e
        }
        GcEvent::Progress {
            deleted,
            recreated,
            percent,
        } => {
            let mut e = LogEntry::new(EventType::Progress, Severity::Info);
            e.deleted = Some(*deleted);
            e.recreated = Some(*recreated);
            e.percent = Some(*percent);
            e
        }
        GcEvent::MalformedId { id, reason } => {
            let mut e = LogEntry::new(EventType::MalformedId, Severity::Warning);
            e.id = Some(id.clone());
            e.reason = Some(reason.clone());
            e
        }
        GcEvent::RunCompleted { config_hash, oldest_rev_ts_secs, stats, .. } => {
            let severity = if stats.canceled { Severity::Warning } else { Severity::Info };
            let mut e = LogEntry::new(EventType::RunCompleted, severity);
            e.config_hash = Some(config_hash.clone());
            e.oldest_rev_ts_secs = Some(*oldest_rev_ts_secs);
            e.deleted = Some(stats.deleted_doc_gc_count);
            e.recreated = Some(stats.recreated_count);
            e.stats = Some(stats.clone());
            e
        }
        GcEvent::Error { code, message } => {
            let mut e = LogEntry::new(EventType::Error, Severity::Critical);
            e.error_code = Some(code.clone());
            e.error_message = Some(message.clone());
            e
        }
        GcEvent::Shutdown => LogEntry::new(EventType::RunCompleted, Severity::Info),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn spawn_and_shutdown_drains_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let config = DualLoggerConfig {
            sqlite_path: None,
            jsonl_config: JsonlConfig {
                path: dir.path().join("activity.jsonl"),
                fallback_path: None,
                ..JsonlConfig::default()
            },
            channel_capacity: 16,
        };
        let (handle, join) = spawn_logger(config).unwrap();
        handle.send(GcEvent::RunStarted {
            oldest_rev_ts_secs: 0,
            config_hash: "h".to_string(),
        });
        handle.shutdown();
        join.join().unwrap();

        let contents = std::fs::read_to_string(dir.path().join("activity.jsonl")).unwrap();
        assert!(contents.contains("run_started"));
    }

    #[test]
    fn noop_handle_never_blocks() {
        let handle = GcLoggerHandle::noop();
        for _ in 0..10 {
            handle.send(GcEvent::Progress {
                deleted: 0,
                recreated: 0,
                percent: 0.0,
            });
        }
        assert_eq!(handle.dropped_events(), 10);
    }

    #[test]
    fn dropped_events_are_reported_on_backpressure() {
        let dir = tempfile::tempdir().unwrap();
        let config = DualLoggerConfig {
            sqlite_path: None,
            jsonl_config: JsonlConfig {
                path: dir.path().join("activity.jsonl"),
                fallback_path: None,
                ..JsonlConfig::default()
            },
            channel_capacity: 1,
        };
        let (handle, join) = spawn_logger(config).unwrap();
        for _ in 0..50 {
            handle.send(GcEvent::Progress {
                deleted: 1,
                recreated: 0,
                percent: 1.0,
            });
        }
        std::thread::sleep(Duration::from_millis(50));
        handle.shutdown();
        join.join().unwrap();
    }
}
