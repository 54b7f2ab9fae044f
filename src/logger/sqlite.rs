//! SQLite run-history logger: WAL-mode database storing one row per
//! completed (or canceled, or checkpoint-blocked) GC run.
//!
//! Uses Write-Ahead Logging for concurrent read/write and prepared
//! statements for insert throughput.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags, params};

use crate::collector::stats::VersionGcStats;
use crate::core::errors::{GcError, Result};

/// One row of the `gc_runs` table.
#[derive(Debug, Clone)]
pub struct GcRunRow {
    pub started_at: String,
    pub finished_at: String,
    pub config_hash: String,
    pub oldest_rev_ts_secs: i64,
    pub ignored_due_to_checkpoint: bool,
    pub canceled: bool,
    pub stats: VersionGcStats,
}

/// SQLite run-history logger with WAL mode and prepared-statement patterns.
pub struct SqliteLogger {
    conn: Connection,
    path: PathBuf,
}

impl SqliteLogger {
    /// Open (or create) the database at `path`, applying schema and PRAGMAs.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| GcError::io(parent, source))?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        apply_pragmas(&conn)?;
        apply_schema(&conn)?;

        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// Path to the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert one completed run into `gc_runs`.
    pub fn log_run(&self, row: &GcRunRow) -> Result<()> {
        let stats_json = serde_json::to_string(&row.stats)?;
        self.conn
            .prepare_cached(
                "INSERT INTO gc_runs (
                    started_at, finished_at, config_hash, oldest_rev_ts_secs,
                    ignored_due_to_checkpoint, canceled,
                    deleted_doc_gc_count, deleted_leaf_doc_gc_count,
                    previous_doc_gc_count, recreated_count,
                    split_doc_gc_count, intermediate_split_doc_gc_count,
                    malformed_id_count, elapsed_millis, stats_json
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15)",
            )?
            .execute(params![
                row.started_at,
                row.finished_at,
                row.config_hash,
                row.oldest_rev_ts_secs,
                row.ignored_due_to_checkpoint,
                row.canceled,
                row.stats.deleted_doc_gc_count as i64,
                row.stats.deleted_leaf_doc_gc_count as i64,
                row.stats.previous_doc_gc_count as i64,
                row.stats.recreated_count as i64,
                row.stats.split_doc_gc_count as i64,
                row.stats.intermediate_split_doc_gc_count as i64,
                row.stats.malformed_id_count as i64,
                row.stats.elapsed_millis as i64,
                stats_json,
            ])?;
        Ok(())
    }

    /// Query the most recent runs, newest first.
    pub fn recent_runs(&self, limit: u32) -> Result<Vec<GcRunRow>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT started_at, finished_at, config_hash, oldest_rev_ts_secs,
                    ignored_due_to_checkpoint, canceled, stats_json
             FROM gc_runs ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |r| {
            let stats_json: String = r.get(6)?;
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, i64>(3)?,
                r.get::<_, bool>(4)?,
                r.get::<_, bool>(5)?,
                stats_json,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (started_at, finished_at, config_hash, oldest_rev_ts_secs, ignored, canceled, stats_json) = row?;
            let stats: VersionGcStats = serde_json::from_str(&stats_json)?;
            out.push(GcRunRow {
                started_at,
                finished_at,
                config_hash,
                oldest_rev_ts_secs,
                ignored_due_to_checkpoint: ignored,
                canceled,
                stats,
            });
        }
        Ok(out)
    }

    /// Sum of `deleted_doc_gc_count` across every row with `started_at >=
    /// since`.
    pub fn total_deleted_since(&self, since: &str) -> Result<u64> {
        let total: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(deleted_doc_gc_count), 0) FROM gc_runs WHERE started_at >= ?1",
            params![since],
            |r| r.get(0),
        )?;
        Ok(total.max(0) as u64)
    }

    /// Number of runs recorded so far.
    pub fn run_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM gc_runs", [], |r| r.get(0))?;
        Ok(count.max(0) as u64)
    }
}

fn apply_pragmas(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;
    Ok(())
}

fn apply_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS gc_runs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            started_at TEXT NOT NULL,
            finished_at TEXT NOT NULL,
            config_hash TEXT NOT NULL,
            oldest_rev_ts_secs INTEGER NOT NULL,
            ignored_due_to_checkpoint INTEGER NOT NULL,
            canceled INTEGER NOT NULL,
            deleted_doc_gc_count INTEGER NOT NULL,
            deleted_leaf_doc_gc_count INTEGER NOT NULL,
            previous_doc_gc_count INTEGER NOT NULL,
            recreated_count INTEGER NOT NULL,
            split_doc_gc_count INTEGER NOT NULL,
            intermediate_split_doc_gc_count INTEGER NOT NULL,
            malformed_id_count INTEGER NOT NULL,
            elapsed_millis INTEGER NOT NULL,
            stats_json TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_gc_runs_started_at ON gc_runs(started_at);",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row() -> GcRunRow {
        GcRunRow {
            started_at: "2026-01-01T00:00:00.000Z".to_string(),
            finished_at: "2026-01-01T00:00:05.000Z".to_string(),
            config_hash: "abc123".to_string(),
            oldest_rev_ts_secs: 1_700_000_000,
            ignored_due_to_checkpoint: false,
            canceled: false,
            stats: VersionGcStats {
                deleted_doc_gc_count: 10,
                deleted_leaf_doc_gc_count: 6,
                ..Default::default()
            },
        }
    }

    #[test]
    fn log_and_fetch_recent_runs() {
        let dir = tempfile::tempdir().unwrap();
        let db = SqliteLogger::open(&dir.path().join("runs.sqlite3")).unwrap();
        db.log_run(&sample_row()).unwrap();

        let recent = db.recent_runs(10).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].stats.deleted_doc_gc_count, 10);
        assert_eq!(recent[0].config_hash, "abc123");
    }

    #[test]
    fn run_count_increments() {
        let dir = tempfile::tempdir().unwrap();
        let db = SqliteLogger::open(&dir.path().join("runs.sqlite3")).unwrap();
        assert_eq!(db.run_count().unwrap(), 0);
        db.log_run(&sample_row()).unwrap();
        db.log_run(&sample_row()).unwrap();
        assert_eq!(db.run_count().unwrap(), 2);
    }

    #[test]
    fn total_deleted_since_filters_by_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let db = SqliteLogger::open(&dir.path().join("runs.sqlite3")).unwrap();
        db.log_run(&sample_row()).unwrap();

        assert_eq!(db.total_deleted_since("2025-01-01T00:00:00.000Z").unwrap(), 10);
        assert_eq!(db.total_deleted_since("2027-01-01T00:00:00.000Z").unwrap(), 0);
    }

    #[test]
    fn reopen_preserves_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs.sqlite3");
        {
            let db = SqliteLogger::open(&path).unwrap();
            db.log_run(&sample_row()).unwrap();
        }
        let db = SqliteLogger::open(&path).unwrap();
        assert_eq!(db.run_count().unwrap(), 1);
    }
}
