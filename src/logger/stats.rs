//! Run-history query engine: aggregate rollups over the `gc_runs` table for
//! dashboards and health checks, built on top of [`SqliteLogger`].

use std::path::Path;

use crate::core::errors::Result;
use crate::logger::sqlite::SqliteLogger;

/// Aggregate statistics over a window of recorded runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunHistorySummary {
    /// Number of runs in the window.
    pub run_count: u64,
    /// Sum of `deleted_doc_gc_count` across the window.
    pub total_deleted: u64,
    /// Sum of `recreated_count` across the window.
    pub total_recreated: u64,
    /// Sum of `previous_doc_gc_count` across the window.
    pub total_previous_doc_gc: u64,
    /// Sum of `malformed_id_count` across the window.
    pub total_malformed_ids: u64,
    /// Mean wall-clock duration per run, in milliseconds.
    pub average_elapsed_millis: f64,
    /// Runs in the window where `canceled` was set.
    pub canceled_runs: u64,
    /// Runs in the window that were blocked entirely by a checkpoint.
    pub checkpoint_blocked_runs: u64,
}

/// Query engine over the run-history database.
pub struct RunHistory {
    db: SqliteLogger,
}

impl RunHistory {
    /// Open (or create) the run-history database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            db: SqliteLogger::open(path)?,
        })
    }

    /// Expose the underlying logger, e.g. for the dual-write thread to log
    /// completed runs through the same connection.
    pub fn logger(&self) -> &SqliteLogger {
        &self.db
    }

    /// The `limit` most recent runs, newest first.
    pub fn recent(&self, limit: u32) -> Result<Vec<crate::logger::sqlite::GcRunRow>> {
        self.db.recent_runs(limit)
    }

    /// Roll up the most recent `limit` runs into a summary.
    pub fn summarize_recent(&self, limit: u32) -> Result<RunHistorySummary> {
        let runs = self.db.recent_runs(limit)?;
        Ok(summarize(&runs))
    }

    /// Total main documents deleted since `since_rfc3339`.
    pub fn total_deleted_since(&self, since_rfc3339: &str) -> Result<u64> {
        self.db.total_deleted_since(since_rfc3339)
    }

    /// Total number of runs ever recorded.
    pub fn run_count(&self) -> Result<u64> {
        self.db.run_count()
    }
}

fn summarize(runs: &[crate::logger::sqlite::GcRunRow]) -> RunHistorySummary {
    if runs.is_empty() {
        return RunHistorySummary::default();
    }

    let mut summary = RunHistorySummary {
        run_count: runs.len() as u64,
        ..Default::default()
    };
    let mut elapsed_total: u64 = 0;

    for run in runs {
        summary.total_deleted += run.stats.deleted_doc_gc_count;
        summary.total_recreated += run.stats.recreated_count;
        summary.total_previous_doc_gc += run.stats.previous_doc_gc_count;
        summary.total_malformed_ids += run.stats.malformed_id_count;
        elapsed_total += run.stats.elapsed_millis;
        if run.canceled {
            summary.canceled_runs += 1;
        }
        if run.ignored_due_to_checkpoint {
            summary.checkpoint_blocked_runs += 1;
        }
    }

    summary.average_elapsed_millis = elapsed_total as f64 / runs.len() as f64;
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::stats::VersionGcStats;
    use crate::logger::sqlite::GcRunRow;

    fn row(deleted: u64, canceled: bool, elapsed_millis: u64) -> GcRunRow {
        GcRunRow {
            started_at: "2026-01-01T00:00:00.000Z".to_string(),
            finished_at: "2026-01-01T00:00:01.000Z".to_string(),
            config_hash: "hash".to_string(),
            oldest_rev_ts_secs: 0,
            ignored_due_to_checkpoint: false,
            canceled,
            stats: VersionGcStats {
                deleted_doc_gc_count: deleted,
                elapsed_millis,
                ..Default::default()
            },
        }
    }

    #[test]
    fn empty_window_summarizes_to_default() {
        assert_eq!(summarize(&[]), RunHistorySummary::default());
    }

    #[test]
    fn summarize_aggregates_totals_and_average() {
        let runs = vec![row(10, false, 100), row(20, true, 300)];
        let summary = summarize(&runs);
        assert_eq!(summary.run_count, 2);
        assert_eq!(summary.total_deleted, 30);
        assert_eq!(summary.canceled_runs, 1);
        assert!((summary.average_elapsed_millis - 200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn open_and_summarize_recent_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let history = RunHistory::open(&dir.path().join("hist.sqlite3")).unwrap();
        history.logger().log_run(&row(5, false, 50)).unwrap();
        history.logger().log_run(&row(15, false, 150)).unwrap();

        let summary = history.summarize_recent(10).unwrap();
        assert_eq!(summary.run_count, 2);
        assert_eq!(summary.total_deleted, 20);
    }
}
