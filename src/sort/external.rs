//! External-memory sorted string set: append-buffer with threshold-triggered
//! spill to disk, then a lazy k-way merge on [`ExternalSortedSet::get_ids`].
//!
//! Mirrors the append-then-spill-then-merge shape this crate's run-history
//! writer uses for its own rotation (buffer, flush, reopen-to-read), just
//! applied to sorted runs instead of log lines. `add` spills the in-memory
//! buffer to a fresh temp file once it grows past the configured threshold;
//! `sort` finalizes the remaining buffer; `get_ids` merges every spilled run
//! plus the final buffer in ascending order under the injected comparator
//! without ever materializing the whole set in memory.

use std::cmp::Ordering;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::PathBuf;
use std::sync::Arc;

use tempfile::NamedTempFile;

use crate::core::errors::{GcError, Result};
use crate::sort::comparator::compare_composite_ids;

/// An injected total-order comparator over raw id strings.
pub type IdComparator = Arc<dyn Fn(&str, &str) -> Ordering + Send + Sync>;

/// The default comparator: [`compare_composite_ids`].
#[must_use]
pub fn default_comparator() -> IdComparator {
    Arc::new(compare_composite_ids)
}

/// Append-buffer-with-spill external sort over id strings.
///
/// Not `Clone`: a set owns its spill files and must be released via
/// [`ExternalSortedSet::close`].
pub struct ExternalSortedSet {
    comparator: IdComparator,
    scratch_dir: PathBuf,
    threshold: usize,
    buffer: Vec<String>,
    runs: Vec<NamedTempFile>,
    total_count: u64,
    sorted: bool,
}

impl ExternalSortedSet {
    /// Build an empty set. `threshold` is the in-memory element count past
    /// which `add` spills the buffer to a new sorted run under
    /// `scratch_dir`.
    #[must_use]
    pub fn new(scratch_dir: impl Into<PathBuf>, threshold: usize, comparator: IdComparator) -> Self {
        Self {
            comparator,
            scratch_dir: scratch_dir.into(),
            threshold: threshold.max(1),
            buffer: Vec::new(),
            runs: Vec::new(),
            total_count: 0,
            sorted: false,
        }
    }

    /// Append an id. Transparently spills to disk once the buffer exceeds
    /// the configured threshold.
    pub fn add(&mut self, id: impl Into<String>) -> Result<()> {
        self.buffer.push(id.into());
        self.total_count += 1;
        self.sorted = false;
        if self.buffer.len() > self.threshold {
            self.spill()?;
        }
        Ok(())
    }

    /// Total number of ids ever appended (including ones already spilled).
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.total_count
    }

    /// Finalize the structure: sorts whatever remains in the in-memory
    /// buffer. Idempotent — a second call with no intervening `add` is a
    /// no-op.
    pub fn sort(&mut self) -> Result<()> {
        if self.sorted {
            return Ok(());
        }
        let cmp = Arc::clone(&self.comparator);
        self.buffer.sort_by(|a, b| cmp(a, b));
        self.sorted = true;
        Ok(())
    }

    /// A lazy, single-pass ascending sequence over every id ever appended,
    /// merging all spilled runs with the in-memory remainder.
    ///
    /// # Errors
    ///
    /// Returns [`GcError::SortIo`] if `sort()` has not yet been called, or
    /// if a spill file cannot be reopened for reading.
    pub fn get_ids(&self) -> Result<SortedIds<'_>> {
        if !self.sorted {
            return Err(GcError::SortIo {
                details: "get_ids() called before sort()".to_string(),
            });
        }
        let mut cursors = Vec::with_capacity(self.runs.len());
        for run in &self.runs {
            let file = run.reopen().map_err(|source| GcError::SortIo {
                details: format!("failed to reopen spill file: {source}"),
            })?;
            let mut cursor = RunCursor {
                lines: BufReader::new(file).lines(),
                peeked: None,
            };
            cursor.advance()?;
            cursors.push(cursor);
        }
        Ok(SortedIds {
            comparator: Arc::clone(&self.comparator),
            cursors,
            mem: &self.buffer,
            mem_idx: 0,
        })
    }

    /// Release every spill file. Errors are logged, not propagated — this
    /// mirrors the store-side close-time degradation policy elsewhere in
    /// this crate: cleanup failures must never mask the run's real result.
    pub fn close(&mut self) {
        for run in self.runs.drain(..) {
            if let Err(err) = run.close() {
                eprintln!("[RGC-SORT] failed to remove spill file: {err}");
            }
        }
        self.buffer.clear();
        self.total_count = 0;
        self.sorted = false;
    }

    fn spill(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        std::fs::create_dir_all(&self.scratch_dir).map_err(|source| GcError::io(&self.scratch_dir, source))?;
        let cmp = Arc::clone(&self.comparator);
        self.buffer.sort_by(|a, b| cmp(a, b));

        let mut tmp = tempfile::Builder::new()
            .prefix("rgc-sort-")
            .suffix(".run")
            .tempfile_in(&self.scratch_dir)
            .map_err(|source| GcError::SortIo {
                details: format!("failed to create spill file: {source}"),
            })?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            for line in &self.buffer {
                write_line(&mut writer, line)?;
            }
            writer.flush().map_err(|source| GcError::SortIo {
                details: source.to_string(),
            })?;
        }
        self.runs.push(tmp);
        self.buffer.clear();
        Ok(())
    }
}

fn write_line(writer: &mut BufWriter<&mut File>, line: &str) -> Result<()> {
    writer.write_all(line.as_bytes()).map_err(|source| GcError::SortIo {
        details: source.to_string(),
    })?;
    writer.write_all(b"\n").map_err(|source| GcError::SortIo {
        details: source.to_string(),
    })
}

struct RunCursor {
    lines: Lines<BufReader<File>>,
    peeked: Option<String>,
}

impl RunCursor {
    fn advance(&mut self) -> Result<()> {
        self.peeked = match self.lines.next() {
            Some(Ok(line)) => Some(line),
            Some(Err(source)) => {
                return Err(GcError::SortIo {
                    details: source.to_string(),
                });
            }
            None => None,
        };
        Ok(())
    }
}

/// Lazy ascending merge over every spilled run plus the in-memory
/// remainder. Each `next()` call pulls from whichever source currently
/// holds the smallest head under the injected comparator.
pub struct SortedIds<'a> {
    comparator: IdComparator,
    cursors: Vec<RunCursor>,
    mem: &'a [String],
    mem_idx: usize,
}

impl Iterator for SortedIds<'_> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let run_count = self.cursors.len();
        let mut best_idx: Option<usize> = None;
        let mut best_key: Option<&str> = None;

        for (i, cursor) in self.cursors.iter().enumerate() {
            if let Some(head) = cursor.peeked.as_deref() {
                let take = match best_key {
                    None => true,
                    Some(current) => (self.comparator)(head, current) == Ordering::Less,
                };
                if take {
                    best_key = Some(head);
                    best_idx = Some(i);
                }
            }
        }

        if self.mem_idx < self.mem.len() {
            let head = self.mem[self.mem_idx].as_str();
            let take = match best_key {
                None => true,
                Some(current) => (self.comparator)(head, current) == Ordering::Less,
            };
            if take {
                best_idx = Some(run_count);
            }
        }

        match best_idx {
            None => None,
            Some(i) if i == run_count => {
                let value = self.mem[self.mem_idx].clone();
                self.mem_idx += 1;
                Some(Ok(value))
            }
            Some(i) => {
                let value = self.cursors[i].peeked.take().unwrap_or_default();
                if let Err(err) = self.cursors[i].advance() {
                    return Some(Err(err));
                }
                Some(Ok(value))
            }
        }
    }
}
