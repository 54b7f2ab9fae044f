//! Configuration: TOML file + environment variable overrides + validated defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{GcError, Result};

/// Full garbage collector configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GcConfig {
    /// In-memory element count before an external-memory set spills to disk.
    pub overflow_to_disk_threshold: usize,
    /// Size of a single conditional-remove batch. Must stay strictly below
    /// `query_in_clause_limit`.
    pub delete_batch_size: usize,
    /// Cumulative deletions/recreations between progress log lines.
    pub progress_batch_size: u64,
    /// Scratch directory for external-sort spill files.
    pub scratch_dir: PathBuf,
    /// Path to the run-history SQLite database. `None` disables persistence.
    pub run_history_db: Option<PathBuf>,
    /// Path to the append-only JSONL activity log.
    pub activity_log: PathBuf,
    /// The backing store's bulk-query `IN (...)` clause limit, used only to
    /// validate `delete_batch_size` against it.
    pub query_in_clause_limit: usize,
    /// Path this configuration was loaded from (informational).
    #[serde(skip)]
    pub config_file: PathBuf,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            overflow_to_disk_threshold: 100_000,
            delete_batch_size: 450,
            progress_batch_size: 10_000,
            scratch_dir: env::temp_dir(),
            run_history_db: Some(default_run_history_db()),
            activity_log: default_activity_log(),
            query_in_clause_limit: 500,
            config_file: PathBuf::new(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    let home = env::var_os("HOME").map_or_else(|| PathBuf::from("/tmp"), PathBuf::from);
    home.join(".local/share/revision-gc")
}

fn default_run_history_db() -> PathBuf {
    default_data_dir().join("runs.sqlite3")
}

fn default_activity_log() -> PathBuf {
    default_data_dir().join("activity.jsonl")
}

impl GcConfig {
    /// Default configuration file path (`~/.config/revision-gc/config.toml`).
    #[must_use]
    pub fn default_path() -> PathBuf {
        let home = env::var_os("HOME").map_or_else(|| PathBuf::from("/tmp"), PathBuf::from);
        home.join(".config/revision-gc/config.toml")
    }

    /// Load config from an explicit path, the `REVISION_GC_CONFIG` env var,
    /// or the default path, then apply per-field environment overrides.
    ///
    /// A missing file at the default (non-explicit) path is not an error;
    /// built-in defaults are used. An explicitly requested path that is
    /// missing is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env_config = if path.is_none() {
            env::var_os("REVISION_GC_CONFIG").map(PathBuf::from)
        } else {
            None
        };
        let effective_path = path.map_or_else(
            || env_config.clone().unwrap_or_else(Self::default_path),
            Path::to_path_buf,
        );
        let is_explicit = path.is_some() || env_config.is_some();

        let mut cfg = if effective_path.exists() {
            let raw = fs::read_to_string(&effective_path).map_err(|source| GcError::io(&effective_path, source))?;
            toml::from_str::<Self>(&raw)?
        } else if is_explicit {
            return Err(GcError::MissingConfig {
                path: effective_path,
            });
        } else {
            Self::default()
        };

        cfg.config_file = effective_path;
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject configurations that would violate the batch-size/in-clause
    /// invariant or zero out a required threshold.
    pub fn validate(&self) -> Result<()> {
        if self.delete_batch_size == 0 {
            return Err(GcError::InvalidConfig {
                details: "delete_batch_size must be > 0".to_string(),
            });
        }
        if self.overflow_to_disk_threshold == 0 {
            return Err(GcError::InvalidConfig {
                details: "overflow_to_disk_threshold must be > 0".to_string(),
            });
        }
        if self.delete_batch_size >= self.query_in_clause_limit {
            return Err(GcError::InvalidConfig {
                details: format!(
                    "delete_batch_size ({}) must be strictly less than query_in_clause_limit ({})",
                    self.delete_batch_size, self.query_in_clause_limit
                ),
            });
        }
        Ok(())
    }

    /// Deterministic hash of the effective configuration, for logging the
    /// config actually in effect at run start without dumping every field.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        set_env_usize(
            "REVISION_GC_OVERFLOW_TO_DISK_THRESHOLD",
            &mut self.overflow_to_disk_threshold,
        )?;
        set_env_usize("REVISION_GC_DELETE_BATCH_SIZE", &mut self.delete_batch_size)?;
        set_env_u64("REVISION_GC_PROGRESS_BATCH_SIZE", &mut self.progress_batch_size)?;
        set_env_usize("REVISION_GC_QUERY_IN_CLAUSE_LIMIT", &mut self.query_in_clause_limit)?;
        if let Some(v) = env::var_os("REVISION_GC_SCRATCH_DIR") {
            self.scratch_dir = PathBuf::from(v);
        }
        if let Some(v) = env::var_os("REVISION_GC_ACTIVITY_LOG") {
            self.activity_log = PathBuf::from(v);
        }
        if let Some(v) = env::var_os("REVISION_GC_RUN_HISTORY_DB") {
            let text = v.to_string_lossy();
            self.run_history_db = if text.eq_ignore_ascii_case("none") || text.is_empty() {
                None
            } else {
                Some(PathBuf::from(v))
            };
        }
        Ok(())
    }
}

fn set_env_usize(var: &str, target: &mut usize) -> Result<()> {
    if let Some(raw) = env::var_os(var) {
        let text = raw.to_string_lossy();
        *target = text.parse::<usize>().map_err(|_| GcError::InvalidConfig {
            details: format!("{var} must be an unsigned integer, got {text:?}"),
        })?;
    }
    Ok(())
}

fn set_env_u64(var: &str, target: &mut u64) -> Result<()> {
    if let Some(raw) = env::var_os(var) {
        let text = raw.to_string_lossy();
        *target = text.parse::<u64>().map_err(|_| GcError::InvalidConfig {
            details: format!("{var} must be an unsigned integer, got {text:?}"),
        })?;
    }
    Ok(())
}
