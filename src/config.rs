use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Deserialize;

/// Conflict-resolution rule applied when an incoming record's identifier
/// already exists in the store. Exactly one mode is active per run; the
/// variants are mutually exclusive philosophies (keep-old, keep-old-unless-
/// incoming-is-older, keep-new, delete-on-conflict) and are never mixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum, Default)]
#[serde(rename_all = "snake_case")]
pub enum UpsertMode {
    /// Insert new ids; leave existing rows untouched.
    InsertIgnore,
    /// Insert new ids, then overwrite an existing row only when the
    /// incoming date is on or before the stored date. Keeps the earliest
    /// date on conflict.
    InsertIgnoreRefreshIfOlder,
    /// Later ingestion unconditionally overwrites an existing row.
    #[default]
    InsertReplace,
    /// Insert new ids; an id that collides with a pre-existing row is
    /// deleted outright once the file's insert pass completes.
    InsertIgnorePurgeOnConflict,
}

/// How the fifth field of each row is interpreted and stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum, Default)]
#[serde(rename_all = "snake_case")]
pub enum ValueMode {
    /// Sale amount, parsed as an integer and stored in an INTEGER column.
    #[default]
    Numeric,
    /// Opaque text, stored as-is in a TEXT column.
    Text,
}

/// Business filter settings. Absent entirely (`filter: null` in YAML) the
/// concurrent filter stage is skipped and deduplicated records are written
/// directly.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Minimum sale amount; numeric values below this are rejected.
    pub min_value: i64,
    /// Street-type suffixes excluded after trimming the address.
    pub excluded_suffixes: Vec<String>,
    /// Drop every Nth otherwise-accepted record; 0 disables the rule.
    pub drop_every: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_value: 400_000,
            excluded_suffixes: vec!["AVE".into(), "CRES".into(), "PL".into()],
            drop_every: 10,
        }
    }
}

/// Run configuration, threaded explicitly into the pipeline and store
/// constructors. Loaded from an optional YAML file; CLI flags override
/// individual fields.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Filter worker count; 0 requests auto-detection from the CPU count.
    pub workers: usize,
    pub upsert_mode: UpsertMode,
    pub value_mode: ValueMode,
    pub filter: Option<FilterConfig>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            upsert_mode: UpsertMode::default(),
            value_mode: ValueMode::default(),
            filter: Some(FilterConfig::default()),
        }
    }
}

impl IngestConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open configuration file: {}", path.display()))?;
        serde_yaml::from_reader(file)
            .with_context(|| format!("failed to parse configuration YAML from {}", path.display()))
    }

    /// Worker count with auto-detection resolved and the minimum of 1
    /// enforced.
    pub fn effective_workers(&self) -> usize {
        let workers = if self.workers == 0 {
            num_cpus::get()
        } else {
            self.workers
        };
        workers.max(1)
    }
}
