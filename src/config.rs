//! Engine configuration.
//!
//! All options have defaults; a workspace can override them through
//! `.navix/config.toml`. Priority: explicit field assignment > config file >
//! defaults. `case_sensitive` is fixed at index build time — changing it
//! requires a full rebuild.

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Directory under the workspace root holding the index database and the
/// optional config file.
pub const DATA_DIR: &str = ".navix";

/// Debounce window between a change event and the batch that applies it.
pub const DEBOUNCE: Duration = Duration::from_secs(1);

/// Interval of the periodic persistence flush.
pub const FLUSH_INTERVAL: Duration = Duration::from_secs(5);

/// Exclusions applied on top of whatever the configuration adds: version
/// control, dependency caches, build outputs, editor scratch, and the
/// engine's own data directory.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "**/.git/**",
    "**/.hg/**",
    "**/.svn/**",
    "**/node_modules/**",
    "**/target/**",
    "**/build/**",
    "**/dist/**",
    "**/out/**",
    "**/__pycache__/**",
    "**/.venv/**",
    "**/venv/**",
    "**/.idea/**",
    "**/.vscode/**",
    "**/*.swp",
    "**/.navix/**",
];

/// Which storage backend the engine uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// SQLite-backed store, survives restarts.
    #[default]
    Persistent,
    /// Sharded in-memory store, rebuilt on every start.
    Memory,
}

/// Engine options. See the field defaults for the out-of-the-box behavior.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    /// Include file items in results.
    pub include_files: bool,
    /// Include symbol items in results.
    pub include_symbols: bool,
    /// Hard cap on result list length.
    pub max_results: usize,
    /// Extra exclusion globs, unioned with [`DEFAULT_EXCLUDES`].
    pub exclude_patterns: Vec<String>,
    /// Case-sensitive trigram alphabet and token storage. Build-time only.
    pub case_sensitive: bool,
    /// Queries shorter than this skip the trigram lookup and rely on the
    /// token and abbreviation paths.
    pub min_trigram_length: usize,
    /// Enable the word-token index and its query stage.
    pub enable_camelcase: bool,
    /// Commit granularity for bulk writes on the persistent store.
    pub batch_size: usize,
    /// Storage backend.
    pub storage: StorageKind,
    /// Verbose log routing.
    pub debug: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            include_files: true,
            include_symbols: true,
            max_results: 50,
            exclude_patterns: Vec::new(),
            case_sensitive: false,
            min_trigram_length: 3,
            enable_camelcase: true,
            batch_size: 10_000,
            storage: StorageKind::Persistent,
            debug: false,
        }
    }
}

impl SearchConfig {
    /// Load configuration for a workspace: `.navix/config.toml` if present
    /// and parseable, defaults otherwise.
    pub fn load(workspace_root: &Path) -> Self {
        let path = workspace_root.join(DATA_DIR).join("config.toml");
        if !path.exists() {
            return Self::default();
        }
        match fs::read_to_string(&path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    warn!("ignoring malformed {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("could not read {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Build the exclusion matcher: configured patterns unioned with the
    /// built-in defaults. Invalid patterns are skipped with a warning rather
    /// than failing the build.
    pub fn exclusion_globs(&self) -> GlobSet {
        let mut builder = GlobSetBuilder::new();
        for pattern in DEFAULT_EXCLUDES
            .iter()
            .copied()
            .chain(self.exclude_patterns.iter().map(String::as_str))
        {
            match Glob::new(pattern) {
                Ok(glob) => {
                    builder.add(glob);
                }
                Err(e) => warn!("skipping invalid exclude pattern {:?}: {}", pattern, e),
            }
        }
        // An empty set can't be produced from the non-empty defaults; a
        // build failure would mean a broken default list.
        builder.build().unwrap_or_else(|_| GlobSet::empty())
    }
}
