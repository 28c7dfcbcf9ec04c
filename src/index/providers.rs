//! Seams to the workspace collaborators.
//!
//! The engine does not enumerate files or extract symbols itself; hosts plug
//! in a [`WorkspaceEnumerator`] and a [`SymbolProvider`]. The shipped
//! [`WalkEnumerator`] walks the filesystem gitignore-aware for CLI use;
//! [`NullSymbolProvider`] stands in when no language server is available.

use crate::error::Result;
use crate::store::ItemKind;
use globset::GlobSet;
use ignore::WalkBuilder;
use std::path::PathBuf;

/// One symbol reported by the workspace symbol source.
#[derive(Debug, Clone)]
pub struct SymbolInfo {
    pub name: String,
    pub kind: ItemKind,
    /// Enclosing container (class, module), if the provider knows it.
    pub container: Option<String>,
    /// Absolute path of the defining file.
    pub path: String,
    /// Start and end line, if known.
    pub range: Option<(u32, u32)>,
}

/// Produces the workspace file list, already filtered by exclusion globs.
/// Paths are workspace-relative with `/` separators.
pub trait WorkspaceEnumerator {
    fn enumerate(&self, excludes: &GlobSet) -> Result<Vec<String>>;
}

/// Produces the flat workspace symbol list; may legitimately be empty when
/// no language server is available.
pub trait SymbolProvider {
    fn workspace_symbols(&self) -> Result<Vec<SymbolInfo>>;
}

/// Filesystem walker honoring `.gitignore`, hidden-file conventions, and
/// the engine's exclusion globs.
pub struct WalkEnumerator {
    root: PathBuf,
}

impl WalkEnumerator {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }
}

impl WorkspaceEnumerator for WalkEnumerator {
    fn enumerate(&self, excludes: &GlobSet) -> Result<Vec<String>> {
        let walker = WalkBuilder::new(&self.root)
            .hidden(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .build();

        let mut paths = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(_) => continue,
            };
            if entry.file_type().map(|t| !t.is_file()).unwrap_or(true) {
                continue;
            }
            let rel = match entry.path().strip_prefix(&self.root) {
                Ok(rel) => rel,
                Err(_) => continue,
            };
            let rel = rel.to_string_lossy().replace('\\', "/");
            if excludes.is_match(&rel) {
                continue;
            }
            paths.push(rel);
        }
        paths.sort_unstable();
        Ok(paths)
    }
}

/// Enumerator over a fixed path list. Exclusion globs still apply.
pub struct StaticEnumerator {
    paths: Vec<String>,
}

impl StaticEnumerator {
    pub fn new(paths: Vec<String>) -> Self {
        Self { paths }
    }
}

impl WorkspaceEnumerator for StaticEnumerator {
    fn enumerate(&self, excludes: &GlobSet) -> Result<Vec<String>> {
        Ok(self
            .paths
            .iter()
            .filter(|p| !excludes.is_match(p.as_str()))
            .cloned()
            .collect())
    }
}

/// Symbol provider that has nothing to report.
pub struct NullSymbolProvider;

impl SymbolProvider for NullSymbolProvider {
    fn workspace_symbols(&self) -> Result<Vec<SymbolInfo>> {
        Ok(Vec::new())
    }
}

/// Symbol provider over a fixed list.
pub struct StaticSymbolProvider {
    symbols: Vec<SymbolInfo>,
}

impl StaticSymbolProvider {
    pub fn new(symbols: Vec<SymbolInfo>) -> Self {
        Self { symbols }
    }
}

impl SymbolProvider for StaticSymbolProvider {
    fn workspace_symbols(&self) -> Result<Vec<SymbolInfo>> {
        Ok(self.symbols.clone())
    }
}
