//! Index construction and incremental maintenance.
//!
//! The builder owns the write side of the engine: the initial full sweep
//! over the workspace, the debounced change batches that keep the index
//! current, and `refresh` (clear + rebuild). Every sweep runs inside one
//! explicit transaction with auto-commit disabled, so a crash or a cancel
//! never leaves a half-indexed store behind.

use crate::config::{SearchConfig, DEBOUNCE};
use crate::error::{Error, Result};
use crate::index::pending::{ChangeKind, PendingChanges};
use crate::index::providers::{SymbolInfo, SymbolProvider, WorkspaceEnumerator};
use crate::store::{ItemId, ItemStore, NewItem, TokenPosting, TrigramPosting};
use crate::text::{split_words, trigrams};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

/// Shared handle to the storage backend. The mutex serializes every
/// mutating operation; a query issued during a batch observes either the
/// whole batch or none of it.
pub type SharedStore = Arc<Mutex<Box<dyn ItemStore>>>;

/// Progress callback: `(indexed, total)`.
pub type ProgressFn = dyn Fn(usize, usize) + Send + Sync;

/// How often the initial build reports progress and polls for cancellation.
pub const PROGRESS_INTERVAL: usize = 50;

pub struct IndexBuilder {
    store: SharedStore,
    config: SearchConfig,
    pending: Mutex<PendingChanges>,
    cancel: AtomicBool,
}

impl IndexBuilder {
    pub fn new(store: SharedStore, config: SearchConfig) -> Self {
        Self {
            store,
            config,
            pending: Mutex::new(PendingChanges::new(DEBOUNCE)),
            cancel: AtomicBool::new(false),
        }
    }

    fn lock_store(&self) -> MutexGuard<'_, Box<dyn ItemStore>> {
        self.store.lock().unwrap_or_else(|poison| poison.into_inner())
    }

    fn lock_pending(&self) -> MutexGuard<'_, PendingChanges> {
        self.pending.lock().unwrap_or_else(|poison| poison.into_inner())
    }

    /// Ask a running initial build to stop at its next check point. The
    /// build rolls back and surfaces [`Error::Cancelled`].
    pub fn request_cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    fn check_cancel(&self) -> Result<()> {
        if self.cancel.load(Ordering::SeqCst) {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Run the initial full indexing sweep if the store is empty. Returns
    /// the number of items indexed (0 when the store was already built).
    pub fn build_initial(
        &self,
        enumerator: &dyn WorkspaceEnumerator,
        symbols: &dyn SymbolProvider,
        progress: Option<&ProgressFn>,
    ) -> Result<usize> {
        self.cancel.store(false, Ordering::SeqCst);

        let mut store = self.lock_store();
        if store.stats()?.items > 0 {
            debug!("index already built, skipping initial sweep");
            return Ok(0);
        }

        let excludes = self.config.exclusion_globs();
        let files = enumerator.enumerate(&excludes)?;
        let symbol_list = symbols.workspace_symbols()?;
        let total = files.len() + symbol_list.len();
        info!(files = files.len(), symbols = symbol_list.len(), "starting initial build");

        store.set_auto_commit(false);
        store.begin()?;
        let result = self.sweep(store.as_mut(), &files, &symbol_list, total, progress);
        match result {
            Ok(indexed) => {
                store.commit()?;
                store.set_auto_commit(true);
                info!(indexed, "initial build complete");
                Ok(indexed)
            }
            Err(e) => {
                let _ = store.rollback();
                store.set_auto_commit(true);
                Err(e)
            }
        }
    }

    fn sweep(
        &self,
        store: &mut dyn ItemStore,
        files: &[String],
        symbols: &[SymbolInfo],
        total: usize,
        progress: Option<&ProgressFn>,
    ) -> Result<usize> {
        let mut indexed = 0;

        for path in files {
            self.check_cancel()?;
            let item = NewItem::file(path);
            let text = format!("{} {}", item.name, item.path);
            let id = store.add_item(item)?;
            self.write_postings(store, id, &text)?;
            indexed += 1;
            if indexed % PROGRESS_INTERVAL == 0 {
                report(progress, indexed, total);
            }
        }

        // Symbols are children of their defining file; group so each parent
        // is resolved once.
        let mut parents: HashMap<&str, ItemId> = HashMap::new();
        for sym in symbols {
            self.check_cancel()?;
            let parent_id = match parents.get(sym.path.as_str()) {
                Some(&id) => id,
                None => {
                    let id = self.ensure_parent_file(store, &sym.path)?;
                    parents.insert(sym.path.as_str(), id);
                    id
                }
            };
            if self.add_symbol(store, sym, parent_id)? {
                indexed += 1;
            }
            if indexed % PROGRESS_INTERVAL == 0 {
                report(progress, indexed, total);
            }
        }

        report(progress, indexed, total);
        Ok(indexed)
    }

    fn ensure_parent_file(&self, store: &mut dyn ItemStore, path: &str) -> Result<ItemId> {
        if let Some(existing) = store.get_item_by_path(path)? {
            return Ok(existing.id);
        }
        let item = NewItem::file(path);
        let text = format!("{} {}", item.name, item.path);
        let id = store.add_item(item)?;
        self.write_postings(store, id, &text)?;
        Ok(id)
    }

    /// Insert one symbol item. Returns false when an identically-anchored
    /// symbol already exists (true overloads), which is skipped rather than
    /// failing the sweep.
    fn add_symbol(
        &self,
        store: &mut dyn ItemStore,
        sym: &SymbolInfo,
        parent_id: ItemId,
    ) -> Result<bool> {
        let anchor = symbol_anchor(sym);
        if store.get_item_by_path(&anchor)?.is_some() {
            debug!(%anchor, "duplicate symbol anchor skipped");
            return Ok(false);
        }

        let basename = basename(&sym.path);
        let container = sym.container.as_deref().unwrap_or("");
        let text = format!("{} {} {}", sym.name, container, basename);

        let mut metadata = serde_json::Map::new();
        if let Some(container) = &sym.container {
            metadata.insert("container".to_string(), container.clone().into());
        }
        if let Some((start, end)) = sym.range {
            metadata.insert("range".to_string(), serde_json::json!([start, end]));
        }

        let id = store.add_item(NewItem {
            path: anchor,
            name: sym.name.clone(),
            kind: sym.kind,
            parent_id: Some(parent_id),
            metadata: if metadata.is_empty() {
                None
            } else {
                Some(serde_json::Value::Object(metadata))
            },
        })?;
        self.write_postings(store, id, &text)?;
        Ok(true)
    }

    /// Derive and store both posting kinds for one item's index text.
    fn write_postings(&self, store: &mut dyn ItemStore, id: ItemId, text: &str) -> Result<()> {
        let grams: Vec<TrigramPosting> = trigrams(text, self.config.case_sensitive)
            .into_iter()
            .map(|g| TrigramPosting {
                trigram: g.text,
                item_id: id,
                position: g.position,
            })
            .collect();
        store.add_trigrams(&grams)?;

        let tokens: Vec<TokenPosting> = split_words(text)
            .into_iter()
            .map(|t| TokenPosting {
                token: if self.config.case_sensitive {
                    t.text
                } else {
                    t.text.to_lowercase()
                },
                item_id: id,
                position: t.position,
            })
            .collect();
        store.add_tokens(&tokens)?;
        Ok(())
    }

    /// Record one filesystem change for the next batch.
    pub fn note_change(&self, path: String, kind: ChangeKind) {
        self.lock_pending().record(path, kind);
    }

    /// True when changes are pending and the debounce window has elapsed.
    pub fn has_ready_batch(&self) -> bool {
        self.lock_pending().is_ready()
    }

    pub fn pending_len(&self) -> usize {
        self.lock_pending().len()
    }

    /// Apply every pending change inside one transaction. Returns the batch
    /// size. Reconciliation is defensive: a create of an existing path is a
    /// modify, a modify of a missing path is a create, a delete of a missing
    /// path is a no-op.
    pub fn process_pending(&self) -> Result<usize> {
        let batch = {
            let mut pending = self.lock_pending();
            if !pending.has_pending() {
                return Ok(0);
            }
            pending.drain()
        };

        let mut store = self.lock_store();
        store.begin()?;
        let result = self.apply_batch(store.as_mut(), &batch);
        match result {
            Ok(()) => {
                store.commit()?;
                debug!(changes = batch.len(), "applied change batch");
                Ok(batch.len())
            }
            Err(e) => {
                let _ = store.rollback();
                Err(e)
            }
        }
    }

    fn apply_batch(
        &self,
        store: &mut dyn ItemStore,
        batch: &[(String, ChangeKind)],
    ) -> Result<()> {
        for (path, kind) in batch {
            match kind {
                ChangeKind::Created | ChangeKind::Modified => {
                    self.upsert_file(store, path)?;
                }
                ChangeKind::Deleted => {
                    if let Some(item) = store.get_item_by_path(path)? {
                        store.delete_item(item.id)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Re-index the item at `path`, inserting it first if it is new. An
    /// existing item keeps its id: old postings are purged and rebuilt.
    fn upsert_file(&self, store: &mut dyn ItemStore, path: &str) -> Result<()> {
        match store.get_item_by_path(path)? {
            Some(item) => {
                store.remove_trigrams(item.id)?;
                store.remove_tokens(item.id)?;
                let text = format!("{} {}", item.name, item.path);
                self.write_postings(store, item.id, &text)?;
            }
            None => {
                let item = NewItem::file(path);
                let text = format!("{} {}", item.name, item.path);
                let id = store.add_item(item)?;
                self.write_postings(store, id, &text)?;
            }
        }
        Ok(())
    }

    /// Clear everything and run a fresh initial build. Callers observe a
    /// brief unavailability window; the façade serializes this against
    /// searches.
    pub fn refresh(
        &self,
        enumerator: &dyn WorkspaceEnumerator,
        symbols: &dyn SymbolProvider,
        progress: Option<&ProgressFn>,
    ) -> Result<usize> {
        info!("refreshing index");
        self.lock_pending().clear();
        self.lock_store().clear()?;
        self.build_initial(enumerator, symbols, progress)
    }
}

fn report(progress: Option<&ProgressFn>, indexed: usize, total: usize) {
    if let Some(callback) = progress {
        callback(indexed, total);
    }
}

fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Unique path anchor for a symbol item: the defining file plus the
/// qualified symbol name.
fn symbol_anchor(sym: &SymbolInfo) -> String {
    match &sym.container {
        Some(container) => format!("{}#{}.{}", sym.path, container, sym.name),
        None => format!("{}#{}", sym.path, sym.name),
    }
}
