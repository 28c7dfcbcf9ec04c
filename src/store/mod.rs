//! Storage backends for the item table and the two inverted indexes.
//!
//! The [`ItemStore`] trait is the contract every backend satisfies:
//!
//! - [`memory::MemoryStore`] — sharded in-memory maps, rebuilt on start
//! - [`sqlite::SqliteStore`] — relational file, survives restarts
//!
//! Lookups are *counted*: `search_trigrams` / `search_tokens` return, per
//! item, the number of distinct query terms that item matched. Duplicate
//! query terms never inflate the count, and posting positions are not
//! consulted by lookup.

pub mod item;
pub mod memory;
pub mod sqlite;

pub use item::{
    IndexStats, Item, ItemId, ItemKind, ItemPatch, NewItem, TokenPosting, TrigramPosting,
};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::Result;
use std::collections::HashMap;

/// Uniform contract over an item table plus two inverted indexes.
///
/// `initialize` must be called once before any other operation and is
/// idempotent on repeat. All mutations cascade: deleting an item removes its
/// postings and its child items atomically.
///
/// Transactions are single-level. A nested `begin` is a no-op that logs a
/// warning; `commit`/`rollback` without an open transaction are no-ops. The
/// in-memory backend has no rollback semantics at all — its transaction
/// operations exist only to satisfy the contract.
pub trait ItemStore: Send {
    fn initialize(&mut self) -> Result<()>;

    /// Drop every item and posting. Rolls back any open transaction first.
    fn clear(&mut self) -> Result<()>;

    /// Insert an item, assigning a fresh id. Fails with `DuplicatePath` when
    /// the path is already present and `NotFound` when `parent_id` does not
    /// reference a live item.
    fn add_item(&mut self, item: NewItem) -> Result<ItemId>;

    /// Partial update. Fails with `NotFound` when the id is absent.
    fn update_item(&mut self, id: ItemId, patch: ItemPatch) -> Result<()>;

    /// Remove an item, its postings, and (recursively) its children.
    fn delete_item(&mut self, id: ItemId) -> Result<()>;

    fn get_item(&self, id: ItemId) -> Result<Option<Item>>;

    fn get_item_by_path(&self, path: &str) -> Result<Option<Item>>;

    /// Every live item. Feeds the abbreviation fallback of the query
    /// pipeline; not a hot path.
    fn all_items(&self) -> Result<Vec<Item>>;

    /// Bulk insert; duplicate `(trigram, item, position)` triples are
    /// silently ignored.
    fn add_trigrams(&mut self, postings: &[TrigramPosting]) -> Result<()>;

    /// Remove every trigram posting of one item.
    fn remove_trigrams(&mut self, item_id: ItemId) -> Result<()>;

    /// Counted lookup over the trigram index.
    fn search_trigrams(&self, trigrams: &[String]) -> Result<HashMap<ItemId, u32>>;

    /// Bulk insert; duplicate `(token, item, position)` triples are silently
    /// ignored.
    fn add_tokens(&mut self, postings: &[TokenPosting]) -> Result<()>;

    /// Remove every token posting of one item.
    fn remove_tokens(&mut self, item_id: ItemId) -> Result<()>;

    /// Counted lookup over the token index.
    fn search_tokens(&self, tokens: &[String]) -> Result<HashMap<ItemId, u32>>;

    fn begin(&mut self) -> Result<()>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;

    /// When enabled (the default), bulk writes open an implicit transaction
    /// and commit every `batch_size` operations. The builder disables this
    /// around full sweeps and brackets them in one explicit transaction.
    fn set_auto_commit(&mut self, enabled: bool);

    /// Persist pending state to disk if the backend is durable. Returns
    /// whether anything was written.
    fn flush(&mut self) -> Result<bool>;

    fn stats(&self) -> Result<IndexStats>;
}
