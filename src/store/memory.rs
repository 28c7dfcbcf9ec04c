//! Sharded in-memory store.
//!
//! The inverted indexes are split across fixed-size shard arrays keyed by the
//! leading bytes of the term: 65,536 trigram slots addressed by
//! `(b0 << 8) | b1` and 256 token slots addressed by `b0`. Shards materialize
//! on first insertion and are freed when deletions empty them, so resident
//! memory tracks active term cardinality rather than the address space.
//!
//! Posting lists are plain item-id sets: positions are dropped on insert,
//! since lookup never reads them. The SQLite backend is the one that keeps
//! them.
//!
//! Transaction operations are no-ops: this backend has no rollback
//! semantics. Callers that need atomicity use the persistent store.

use crate::error::{Error, Result};
use crate::store::item::{
    IndexStats, Item, ItemId, ItemPatch, NewItem, TokenPosting, TrigramPosting,
};
use crate::store::ItemStore;
use ahash::{AHashMap, AHashSet};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

const TRIGRAM_SHARDS: usize = 65_536;
const TOKEN_SHARDS: usize = 256;

type Shard = AHashMap<String, AHashSet<ItemId>>;

/// One inverted index: a fixed-size array of lazily allocated shards plus
/// the bookkeeping counters the engine exposes for observability.
struct ShardedIndex {
    shards: Vec<Option<Shard>>,
    active_shards: usize,
    unique_terms: u64,
    /// Shard dispatch on the term's leading bytes.
    slot_of: fn(&str) -> usize,
}

fn trigram_slot(term: &str) -> usize {
    let bytes = term.as_bytes();
    let b0 = bytes.first().copied().unwrap_or(0) as usize;
    let b1 = bytes.get(1).copied().unwrap_or(0) as usize;
    (b0 << 8) | b1
}

fn token_slot(term: &str) -> usize {
    term.as_bytes().first().copied().unwrap_or(0) as usize
}

impl ShardedIndex {
    fn new(slots: usize, slot_of: fn(&str) -> usize) -> Self {
        Self {
            shards: (0..slots).map(|_| None).collect(),
            active_shards: 0,
            unique_terms: 0,
            slot_of,
        }
    }

    fn insert(&mut self, term: &str, item_id: ItemId) {
        let slot = (self.slot_of)(term);
        let materialized = self.shards[slot].is_none();
        let shard = self.shards[slot].get_or_insert_with(Shard::new);
        if materialized {
            self.active_shards += 1;
        }

        match shard.get_mut(term) {
            Some(ids) => {
                ids.insert(item_id);
            }
            None => {
                self.unique_terms += 1;
                let mut ids = AHashSet::new();
                ids.insert(item_id);
                shard.insert(term.to_string(), ids);
            }
        }
    }

    /// Erase `item_id` from every posting list. Driven by single-item
    /// re-indexing, not queries, so the full shard scan is acceptable.
    fn remove_item(&mut self, item_id: ItemId) {
        for slot in self.shards.iter_mut() {
            let Some(shard) = slot else { continue };
            let mut dead_terms = Vec::new();
            for (term, ids) in shard.iter_mut() {
                if ids.remove(&item_id) && ids.is_empty() {
                    dead_terms.push(term.clone());
                }
            }
            for term in dead_terms {
                shard.remove(&term);
                self.unique_terms -= 1;
            }
            if shard.is_empty() {
                *slot = None;
                self.active_shards -= 1;
            }
        }
    }

    /// Counted lookup: per item, the number of distinct query terms that had
    /// at least one posting under it.
    fn count_matches(&self, terms: &[String]) -> HashMap<ItemId, u32> {
        let mut counts: HashMap<ItemId, u32> = HashMap::new();
        let mut seen: AHashSet<&str> = AHashSet::with_capacity(terms.len());
        for term in terms {
            // Duplicate query terms must not inflate counts.
            if !seen.insert(term.as_str()) {
                continue;
            }
            let slot = (self.slot_of)(term);
            if let Some(shard) = &self.shards[slot] {
                if let Some(ids) = shard.get(term) {
                    for &id in ids {
                        *counts.entry(id).or_insert(0) += 1;
                    }
                }
            }
        }
        counts
    }

    fn clear(&mut self) {
        for slot in self.shards.iter_mut() {
            *slot = None;
        }
        self.active_shards = 0;
        self.unique_terms = 0;
    }
}

/// In-memory [`ItemStore`] implementation.
pub struct MemoryStore {
    items: AHashMap<ItemId, Item>,
    by_path: AHashMap<String, ItemId>,
    children: AHashMap<ItemId, Vec<ItemId>>,
    next_id: ItemId,
    trigram_index: ShardedIndex,
    token_index: ShardedIndex,
    updated_at: u64,
    initialized: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            items: AHashMap::new(),
            by_path: AHashMap::new(),
            children: AHashMap::new(),
            next_id: 1,
            trigram_index: ShardedIndex::new(TRIGRAM_SHARDS, trigram_slot),
            token_index: ShardedIndex::new(TOKEN_SHARDS, token_slot),
            updated_at: 0,
            initialized: false,
        }
    }

    /// Trigram shards currently materialized.
    pub fn active_trigram_shards(&self) -> usize {
        self.trigram_index.active_shards
    }

    /// Token shards currently materialized.
    pub fn active_token_shards(&self) -> usize {
        self.token_index.active_shards
    }

    /// Distinct terms per index: `(trigrams, tokens)`.
    pub fn unique_terms(&self) -> (u64, u64) {
        (self.trigram_index.unique_terms, self.token_index.unique_terms)
    }

    fn ensure_init(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(Error::InvalidState("store not initialized".to_string()))
        }
    }

    fn touch(&mut self) {
        self.updated_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
    }

    fn remove_single(&mut self, id: ItemId) {
        if let Some(item) = self.items.remove(&id) {
            self.by_path.remove(&item.path);
            if let Some(parent) = item.parent_id {
                if let Some(siblings) = self.children.get_mut(&parent) {
                    siblings.retain(|&c| c != id);
                }
            }
            self.trigram_index.remove_item(id);
            self.token_index.remove_item(id);
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ItemStore for MemoryStore {
    fn initialize(&mut self) -> Result<()> {
        self.initialized = true;
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.ensure_init()?;
        self.items.clear();
        self.by_path.clear();
        self.children.clear();
        self.trigram_index.clear();
        self.token_index.clear();
        // Ids are never reused, so the counter survives a clear.
        self.touch();
        Ok(())
    }

    fn add_item(&mut self, item: NewItem) -> Result<ItemId> {
        self.ensure_init()?;
        if self.by_path.contains_key(&item.path) {
            return Err(Error::DuplicatePath(item.path));
        }
        if let Some(parent) = item.parent_id {
            if !self.items.contains_key(&parent) {
                return Err(Error::NotFound(format!("parent item {}", parent)));
            }
        }

        let id = self.next_id;
        self.next_id += 1;

        self.by_path.insert(item.path.clone(), id);
        if let Some(parent) = item.parent_id {
            self.children.entry(parent).or_default().push(id);
        }
        self.items.insert(
            id,
            Item {
                id,
                path: item.path,
                name: item.name,
                kind: item.kind,
                parent_id: item.parent_id,
                metadata: item.metadata,
            },
        );
        self.touch();
        Ok(id)
    }

    fn update_item(&mut self, id: ItemId, patch: ItemPatch) -> Result<()> {
        self.ensure_init()?;
        if let Some(Some(parent)) = patch.parent_id {
            if parent != id && !self.items.contains_key(&parent) {
                return Err(Error::NotFound(format!("parent item {}", parent)));
            }
        }
        let old_parent = match self.items.get(&id) {
            Some(item) => item.parent_id,
            None => return Err(Error::NotFound(format!("item {}", id))),
        };

        if let Some(new_parent) = patch.parent_id {
            if new_parent != old_parent {
                if let Some(parent) = old_parent {
                    if let Some(siblings) = self.children.get_mut(&parent) {
                        siblings.retain(|&c| c != id);
                    }
                }
                if let Some(parent) = new_parent {
                    self.children.entry(parent).or_default().push(id);
                }
            }
        }

        let Some(item) = self.items.get_mut(&id) else {
            return Err(Error::NotFound(format!("item {}", id)));
        };
        if let Some(name) = patch.name {
            item.name = name;
        }
        if let Some(kind) = patch.kind {
            item.kind = kind;
        }
        if let Some(parent_id) = patch.parent_id {
            item.parent_id = parent_id;
        }
        if let Some(metadata) = patch.metadata {
            item.metadata = metadata;
        }
        self.touch();
        Ok(())
    }

    fn delete_item(&mut self, id: ItemId) -> Result<()> {
        self.ensure_init()?;
        if !self.items.contains_key(&id) {
            return Err(Error::NotFound(format!("item {}", id)));
        }

        // Cascade: children first, then the item itself.
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(children) = self.children.remove(&current) {
                stack.extend(children);
            }
            self.remove_single(current);
        }
        self.touch();
        Ok(())
    }

    fn get_item(&self, id: ItemId) -> Result<Option<Item>> {
        self.ensure_init()?;
        Ok(self.items.get(&id).cloned())
    }

    fn get_item_by_path(&self, path: &str) -> Result<Option<Item>> {
        self.ensure_init()?;
        Ok(self
            .by_path
            .get(path)
            .and_then(|id| self.items.get(id))
            .cloned())
    }

    fn all_items(&self) -> Result<Vec<Item>> {
        self.ensure_init()?;
        Ok(self.items.values().cloned().collect())
    }

    fn add_trigrams(&mut self, postings: &[TrigramPosting]) -> Result<()> {
        self.ensure_init()?;
        for posting in postings {
            self.trigram_index.insert(&posting.trigram, posting.item_id);
        }
        if !postings.is_empty() {
            self.touch();
        }
        Ok(())
    }

    fn remove_trigrams(&mut self, item_id: ItemId) -> Result<()> {
        self.ensure_init()?;
        self.trigram_index.remove_item(item_id);
        self.touch();
        Ok(())
    }

    fn search_trigrams(&self, trigrams: &[String]) -> Result<HashMap<ItemId, u32>> {
        self.ensure_init()?;
        Ok(self.trigram_index.count_matches(trigrams))
    }

    fn add_tokens(&mut self, postings: &[TokenPosting]) -> Result<()> {
        self.ensure_init()?;
        for posting in postings {
            self.token_index.insert(&posting.token, posting.item_id);
        }
        if !postings.is_empty() {
            self.touch();
        }
        Ok(())
    }

    fn remove_tokens(&mut self, item_id: ItemId) -> Result<()> {
        self.ensure_init()?;
        self.token_index.remove_item(item_id);
        self.touch();
        Ok(())
    }

    fn search_tokens(&self, tokens: &[String]) -> Result<HashMap<ItemId, u32>> {
        self.ensure_init()?;
        Ok(self.token_index.count_matches(tokens))
    }

    fn begin(&mut self) -> Result<()> {
        // No rollback semantics in memory; documented contract.
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        warn!("rollback on the in-memory store is a no-op");
        Ok(())
    }

    fn set_auto_commit(&mut self, _enabled: bool) {}

    fn flush(&mut self) -> Result<bool> {
        Ok(false)
    }

    fn stats(&self) -> Result<IndexStats> {
        self.ensure_init()?;
        Ok(IndexStats {
            items: self.items.len() as u64,
            trigrams: self.trigram_index.unique_terms,
            tokens: self.token_index.unique_terms,
            updated_at: self.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::item::ItemKind;

    fn store() -> MemoryStore {
        let mut s = MemoryStore::new();
        s.initialize().unwrap();
        s
    }

    fn tg(trigram: &str, item_id: ItemId, position: u32) -> TrigramPosting {
        TrigramPosting {
            trigram: trigram.to_string(),
            item_id,
            position,
        }
    }

    fn tk(token: &str, item_id: ItemId, position: u32) -> TokenPosting {
        TokenPosting {
            token: token.to_string(),
            item_id,
            position,
        }
    }

    #[test]
    fn test_requires_initialize() {
        let s = MemoryStore::new();
        assert!(matches!(s.get_item(1), Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_add_get_round_trip() {
        let mut s = store();
        let id = s.add_item(NewItem::file("src/main.rs")).unwrap();
        let item = s.get_item(id).unwrap().unwrap();
        assert_eq!(item.path, "src/main.rs");
        assert_eq!(item.name, "main.rs");
        assert_eq!(
            s.get_item_by_path("src/main.rs").unwrap().unwrap().id,
            id
        );
    }

    #[test]
    fn test_duplicate_path_rejected() {
        let mut s = store();
        s.add_item(NewItem::file("a.rs")).unwrap();
        let err = s.add_item(NewItem::file("a.rs")).unwrap_err();
        assert!(matches!(err, Error::DuplicatePath(_)));
    }

    #[test]
    fn test_ids_never_reused() {
        let mut s = store();
        let first = s.add_item(NewItem::file("a.rs")).unwrap();
        s.delete_item(first).unwrap();
        let second = s.add_item(NewItem::file("a.rs")).unwrap();
        assert!(second > first);

        s.clear().unwrap();
        let third = s.add_item(NewItem::file("a.rs")).unwrap();
        assert!(third > second);
    }

    #[test]
    fn test_missing_parent_rejected() {
        let mut s = store();
        let orphan = NewItem {
            parent_id: Some(99),
            ..NewItem::file("a.rs")
        };
        assert!(matches!(s.add_item(orphan), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_update_item() {
        let mut s = store();
        let id = s.add_item(NewItem::file("a.rs")).unwrap();
        s.update_item(
            id,
            ItemPatch {
                name: Some("renamed.rs".to_string()),
                metadata: Some(Some(serde_json::json!({"container": "x"}))),
                ..Default::default()
            },
        )
        .unwrap();
        let item = s.get_item(id).unwrap().unwrap();
        assert_eq!(item.name, "renamed.rs");
        assert_eq!(item.container(), Some("x"));

        assert!(matches!(
            s.update_item(999, ItemPatch::default()),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_delete_cascades_to_children_and_postings() {
        let mut s = store();
        let file = s.add_item(NewItem::file("src/user.rs")).unwrap();
        let symbol = s
            .add_item(NewItem {
                path: "/ws/src/user.rs#getUser".to_string(),
                name: "getUser".to_string(),
                kind: ItemKind::Function,
                parent_id: Some(file),
                metadata: None,
            })
            .unwrap();
        s.add_trigrams(&[tg("get", symbol, 0), tg("etu", symbol, 1)])
            .unwrap();
        s.add_tokens(&[tk("get", symbol, 0)]).unwrap();

        s.delete_item(file).unwrap();
        assert!(s.get_item(symbol).unwrap().is_none());
        assert!(s
            .search_trigrams(&["get".to_string()])
            .unwrap()
            .is_empty());
        assert!(s.search_tokens(&["get".to_string()]).unwrap().is_empty());
    }

    #[test]
    fn test_counted_lookup() {
        let mut s = store();
        let get_user = s.add_item(NewItem::file("getUser")).unwrap();
        let get_name = s.add_item(NewItem::file("getName")).unwrap();
        s.add_trigrams(&[
            tg("get", get_user, 0),
            tg("use", get_user, 3),
            tg("get", get_name, 0),
            tg("nam", get_name, 3),
        ])
        .unwrap();

        let one = s.search_trigrams(&["get".to_string()]).unwrap();
        assert_eq!(one.get(&get_user), Some(&1));
        assert_eq!(one.get(&get_name), Some(&1));

        let two = s
            .search_trigrams(&["get".to_string(), "use".to_string()])
            .unwrap();
        assert_eq!(two.get(&get_user), Some(&2));
        assert_eq!(two.get(&get_name), Some(&1));
    }

    #[test]
    fn test_counted_lookup_ignores_duplicate_terms() {
        let mut s = store();
        let id = s.add_item(NewItem::file("getUser")).unwrap();
        s.add_trigrams(&[tg("get", id, 0)]).unwrap();

        let counts = s
            .search_trigrams(&["get".to_string(), "get".to_string()])
            .unwrap();
        assert_eq!(counts.get(&id), Some(&1));
    }

    #[test]
    fn test_posting_insert_idempotent() {
        let mut s = store();
        let id = s.add_item(NewItem::file("a")).unwrap();
        s.add_trigrams(&[tg("abc", id, 0)]).unwrap();
        s.add_trigrams(&[tg("abc", id, 0)]).unwrap();
        let (trigram_terms, _) = s.unique_terms();
        assert_eq!(trigram_terms, 1);
        assert_eq!(
            s.search_trigrams(&["abc".to_string()]).unwrap().get(&id),
            Some(&1)
        );
    }

    #[test]
    fn test_remove_trigrams_only_touches_one_item() {
        let mut s = store();
        let a = s.add_item(NewItem::file("a")).unwrap();
        let b = s.add_item(NewItem::file("b")).unwrap();
        s.add_trigrams(&[tg("abc", a, 0), tg("abc", b, 0)]).unwrap();

        s.remove_trigrams(a).unwrap();
        let counts = s.search_trigrams(&["abc".to_string()]).unwrap();
        assert!(!counts.contains_key(&a));
        assert_eq!(counts.get(&b), Some(&1));
    }

    #[test]
    fn test_shard_accounting() {
        let mut s = store();
        let id = s.add_item(NewItem::file("a")).unwrap();
        assert_eq!(s.active_trigram_shards(), 0);

        s.add_trigrams(&[tg("abc", id, 0), tg("abd", id, 1), tg("xyz", id, 2)])
            .unwrap();
        // "abc" and "abd" share the "ab" slot; "xyz" gets its own.
        assert_eq!(s.active_trigram_shards(), 2);
        assert_eq!(s.unique_terms().0, 3);

        s.remove_trigrams(id).unwrap();
        assert_eq!(s.active_trigram_shards(), 0);
        assert_eq!(s.unique_terms().0, 0);
    }

    #[test]
    fn test_token_shard_accounting() {
        let mut s = store();
        let id = s.add_item(NewItem::file("a")).unwrap();
        s.add_tokens(&[tk("get", id, 0), tk("give", id, 4), tk("user", id, 9)])
            .unwrap();
        // "get"/"give" share the 'g' slot.
        assert_eq!(s.active_token_shards(), 2);

        s.remove_tokens(id).unwrap();
        assert_eq!(s.active_token_shards(), 0);
    }

    #[test]
    fn test_transactions_are_no_ops() {
        let mut s = store();
        s.begin().unwrap();
        let id = s.add_item(NewItem::file("a.rs")).unwrap();
        s.rollback().unwrap();
        // No rollback semantics: the item survives.
        assert!(s.get_item(id).unwrap().is_some());
    }

    #[test]
    fn test_clear_drops_everything() {
        let mut s = store();
        let id = s.add_item(NewItem::file("a")).unwrap();
        s.add_trigrams(&[tg("abc", id, 0)]).unwrap();
        s.clear().unwrap();

        let stats = s.stats().unwrap();
        assert_eq!(stats.items, 0);
        assert_eq!(stats.trigrams, 0);
        assert!(s.search_trigrams(&["abc".to_string()]).unwrap().is_empty());
    }

    #[test]
    fn test_stats() {
        let mut s = store();
        let id = s.add_item(NewItem::file("main.rs")).unwrap();
        s.add_trigrams(&[tg("mai", id, 0), tg("ain", id, 1)]).unwrap();
        s.add_tokens(&[tk("main", id, 0), tk("rs", id, 5)]).unwrap();

        let stats = s.stats().unwrap();
        assert_eq!(stats.items, 1);
        assert_eq!(stats.trigrams, 2);
        assert_eq!(stats.tokens, 2);
        assert!(stats.updated_at > 0);
    }
}
