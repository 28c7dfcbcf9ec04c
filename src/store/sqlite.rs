//! Persistent store backed by a SQLite file.
//!
//! Three tables (`items`, `trigrams`, `tokens`) with cascading foreign keys
//! and covering indexes; WAL journaling, relaxed sync and a memory-mapped
//! page cache for read throughput. The WAL is the on-disk image: the
//! periodic [`flush`](crate::store::ItemStore::flush) checkpoints it when
//! writes are pending, and shutdown forces a final checkpoint.
//!
//! Writes batch automatically: with `auto_commit` on, the first write opens
//! an implicit transaction that commits every `batch_size` operations. The
//! builder turns `auto_commit` off around full sweeps and brackets them in
//! one explicit transaction instead.

use crate::error::{Error, Result};
use crate::store::item::{
    IndexStats, Item, ItemId, ItemKind, ItemPatch, NewItem, TokenPosting, TrigramPosting,
};
use crate::store::ItemStore;
use rusqlite::types::ToSql;
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Size of the memory-mapped page cache.
const MMAP_SIZE: i64 = 256 * 1024 * 1024;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS items (
        id        INTEGER PRIMARY KEY,
        path      TEXT    NOT NULL UNIQUE,
        name      TEXT    NOT NULL,
        kind      TEXT    NOT NULL,
        parent_id INTEGER REFERENCES items(id) ON DELETE CASCADE,
        metadata  TEXT
    );

    CREATE TABLE IF NOT EXISTS trigrams (
        trigram  TEXT    NOT NULL,
        item_id  INTEGER NOT NULL REFERENCES items(id) ON DELETE CASCADE,
        position INTEGER NOT NULL,
        PRIMARY KEY (trigram, item_id, position)
    );

    CREATE TABLE IF NOT EXISTS tokens (
        token    TEXT    NOT NULL,
        item_id  INTEGER NOT NULL REFERENCES items(id) ON DELETE CASCADE,
        position INTEGER NOT NULL,
        PRIMARY KEY (token, item_id, position)
    );

    CREATE TABLE IF NOT EXISTS engine_meta (
        key   TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_items_kind      ON items(kind);
    CREATE INDEX IF NOT EXISTS idx_trigrams_trigram ON trigrams(trigram);
    CREATE INDEX IF NOT EXISTS idx_trigrams_item    ON trigrams(item_id);
    CREATE INDEX IF NOT EXISTS idx_tokens_token     ON tokens(token);
    CREATE INDEX IF NOT EXISTS idx_tokens_item      ON tokens(item_id);
";

/// SQLite-backed [`ItemStore`] implementation.
pub struct SqliteStore {
    conn: Connection,
    batch_size: usize,
    auto_commit: bool,
    tx_open: bool,
    implicit_tx: bool,
    ops_since_begin: usize,
    dirty: bool,
    updated_at: u64,
    initialized: bool,
}

impl SqliteStore {
    /// Open (or create) the backing file at `path` and apply the
    /// performance pragmas. Call [`initialize`](ItemStore::initialize)
    /// before using the store.
    pub fn open(path: &Path, batch_size: usize) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn, batch_size)
    }

    /// Fully in-memory database. Used by tests; durability pragmas are
    /// harmless no-ops there.
    pub fn open_in_memory(batch_size: usize) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, batch_size)
    }

    fn from_connection(conn: Connection, batch_size: usize) -> Result<Self> {
        conn.pragma_update(None, "journal_mode", "wal")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "on")?;
        conn.pragma_update(None, "mmap_size", MMAP_SIZE)?;

        Ok(Self {
            conn,
            batch_size: batch_size.max(1),
            auto_commit: true,
            tx_open: false,
            implicit_tx: false,
            ops_since_begin: 0,
            dirty: false,
            updated_at: 0,
            initialized: false,
        })
    }

    fn ensure_init(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(Error::InvalidState("store not initialized".to_string()))
        }
    }

    fn touch(&mut self) {
        self.updated_at = now_secs();
        self.dirty = true;
    }

    /// Open the implicit batching transaction if auto-commit is on and no
    /// transaction is running yet.
    fn maybe_begin_implicit(&mut self) -> Result<()> {
        if self.auto_commit && !self.tx_open {
            self.conn.execute_batch("BEGIN")?;
            self.tx_open = true;
            self.implicit_tx = true;
            self.ops_since_begin = 0;
        }
        Ok(())
    }

    /// Account for `count` write operations, committing the implicit
    /// transaction once the batch threshold is reached.
    fn note_writes(&mut self, count: usize) -> Result<()> {
        self.touch();
        if self.implicit_tx {
            self.ops_since_begin += count;
            if self.ops_since_begin >= self.batch_size {
                debug!(ops = self.ops_since_begin, "committing write batch");
                self.conn.execute_batch("COMMIT")?;
                self.tx_open = false;
                self.implicit_tx = false;
                self.ops_since_begin = 0;
            }
        }
        Ok(())
    }

    fn commit_implicit(&mut self) -> Result<()> {
        if self.implicit_tx {
            self.conn.execute_batch("COMMIT")?;
            self.tx_open = false;
            self.implicit_tx = false;
            self.ops_since_begin = 0;
        }
        Ok(())
    }

    fn row_to_item(
        id: ItemId,
        path: String,
        name: String,
        kind: String,
        parent_id: Option<ItemId>,
        metadata: Option<String>,
    ) -> Result<Item> {
        let kind = ItemKind::parse(&kind)
            .ok_or_else(|| Error::Schema(format!("unknown item kind {:?}", kind)))?;
        let metadata = match metadata {
            Some(raw) => Some(
                serde_json::from_str(&raw)
                    .map_err(|e| Error::Schema(format!("malformed metadata: {}", e)))?,
            ),
            None => None,
        };
        Ok(Item {
            id,
            path,
            name,
            kind,
            parent_id,
            metadata,
        })
    }

    fn select_item(&self, sql: &str, param: &dyn ToSql) -> Result<Option<Item>> {
        let row = self
            .conn
            .prepare_cached(sql)?
            .query_row([param], |row| {
                Ok((
                    row.get::<_, ItemId>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<ItemId>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                ))
            })
            .optional()?;
        match row {
            Some((id, path, name, kind, parent_id, metadata)) => {
                Self::row_to_item(id, path, name, kind, parent_id, metadata).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Counted lookup shared by both inverted indexes. `require_all`
    /// restricts the result to items matching every distinct term.
    fn counted_lookup(
        &self,
        table: &str,
        column: &str,
        terms: &[String],
        require_all: bool,
    ) -> Result<HashMap<ItemId, u32>> {
        let mut distinct: Vec<&str> = terms.iter().map(String::as_str).collect();
        distinct.sort_unstable();
        distinct.dedup();
        if distinct.is_empty() {
            return Ok(HashMap::new());
        }

        let placeholders = vec!["?"; distinct.len()].join(",");
        let mut sql = format!(
            "SELECT item_id, COUNT(DISTINCT {column}) FROM {table} \
             WHERE {column} IN ({placeholders}) GROUP BY item_id",
        );
        let expected = distinct.len() as i64;
        if require_all {
            sql.push_str(&format!(" HAVING COUNT(DISTINCT {column}) = ?"));
        }

        let mut params: Vec<&dyn ToSql> = distinct.iter().map(|t| t as &dyn ToSql).collect();
        if require_all {
            params.push(&expected);
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params.as_slice(), |row| {
            Ok((row.get::<_, ItemId>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = HashMap::new();
        for row in rows {
            let (item_id, count) = row?;
            counts.insert(item_id, count as u32);
        }
        Ok(counts)
    }

    fn meta_get(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .conn
            .prepare_cached("SELECT value FROM engine_meta WHERE key = ?1")?
            .query_row([key], |row| row.get(0))
            .optional()?)
    }

    fn meta_set(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .prepare_cached(
                "INSERT INTO engine_meta (key, value) VALUES (?1, ?2) \
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            )?
            .execute([key, value])?;
        Ok(())
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl ItemStore for SqliteStore {
    fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }

        // Guard against opening a foreign database file: an existing items
        // table must have the expected shape before any DDL touches it.
        let has_items: Option<String> = self
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'items'")?
            .query_row([], |row| row.get(0))
            .optional()?;
        if has_items.is_some() {
            let path_column: Option<String> = self
                .conn
                .prepare("SELECT name FROM pragma_table_info('items') WHERE name = 'path'")?
                .query_row([], |row| row.get(0))
                .optional()?;
            if path_column.is_none() {
                return Err(Error::Schema("items table has no path column".to_string()));
            }
        }

        self.conn.execute_batch(SCHEMA)?;

        if let Some(raw) = self.meta_get("updated_at")? {
            self.updated_at = raw.parse().unwrap_or(0);
        }
        self.initialized = true;
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.ensure_init()?;
        if self.tx_open {
            self.conn.execute_batch("ROLLBACK")?;
            self.tx_open = false;
            self.implicit_tx = false;
            self.ops_since_begin = 0;
        }
        // Cascades wipe both posting tables.
        self.conn.execute("DELETE FROM items", [])?;
        self.touch();
        Ok(())
    }

    fn add_item(&mut self, item: NewItem) -> Result<ItemId> {
        self.ensure_init()?;
        self.maybe_begin_implicit()?;

        let exists: Option<ItemId> = self
            .conn
            .prepare_cached("SELECT id FROM items WHERE path = ?1")?
            .query_row([&item.path], |row| row.get(0))
            .optional()?;
        if exists.is_some() {
            return Err(Error::DuplicatePath(item.path));
        }

        let metadata = item
            .metadata
            .as_ref()
            .map(|m| serde_json::to_string(m).unwrap_or_default());
        let inserted = self
            .conn
            .prepare_cached(
                "INSERT INTO items (path, name, kind, parent_id, metadata) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?
            .execute(rusqlite::params![
                item.path,
                item.name,
                item.kind.as_str(),
                item.parent_id,
                metadata,
            ]);
        if let Err(e) = inserted {
            // Path uniqueness was pre-checked, so a constraint failure here
            // is a dangling parent reference.
            if matches!(
                e,
                rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error {
                        code: rusqlite::ffi::ErrorCode::ConstraintViolation,
                        ..
                    },
                    _,
                )
            ) {
                return Err(Error::NotFound(format!(
                    "parent item {:?}",
                    item.parent_id
                )));
            }
            return Err(e.into());
        }

        let id = self.conn.last_insert_rowid();
        self.note_writes(1)?;
        Ok(id)
    }

    fn update_item(&mut self, id: ItemId, patch: ItemPatch) -> Result<()> {
        self.ensure_init()?;
        if patch.is_empty() {
            // Still validate existence for a uniform NotFound contract.
            if self.get_item(id)?.is_none() {
                return Err(Error::NotFound(format!("item {}", id)));
            }
            return Ok(());
        }
        self.maybe_begin_implicit()?;

        let mut sets = Vec::new();
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();
        if let Some(name) = patch.name {
            sets.push("name = ?");
            params.push(Box::new(name));
        }
        if let Some(kind) = patch.kind {
            sets.push("kind = ?");
            params.push(Box::new(kind.as_str().to_string()));
        }
        if let Some(parent_id) = patch.parent_id {
            sets.push("parent_id = ?");
            params.push(Box::new(parent_id));
        }
        if let Some(metadata) = patch.metadata {
            sets.push("metadata = ?");
            let raw = metadata.map(|m| serde_json::to_string(&m).unwrap_or_default());
            params.push(Box::new(raw));
        }
        params.push(Box::new(id));

        let sql = format!("UPDATE items SET {} WHERE id = ?", sets.join(", "));
        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let affected = self.conn.prepare(&sql)?.execute(param_refs.as_slice())?;
        if affected == 0 {
            return Err(Error::NotFound(format!("item {}", id)));
        }
        self.note_writes(1)?;
        Ok(())
    }

    fn delete_item(&mut self, id: ItemId) -> Result<()> {
        self.ensure_init()?;
        self.maybe_begin_implicit()?;
        let affected = self
            .conn
            .prepare_cached("DELETE FROM items WHERE id = ?1")?
            .execute([id])?;
        if affected == 0 {
            return Err(Error::NotFound(format!("item {}", id)));
        }
        self.note_writes(1)?;
        Ok(())
    }

    fn get_item(&self, id: ItemId) -> Result<Option<Item>> {
        self.ensure_init()?;
        self.select_item(
            "SELECT id, path, name, kind, parent_id, metadata FROM items WHERE id = ?1",
            &id,
        )
    }

    fn get_item_by_path(&self, path: &str) -> Result<Option<Item>> {
        self.ensure_init()?;
        self.select_item(
            "SELECT id, path, name, kind, parent_id, metadata FROM items WHERE path = ?1",
            &path.to_string(),
        )
    }

    fn all_items(&self) -> Result<Vec<Item>> {
        self.ensure_init()?;
        let mut stmt = self
            .conn
            .prepare_cached("SELECT id, path, name, kind, parent_id, metadata FROM items")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, ItemId>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<ItemId>>(4)?,
                row.get::<_, Option<String>>(5)?,
            ))
        })?;

        let mut items = Vec::new();
        for row in rows {
            let (id, path, name, kind, parent_id, metadata) = row?;
            items.push(Self::row_to_item(id, path, name, kind, parent_id, metadata)?);
        }
        Ok(items)
    }

    fn add_trigrams(&mut self, postings: &[TrigramPosting]) -> Result<()> {
        self.ensure_init()?;
        if postings.is_empty() {
            return Ok(());
        }
        self.maybe_begin_implicit()?;
        {
            let mut stmt = self.conn.prepare_cached(
                "INSERT OR IGNORE INTO trigrams (trigram, item_id, position) \
                 VALUES (?1, ?2, ?3)",
            )?;
            for posting in postings {
                stmt.execute(rusqlite::params![
                    posting.trigram,
                    posting.item_id,
                    posting.position,
                ])?;
            }
        }
        self.note_writes(postings.len())?;
        Ok(())
    }

    fn remove_trigrams(&mut self, item_id: ItemId) -> Result<()> {
        self.ensure_init()?;
        self.maybe_begin_implicit()?;
        self.conn
            .prepare_cached("DELETE FROM trigrams WHERE item_id = ?1")?
            .execute([item_id])?;
        self.note_writes(1)?;
        Ok(())
    }

    fn search_trigrams(&self, trigrams: &[String]) -> Result<HashMap<ItemId, u32>> {
        self.ensure_init()?;
        // All-must-appear recall: substring queries only make sense when
        // every query trigram occurs in the candidate.
        self.counted_lookup("trigrams", "trigram", trigrams, true)
    }

    fn add_tokens(&mut self, postings: &[TokenPosting]) -> Result<()> {
        self.ensure_init()?;
        if postings.is_empty() {
            return Ok(());
        }
        self.maybe_begin_implicit()?;
        {
            let mut stmt = self.conn.prepare_cached(
                "INSERT OR IGNORE INTO tokens (token, item_id, position) \
                 VALUES (?1, ?2, ?3)",
            )?;
            for posting in postings {
                stmt.execute(rusqlite::params![
                    posting.token,
                    posting.item_id,
                    posting.position,
                ])?;
            }
        }
        self.note_writes(postings.len())?;
        Ok(())
    }

    fn remove_tokens(&mut self, item_id: ItemId) -> Result<()> {
        self.ensure_init()?;
        self.maybe_begin_implicit()?;
        self.conn
            .prepare_cached("DELETE FROM tokens WHERE item_id = ?1")?
            .execute([item_id])?;
        self.note_writes(1)?;
        Ok(())
    }

    fn search_tokens(&self, tokens: &[String]) -> Result<HashMap<ItemId, u32>> {
        self.ensure_init()?;
        // Partial matches keep their counts for fractional-match scoring.
        self.counted_lookup("tokens", "token", tokens, false)
    }

    fn begin(&mut self) -> Result<()> {
        self.ensure_init()?;
        if self.tx_open {
            warn!("nested begin ignored; transactions are single-level");
            return Ok(());
        }
        self.conn.execute_batch("BEGIN")?;
        self.tx_open = true;
        self.implicit_tx = false;
        self.ops_since_begin = 0;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.ensure_init()?;
        if !self.tx_open {
            return Ok(());
        }
        self.conn.execute_batch("COMMIT")?;
        self.tx_open = false;
        self.implicit_tx = false;
        self.ops_since_begin = 0;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.ensure_init()?;
        if !self.tx_open {
            return Ok(());
        }
        self.conn.execute_batch("ROLLBACK")?;
        self.tx_open = false;
        self.implicit_tx = false;
        self.ops_since_begin = 0;
        Ok(())
    }

    fn set_auto_commit(&mut self, enabled: bool) {
        if !enabled {
            if let Err(e) = self.commit_implicit() {
                warn!("failed to commit implicit batch: {}", e);
            }
        }
        self.auto_commit = enabled;
    }

    fn flush(&mut self) -> Result<bool> {
        self.ensure_init()?;
        // Never flush under an explicit transaction: the builder owns it.
        if self.tx_open && !self.implicit_tx {
            return Ok(false);
        }
        if !self.dirty {
            return Ok(false);
        }
        self.commit_implicit()?;
        self.meta_set("updated_at", &self.updated_at.to_string())?;
        // Fold the WAL back into the main file so the on-disk image is
        // complete after an unclean exit.
        self.conn
            .query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
        self.dirty = false;
        Ok(true)
    }

    fn stats(&self) -> Result<IndexStats> {
        self.ensure_init()?;
        let items: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
        let trigrams: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT trigram) FROM trigrams",
            [],
            |row| row.get(0),
        )?;
        let tokens: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT token) FROM tokens",
            [],
            |row| row.get(0),
        )?;

        let updated_at = if self.updated_at > 0 {
            self.updated_at
        } else {
            self.meta_get("updated_at")?
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(0)
        };

        Ok(IndexStats {
            items: items as u64,
            trigrams: trigrams as u64,
            tokens: tokens as u64,
            updated_at,
        })
    }
}

impl Drop for SqliteStore {
    fn drop(&mut self) {
        if self.initialized {
            if let Err(e) = self.flush() {
                warn!("final flush failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteStore {
        let mut s = SqliteStore::open_in_memory(1000).unwrap();
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
    fn test_initialize_is_idempotent() {
        let mut s = store();
        s.initialize().unwrap();
        s.initialize().unwrap();
    }

    #[test]
    fn test_requires_initialize() {
        let s = SqliteStore::open_in_memory(1000).unwrap();
        assert!(matches!(s.get_item(1), Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_add_get_round_trip() {
        let mut s = store();
        let id = s
            .add_item(NewItem {
                path: "src/main.rs".to_string(),
                name: "main.rs".to_string(),
                kind: ItemKind::File,
                parent_id: None,
                metadata: Some(serde_json::json!({"container": "bin"})),
            })
            .unwrap();

        let item = s.get_item(id).unwrap().unwrap();
        assert_eq!(item.path, "src/main.rs");
        assert_eq!(item.kind, ItemKind::File);
        assert_eq!(item.container(), Some("bin"));

        let by_path = s.get_item_by_path("src/main.rs").unwrap().unwrap();
        assert_eq!(by_path.id, id);
        assert!(s.get_item(id + 100).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_path_rejected() {
        let mut s = store();
        s.add_item(NewItem::file("a.rs")).unwrap();
        assert!(matches!(
            s.add_item(NewItem::file("a.rs")),
            Err(Error::DuplicatePath(_))
        ));
    }

    #[test]
    fn test_missing_parent_rejected() {
        let mut s = store();
        let orphan = NewItem {
            parent_id: Some(404),
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
                name: Some("b.rs".to_string()),
                kind: Some(ItemKind::Class),
                ..Default::default()
            },
        )
        .unwrap();

        let item = s.get_item(id).unwrap().unwrap();
        assert_eq!(item.name, "b.rs");
        assert_eq!(item.kind, ItemKind::Class);

        assert!(matches!(
            s.update_item(999, ItemPatch { name: Some("x".into()), ..Default::default() }),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_update_can_null_metadata() {
        let mut s = store();
        let id = s
            .add_item(NewItem {
                metadata: Some(serde_json::json!({"container": "X"})),
                ..NewItem::file("a.rs")
            })
            .unwrap();
        s.update_item(
            id,
            ItemPatch {
                metadata: Some(None),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(s.get_item(id).unwrap().unwrap().metadata.is_none());
    }

    #[test]
    fn test_delete_cascades() {
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
        s.add_trigrams(&[tg("get", symbol, 0)]).unwrap();
        s.add_tokens(&[tk("get", symbol, 0)]).unwrap();

        s.delete_item(file).unwrap();
        assert!(s.get_item(symbol).unwrap().is_none());
        assert!(s.search_trigrams(&["get".to_string()]).unwrap().is_empty());
        assert!(s.search_tokens(&["get".to_string()]).unwrap().is_empty());
        assert!(matches!(s.delete_item(file), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_trigram_search_requires_all_terms() {
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

        let single = s.search_trigrams(&["get".to_string()]).unwrap();
        assert_eq!(single.get(&get_user), Some(&1));
        assert_eq!(single.get(&get_name), Some(&1));

        // getName lacks "use", so the all-must-appear filter drops it.
        let double = s
            .search_trigrams(&["get".to_string(), "use".to_string()])
            .unwrap();
        assert_eq!(double.get(&get_user), Some(&2));
        assert!(!double.contains_key(&get_name));
    }

    #[test]
    fn test_token_search_keeps_partial_matches() {
        let mut s = store();
        let a = s.add_item(NewItem::file("a")).unwrap();
        let b = s.add_item(NewItem::file("b")).unwrap();
        s.add_tokens(&[tk("get", a, 0), tk("user", a, 4), tk("get", b, 0)])
            .unwrap();

        let counts = s
            .search_tokens(&["get".to_string(), "user".to_string()])
            .unwrap();
        assert_eq!(counts.get(&a), Some(&2));
        assert_eq!(counts.get(&b), Some(&1));
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

        let rows: i64 = s
            .conn
            .query_row("SELECT COUNT(*) FROM trigrams", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_positions_distinguish_postings() {
        let mut s = store();
        let id = s.add_item(NewItem::file("aaaa")).unwrap();
        s.add_trigrams(&[tg("aaa", id, 0), tg("aaa", id, 1)]).unwrap();

        let rows: i64 = s
            .conn
            .query_row("SELECT COUNT(*) FROM trigrams", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 2);
        // Lookup still counts the term once.
        let counts = s.search_trigrams(&["aaa".to_string()]).unwrap();
        assert_eq!(counts.get(&id), Some(&1));
    }

    #[test]
    fn test_explicit_transaction_rollback() {
        let mut s = store();
        s.set_auto_commit(false);
        s.begin().unwrap();
        s.add_item(NewItem::file("a.rs")).unwrap();
        s.rollback().unwrap();
        assert!(s.get_item_by_path("a.rs").unwrap().is_none());

        s.begin().unwrap();
        s.add_item(NewItem::file("b.rs")).unwrap();
        s.commit().unwrap();
        assert!(s.get_item_by_path("b.rs").unwrap().is_some());
    }

    #[test]
    fn test_nested_begin_is_noop() {
        let mut s = store();
        s.set_auto_commit(false);
        s.begin().unwrap();
        s.begin().unwrap(); // warns, does not fail
        s.add_item(NewItem::file("a.rs")).unwrap();
        s.commit().unwrap();
        // The inner begin did not open a second level: one commit suffices.
        s.commit().unwrap(); // no-op
        assert!(s.get_item_by_path("a.rs").unwrap().is_some());
    }

    #[test]
    fn test_clear_rolls_back_open_transaction() {
        let mut s = store();
        s.add_item(NewItem::file("keep.rs")).unwrap();
        s.set_auto_commit(false);
        s.begin().unwrap();
        s.add_item(NewItem::file("doomed.rs")).unwrap();
        s.clear().unwrap();

        assert_eq!(s.stats().unwrap().items, 0);
        assert!(s.get_item_by_path("doomed.rs").unwrap().is_none());
    }

    #[test]
    fn test_implicit_batching_commits_at_threshold() {
        let mut s = SqliteStore::open_in_memory(2).unwrap();
        s.initialize().unwrap();
        s.add_item(NewItem::file("a")).unwrap();
        s.add_item(NewItem::file("b")).unwrap();
        // Threshold of 2 reached: the implicit transaction has committed.
        assert!(!s.tx_open);
        s.add_item(NewItem::file("c")).unwrap();
        assert!(s.tx_open && s.implicit_tx);
    }

    #[test]
    fn test_flush_reports_dirtiness() {
        let mut s = store();
        assert!(!s.flush().unwrap());
        s.add_item(NewItem::file("a")).unwrap();
        assert!(s.flush().unwrap());
        assert!(!s.flush().unwrap());
    }

    #[test]
    fn test_stats() {
        let mut s = store();
        let id = s.add_item(NewItem::file("main.rs")).unwrap();
        s.add_trigrams(&[tg("mai", id, 0), tg("ain", id, 1)]).unwrap();
        s.add_tokens(&[tk("main", id, 0)]).unwrap();

        let stats = s.stats().unwrap();
        assert_eq!(stats.items, 1);
        assert_eq!(stats.trigrams, 2);
        assert_eq!(stats.tokens, 1);
        assert!(stats.updated_at > 0);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        let db = dir.path().join("index.db");

        {
            let mut s = SqliteStore::open(&db, 1000).unwrap();
            s.initialize().unwrap();
            let id = s.add_item(NewItem::file("src/lib.rs")).unwrap();
            s.add_trigrams(&[tg("lib", id, 0)]).unwrap();
            s.flush().unwrap();
        }

        let mut s = SqliteStore::open(&db, 1000).unwrap();
        s.initialize().unwrap();
        let item = s.get_item_by_path("src/lib.rs").unwrap().unwrap();
        assert_eq!(item.name, "lib.rs");
        let counts = s.search_trigrams(&["lib".to_string()]).unwrap();
        assert_eq!(counts.get(&item.id), Some(&1));
        assert!(s.stats().unwrap().updated_at > 0);
    }

    #[test]
    fn test_schema_error_on_foreign_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let db = dir.path().join("other.db");
        {
            let conn = Connection::open(&db).unwrap();
            conn.execute_batch("CREATE TABLE items (id INTEGER PRIMARY KEY, body TEXT);")
                .unwrap();
        }
        let mut s = SqliteStore::open(&db, 1000).unwrap();
        assert!(matches!(s.initialize(), Err(Error::Schema(_))));
    }
}
