//! # navix - workspace file and symbol search
//!
//! navix is an in-process, incrementally-maintained search engine over the
//! file paths and declared symbols of a developer's workspace. It answers
//! short queries with a ranked list of matching names in well under 100ms
//! on codebases with millions of items.
//!
//! ## Architecture
//!
//! The crate is organized into these main modules:
//!
//! - [`text`] - normalization, trigram and token extraction, scoring
//! - [`store`] - the storage contract plus the sharded in-memory and
//!   SQLite-backed implementations
//! - [`index`] - index building and incremental maintenance
//! - [`query`] - the query pipeline (recall, scoring, ranking)
//! - [`engine`] - the public [`SearchEngine`] façade
//!
//! ## Quick Start
//!
//! ```ignore
//! use navix::{SearchEngine, SearchConfig, WalkEnumerator, NullSymbolProvider};
//! use std::path::PathBuf;
//!
//! let root = PathBuf::from("/path/to/workspace");
//! let engine = SearchEngine::open(&root, SearchConfig::load(&root))?;
//! engine.initialize(&WalkEnumerator::new(root), &NullSymbolProvider, None)?;
//!
//! for hit in engine.search("getUserNm", 20)? {
//!     println!("{:4}  {}", hit.score, hit.path);
//! }
//! engine.shutdown()?;
//! ```
//!
//! ## Indexing strategy
//!
//! Two inverted indexes cooperate:
//!
//! 1. **Trigram index** - 3-byte windows over normalized names and paths,
//!    for substring and fuzzy recall
//! 2. **Token index** - CamelCase / snake_case / kebab-case word segments,
//!    for initialism-style queries like "gUN" → `getUserName`
//!
//! Candidates recalled from either index are re-scored against the item
//! name on a strict ladder (exact > prefix > contains > abbreviation >
//! fuzzy), so recall stays cheap and precision comes from ranking.

pub mod config;
pub mod engine;
pub mod error;
pub mod index;
pub mod query;
pub mod store;
pub mod text;

pub use config::{SearchConfig, StorageKind};
pub use engine::SearchEngine;
pub use error::{Error, Result};
pub use index::{
    ChangeKind, IndexBuilder, NullSymbolProvider, StaticEnumerator, StaticSymbolProvider,
    SymbolInfo, SymbolProvider, WalkEnumerator, WorkspaceEnumerator,
};
pub use query::{QueryEngine, SearchHit};
pub use store::{IndexStats, Item, ItemId, ItemKind, ItemStore, MemoryStore, SqliteStore};
