//! Index construction and maintenance.
//!
//! - [`builder`] - initial sweep, incremental batches, refresh
//! - [`pending`] - change coalescing and debounce
//! - [`providers`] - seams to the workspace enumerator and symbol source

pub mod builder;
pub mod pending;
pub mod providers;

pub use builder::{IndexBuilder, SharedStore, PROGRESS_INTERVAL};
pub use pending::{ChangeKind, PendingChanges};
pub use providers::{
    NullSymbolProvider, StaticEnumerator, StaticSymbolProvider, SymbolInfo, SymbolProvider,
    WalkEnumerator, WorkspaceEnumerator,
};
