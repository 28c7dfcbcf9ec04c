//! Error types shared across the crate.

use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Error kinds surfaced by the storage layer, the builder and the façade.
///
/// Storage errors propagate out of the adapter untouched; the builder maps a
/// cancelled build to [`Error::Cancelled`] after rolling back.
#[derive(Debug, Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate path: {0}")]
    DuplicatePath(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("unexpected schema: {0}")]
    Schema(String),

    #[error("indexing cancelled")]
    Cancelled,

    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl Error {
    /// True when retrying the same call cannot succeed without intervention.
    pub fn is_permanent(&self) -> bool {
        !matches!(self, Error::Io(_) | Error::Database(_))
    }
}
