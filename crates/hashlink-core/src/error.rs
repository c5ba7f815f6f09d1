use crate::short_id::ShortId;
use thiserror::Error;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors surfaced by every storage backend.
///
/// `Conflict`, `NotFound`, `Deleted` and the two parse errors are client-facing
/// outcomes; the remaining variants describe an unavailable or misbehaving
/// backend and are never retried inline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("short id {0} is already taken by another url")]
    Conflict(ShortId),
    #[error("not found")]
    NotFound,
    #[error("url has been deleted")]
    Deleted,
    #[error("invalid short id: {0}")]
    InvalidShortId(String),
    #[error("invalid user: {0}")]
    InvalidUser(String),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("storage io failed: {0}")]
    Io(String),
    #[error("schema migration failed: {0}")]
    Migration(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}
