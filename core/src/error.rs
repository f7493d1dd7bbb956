//! Error types for the fallible seams of the core: the key-value store,
//! saved-state validation, notification hooks and the offline asset cache.
//!
//! Game operations themselves never return these; the session logs and
//! recovers from every one of them.

use thiserror::Error;

/// Failure reported by a [`crate::store::KeyValueStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage is unavailable: {0}")]
    Unavailable(String),

    #[error("storage write rejected for key {key}: {reason}")]
    WriteRejected { key: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Why a persisted session record was discarded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("record is not valid JSON")]
    Malformed,

    #[error("record is not a JSON object")]
    NotAnObject,

    #[error("size is not an integer")]
    SizeNotInteger,

    #[error("size {0} is outside 2..=8")]
    SizeOutOfRange(i64),

    #[error("grid is not an array of rows")]
    GridNotArray,

    #[error("grid has {found} rows, expected {expected}")]
    RowCount { expected: usize, found: usize },

    #[error("row {row} has {found} cells, expected {expected}")]
    ColumnCount {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("cell ({row}, {col}) is not a non-negative integer")]
    BadCell { row: usize, col: usize },

    #[error("score is missing or not a non-negative integer")]
    BadScore,
}

/// Failure reported by a [`crate::session::Notifier`]. Always swallowed.
#[derive(Debug, Error)]
#[error("notification failed: {0}")]
pub struct NotifyError(pub String);

/// Failure inside the offline asset cache.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("network request for {path} failed: {reason}")]
    Network { path: String, reason: String },

    #[error("cache storage failure: {0}")]
    Storage(String),
}
