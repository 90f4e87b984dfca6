//! Error types for storage operations.

use std::error::Error;
use std::fmt;

/// Error kinds a store backend can raise, per the access plane's failure
/// taxonomy. A hand-rolled `Display`/`Error` impl, not a `thiserror` derive,
/// matching the split between this layer and the crate-level error type.
#[derive(Debug)]
pub enum StorageError {
    /// No entity ambient in the context.
    MissingContext,

    /// The record's `EntityID` disagrees with the ambient one.
    ContextMismatch(String),

    /// Target id absent under the current tenant.
    NotFound(String),

    /// Embedding length does not equal the store's configured dimension.
    DimensionError { expected: usize, actual: usize },

    /// Semantic retrieval invoked with an empty `Embedding`.
    MissingQueryVector,

    /// Malformed id, unsupported distance metric, empty connection string,
    /// or similar caller error.
    InvalidArgument(String),

    /// Wrapped cause from the storage engine.
    Backend(String),

    /// Wrapped cause from the reasoning or embedding oracle.
    Oracle(String),

    /// Malformed oracle output during reflection.
    Parse(String),

    /// Serialization/deserialization failure in a backend adapter.
    Serialization(String),

    /// Data conversion failure in a backend adapter.
    Conversion(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::MissingContext => write!(f, "missing ambient entity context"),
            StorageError::ContextMismatch(msg) => write!(f, "context mismatch: {msg}"),
            StorageError::NotFound(msg) => write!(f, "not found: {msg}"),
            StorageError::DimensionError { expected, actual } => write!(
                f,
                "dimension error: expected {expected}, got {actual}"
            ),
            StorageError::MissingQueryVector => {
                write!(f, "semantic retrieval requested with no query vector")
            }
            StorageError::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            StorageError::Backend(msg) => write!(f, "backend error: {msg}"),
            StorageError::Oracle(msg) => write!(f, "oracle error: {msg}"),
            StorageError::Parse(msg) => write!(f, "parse error: {msg}"),
            StorageError::Serialization(msg) => write!(f, "serialization error: {msg}"),
            StorageError::Conversion(msg) => write!(f, "conversion error: {msg}"),
        }
    }
}

impl Error for StorageError {}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

impl From<rocksdb::Error> for StorageError {
    fn from(err: rocksdb::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

#[cfg(any(feature = "surrealdb-embedded", feature = "surrealdb-remote"))]
impl From<surrealdb::Error> for StorageError {
    fn from(err: surrealdb::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

impl From<crate::EngramError> for StorageError {
    fn from(err: crate::EngramError) -> Self {
        match err {
            crate::EngramError::MissingContext => StorageError::MissingContext,
            crate::EngramError::ContextMismatch(s) => StorageError::ContextMismatch(s),
            crate::EngramError::NotFound(s) => StorageError::NotFound(s),
            crate::EngramError::DimensionError { expected, actual } => {
                StorageError::DimensionError { expected, actual }
            }
            crate::EngramError::MissingQueryVector => StorageError::MissingQueryVector,
            crate::EngramError::InvalidArgument(s) => StorageError::InvalidArgument(s),
            crate::EngramError::Backend(s) => StorageError::Backend(s),
            crate::EngramError::Oracle(s) => StorageError::Oracle(s),
            crate::EngramError::Parse(s) => StorageError::Parse(s),
            crate::EngramError::Configuration(s) => StorageError::InvalidArgument(s),
            crate::EngramError::Logging(s) => StorageError::Backend(s),
            crate::EngramError::Other(s) => StorageError::Backend(s),
        }
    }
}

impl From<StorageError> for crate::EngramError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::MissingContext => crate::EngramError::MissingContext,
            StorageError::ContextMismatch(s) => crate::EngramError::ContextMismatch(s),
            StorageError::NotFound(s) => crate::EngramError::NotFound(s),
            StorageError::DimensionError { expected, actual } => {
                crate::EngramError::DimensionError { expected, actual }
            }
            StorageError::MissingQueryVector => crate::EngramError::MissingQueryVector,
            StorageError::InvalidArgument(s) => crate::EngramError::InvalidArgument(s),
            StorageError::Backend(s) => crate::EngramError::Backend(s),
            StorageError::Oracle(s) => crate::EngramError::Oracle(s),
            StorageError::Parse(s) => crate::EngramError::Parse(s),
            StorageError::Serialization(s) => crate::EngramError::Backend(s),
            StorageError::Conversion(s) => crate::EngramError::Backend(s),
        }
    }
}
