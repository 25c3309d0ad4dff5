//! Error types for the record store substrate.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in record store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error from the underlying file system.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Record serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// A store name was not declared via `ensure_schema`.
    #[error("unknown store: {name}")]
    UnknownStore {
        /// The undeclared store name.
        name: String,
    },

    /// An index name was not declared on the given store.
    #[error("unknown index {index} on store {store}")]
    UnknownIndex {
        /// The store that was queried.
        store: String,
        /// The undeclared index name.
        index: String,
    },

    /// A record is missing a usable primary key.
    #[error("record in store {store} has no string key at {key_path:?}")]
    MissingKey {
        /// The store the record was written to.
        store: String,
        /// The key path that yielded no string.
        key_path: String,
    },

    /// The store directory is locked by another process.
    #[error("store is locked: another process has exclusive access")]
    Locked,

    /// The persisted store image could not be interpreted.
    #[error("invalid store image: {message}")]
    InvalidImage {
        /// Description of the problem.
        message: String,
    },
}

impl StoreError {
    /// Creates an unknown store error.
    pub fn unknown_store(name: impl Into<String>) -> Self {
        Self::UnknownStore { name: name.into() }
    }

    /// Creates an unknown index error.
    pub fn unknown_index(store: impl Into<String>, index: impl Into<String>) -> Self {
        Self::UnknownIndex {
            store: store.into(),
            index: index.into(),
        }
    }

    /// Creates a missing key error.
    pub fn missing_key(store: impl Into<String>, key_path: impl Into<String>) -> Self {
        Self::MissingKey {
            store: store.into(),
            key_path: key_path.into(),
        }
    }

    /// Creates an invalid image error.
    pub fn invalid_image(message: impl Into<String>) -> Self {
        Self::InvalidImage {
            message: message.into(),
        }
    }
}
