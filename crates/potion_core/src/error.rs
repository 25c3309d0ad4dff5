//! Error types for the Potion storage engine.

use std::fmt;
use thiserror::Error;

/// Result type for storage engine operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// The kind of entity an operation referred to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// A workspace record.
    Workspace,
    /// A page record.
    Page,
    /// A database record.
    Database,
    /// A row record.
    Row,
    /// A backup snapshot in the side channel.
    Backup,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Workspace => "workspace",
            Self::Page => "page",
            Self::Database => "database",
            Self::Row => "row",
            Self::Backup => "backup",
        };
        f.write_str(name)
    }
}

/// Errors that can occur in storage engine operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Record store error, propagated verbatim.
    #[error("store error: {0}")]
    Store(#[from] potion_store::StoreError),

    /// A stored record could not be decoded into its model type.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Operation attempted before `init` completed or after `close`.
    #[error("storage adapter is not initialized")]
    NotInitialized,

    /// A referenced entity is absent where its presence is required.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// What was looked up.
        kind: EntityKind,
        /// The id that did not resolve.
        id: String,
    },

    /// A page was expected to be of type `database` but is not.
    #[error("page {id} is not a database page")]
    NotADatabase {
        /// The offending page id.
        id: String,
    },

    /// An import document is newer than this engine supports.
    #[error("unsupported export version {found} (importer supports up to {supported})")]
    UnsupportedVersion {
        /// Version declared by the document.
        found: u32,
        /// Highest version this engine reads.
        supported: u32,
    },

    /// A migration step failed; the run stops here.
    #[error("migration failed: {message}")]
    MigrationFailed {
        /// Description of the failure.
        message: String,
    },
}

impl CoreError {
    /// Creates a not-found error.
    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Creates a not-a-database error.
    pub fn not_a_database(id: impl Into<String>) -> Self {
        Self::NotADatabase { id: id.into() }
    }

    /// Creates a migration failed error.
    pub fn migration_failed(message: impl Into<String>) -> Self {
        Self::MigrationFailed {
            message: message.into(),
        }
    }
}
