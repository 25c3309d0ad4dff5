//! # Potion Core
//!
//! Storage engine for the Potion workspace: the typed adapter over the
//! record store, the versioned migration engine, export-based backups,
//! and the portable export/import subsystem.
//!
//! This crate provides:
//! - [`StorageAdapter`] - typed CRUD and indexed lookups over the five
//!   logical stores (workspaces, pages, databases, rows, settings)
//! - [`MigrationRunner`] - ordered, fail-stop schema migrations with a
//!   persisted ledger and backup-before-destructive-change
//! - [`backup`] - best-effort snapshots in the side-channel log
//! - [`export`] / [`import`] - the portable workspace document, with
//!   replace and merge (last-writer-wins) import modes
//! - [`Storage`] - the process-wide handle with single-flight
//!   initialization

pub mod adapter;
pub mod backup;
pub mod content;
pub mod error;
pub mod export;
pub mod handle;
pub mod import;
pub mod migration;
pub mod migrations;
pub mod model;
pub mod stats;

pub use adapter::{
    StorageAdapter, INDEX_PAGES_BY_PARENT, INDEX_PAGES_BY_TYPE, INDEX_PAGES_BY_WORKSPACE,
    INDEX_ROWS_BY_DATABASE, STORE_DATABASES, STORE_PAGES, STORE_ROWS, STORE_SETTINGS,
    STORE_WORKSPACES,
};
pub use backup::{
    create_backup, list_backups, prune_backups, read_backup, BackupInfo, BackupSnapshot,
    BACKUP_KEY_PREFIX, DEFAULT_BACKUP_KEEP,
};
pub use content::{Block, BlockContent, InlineRun};
pub use error::{CoreError, CoreResult, EntityKind};
pub use export::{WorkspaceExport, EXPORT_VERSION};
pub use handle::Storage;
pub use import::{import_workspace, ImportConflict, ImportMode, ImportResult};
pub use migration::{
    Migration, MigrationInfo, MigrationRecord, MigrationReport, MigrationRunner, MigrationState,
    MIGRATION_STATE_KEY,
};
pub use migrations::builtin_runner;
pub use model::{
    new_id, Database, EditorWidth, FontSize, Page, PageSummary, PageType, PropertyDef,
    PropertyKind, Row, RowSummary, SelectOption, Settings, Theme, Timestamp, Workspace,
    DEFAULT_SETTINGS_ID,
};
pub use stats::StorageStats;

/// Crate version, surfaced by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
