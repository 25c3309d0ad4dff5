//! Built-in schema migrations.
//!
//! Each migration that reshapes records declares the old record shape as
//! an explicit versioned type and maps it to the current shape through a
//! pure transform, then writes the result back through raw access. No
//! migration patches fields into untyped records.

use crate::adapter::{StorageAdapter, INDEX_PAGES_BY_TYPE, STORE_PAGES, STORE_ROWS};
use crate::content::BlockContent;
use crate::error::CoreResult;
use crate::migration::{Migration, MigrationRunner};
use crate::model::{Page, PageType, Timestamp};
use serde::Deserialize;
use std::collections::HashSet;
use tracing::info;

/// Builds the runner with every migration this application ships,
/// in version order.
pub fn builtin_runner() -> CoreResult<MigrationRunner> {
    let mut runner = MigrationRunner::new();
    runner.register(Box::new(InitialSchema))?;
    runner.register(Box::new(PageLastAccessed))?;
    runner.register(Box::new(PruneOrphanRows))?;
    Ok(runner)
}

/// v1: baseline marker.
///
/// Stores and indexes are created by `init` (which must stay idempotent
/// and always-on), so this migration only records in the ledger that the
/// initial schema exists.
struct InitialSchema;

impl Migration for InitialSchema {
    fn version(&self) -> u32 {
        1
    }

    fn name(&self) -> &str {
        "initial-schema"
    }

    fn description(&self) -> &str {
        "Baseline: workspaces, pages, databases, rows, settings"
    }

    fn up(&self, _adapter: &StorageAdapter) -> CoreResult<()> {
        Ok(())
    }
}

/// The page record shape before v2: no `lastAccessedAt`.
///
/// Deserializes tolerantly from post-v2 records too, so re-running the
/// transform after a partial failure keeps already-migrated values.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageV1 {
    id: String,
    workspace_id: String,
    parent_page_id: Option<String>,
    title: String,
    #[serde(rename = "type")]
    page_type: PageType,
    #[serde(default)]
    icon: Option<String>,
    is_favorite: bool,
    is_full_width: bool,
    content: BlockContent,
    created_at: Timestamp,
    updated_at: Timestamp,
    #[serde(default)]
    last_accessed_at: Option<Timestamp>,
}

impl PageV1 {
    /// Pure transform to the current page shape. New field defaults to
    /// the last modification time.
    fn upgrade(self) -> Page {
        Page {
            id: self.id,
            workspace_id: self.workspace_id,
            parent_page_id: self.parent_page_id,
            title: self.title,
            page_type: self.page_type,
            icon: self.icon,
            is_favorite: self.is_favorite,
            is_full_width: self.is_full_width,
            content: self.content,
            created_at: self.created_at,
            last_accessed_at: self.last_accessed_at.unwrap_or(self.updated_at),
            updated_at: self.updated_at,
        }
    }
}

/// v2: every page gains `lastAccessedAt`, defaulting to `updatedAt`.
struct PageLastAccessed;

impl Migration for PageLastAccessed {
    fn version(&self) -> u32 {
        2
    }

    fn name(&self) -> &str {
        "page-last-accessed"
    }

    fn description(&self) -> &str {
        "Track when pages were last opened"
    }

    fn up(&self, adapter: &StorageAdapter) -> CoreResult<()> {
        let mut migrated = 0usize;
        for value in adapter.scan_raw(STORE_PAGES)? {
            let old: PageV1 = serde_json::from_value(value)?;
            adapter.put_raw(STORE_PAGES, serde_json::to_value(old.upgrade())?)?;
            migrated += 1;
        }
        info!(pages = migrated, "backfilled lastAccessedAt");
        Ok(())
    }
}

/// The subset of a row record v3 needs to judge orphanhood.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RowRef {
    id: String,
    database_page_id: String,
}

/// v3: delete rows whose database page no longer exists as a database.
///
/// Repairs stores written before cascading deletes covered rows.
/// Destructive: rows are dropped, so the runner snapshots first.
struct PruneOrphanRows;

impl Migration for PruneOrphanRows {
    fn version(&self) -> u32 {
        3
    }

    fn name(&self) -> &str {
        "prune-orphan-rows"
    }

    fn description(&self) -> &str {
        "Delete rows whose database page is gone"
    }

    fn destructive(&self) -> bool {
        true
    }

    fn up(&self, adapter: &StorageAdapter) -> CoreResult<()> {
        let database_pages: HashSet<String> = adapter
            .record_store()?
            .scan_index(STORE_PAGES, INDEX_PAGES_BY_TYPE, "database")?
            .iter()
            .filter_map(|value| value.get("id").and_then(|id| id.as_str()))
            .map(str::to_owned)
            .collect();

        let mut pruned = 0usize;
        for value in adapter.scan_raw(STORE_ROWS)? {
            let row: RowRef = serde_json::from_value(value)?;
            if !database_pages.contains(&row.database_page_id) {
                adapter.delete_raw(STORE_ROWS, &row.id)?;
                pruned += 1;
            }
        }
        if pruned > 0 {
            info!(rows = pruned, "pruned orphan rows");
        }
        Ok(())
    }
}
