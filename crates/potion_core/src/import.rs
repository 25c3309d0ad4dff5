//! Import of portable export documents.
//!
//! Import never raises: every failure is folded into the returned
//! [`ImportResult`], including failures partway through. Entities
//! written before the failure stay written (import is not atomic), and
//! the counters reflect exactly what landed.

use crate::adapter::StorageAdapter;
use crate::error::{CoreError, CoreResult, EntityKind};
use crate::export::{WorkspaceExport, EXPORT_VERSION};
use crate::model::Timestamp;
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// How an import treats existing local data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// Delete the target workspace (full cascade) and recreate it from
    /// the document.
    Replace,
    /// Reconcile document entities against local ones, last writer wins.
    Merge,
}

/// Outcome of an import.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    /// False when any error was recorded.
    pub success: bool,
    /// Pages written as new.
    pub pages_added: u32,
    /// Pages overwritten by last-writer-wins.
    pub pages_updated: u32,
    /// Rows written as new.
    pub rows_added: u32,
    /// Rows overwritten by last-writer-wins.
    pub rows_updated: u32,
    /// Conflicts observed in merge mode.
    pub conflicts: Vec<ImportConflict>,
    /// Error messages, in occurrence order.
    pub errors: Vec<String>,
}

/// A merge-mode collision between a local entity and an imported one
/// with the same id. Recorded whether or not the import won.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportConflict {
    /// Entity kind (`page` or `row`).
    #[serde(rename = "type")]
    pub kind: EntityKind,
    /// The colliding id.
    pub id: String,
    /// Local entity's last modification time.
    pub local_updated_at: Timestamp,
    /// Imported entity's last modification time.
    pub imported_updated_at: Timestamp,
    /// Local title (companion page title for rows; may be empty).
    pub local_title: String,
    /// Imported title (companion page title for rows; may be empty).
    pub imported_title: String,
}

/// Imports an export document into the workspace at `workspace_id`
/// (defaulting to the document's own workspace id).
///
/// The document version must be at most [`EXPORT_VERSION`]; newer
/// documents fail before any write. All other failures abort the run
/// but keep whatever was already written.
pub fn import_workspace(
    adapter: &StorageAdapter,
    workspace_id: Option<&str>,
    data: &WorkspaceExport,
    mode: ImportMode,
) -> ImportResult {
    let mut result = ImportResult {
        success: true,
        ..ImportResult::default()
    };

    if data.version > EXPORT_VERSION {
        let err = CoreError::UnsupportedVersion {
            found: data.version,
            supported: EXPORT_VERSION,
        };
        result.success = false;
        result.errors.push(err.to_string());
        return result;
    }

    let target = workspace_id.unwrap_or(&data.workspace.id).to_owned();
    let outcome = match mode {
        ImportMode::Replace => import_replace(adapter, &target, data, &mut result),
        ImportMode::Merge => import_merge(adapter, &target, data, &mut result),
    };
    if let Err(err) = outcome {
        result.success = false;
        result.errors.push(err.to_string());
    }
    result
}

fn import_replace(
    adapter: &StorageAdapter,
    target: &str,
    data: &WorkspaceExport,
    result: &mut ImportResult,
) -> CoreResult<()> {
    if adapter.get_workspace(target)?.is_some() {
        adapter.delete_workspace(target)?;
    }

    let mut workspace = data.workspace.clone();
    workspace.id = target.to_owned();
    workspace.updated_at = Utc::now();
    adapter.upsert_workspace(&workspace)?;

    for page in &data.pages {
        let mut page = page.clone();
        page.workspace_id = target.to_owned();
        adapter.upsert_page(&page)?;
        result.pages_added += 1;
    }
    for database in &data.databases {
        adapter.upsert_database(database)?;
    }
    for row in &data.rows {
        adapter.upsert_row(row)?;
        result.rows_added += 1;
    }
    if let Some(settings) = &data.settings {
        adapter.upsert_settings(settings)?;
    }
    Ok(())
}

fn import_merge(
    adapter: &StorageAdapter,
    target: &str,
    data: &WorkspaceExport,
    result: &mut ImportResult,
) -> CoreResult<()> {
    if adapter.get_workspace(target)?.is_none() {
        let mut workspace = data.workspace.clone();
        workspace.id = target.to_owned();
        workspace.updated_at = Utc::now();
        adapter.upsert_workspace(&workspace)?;
    }

    for page in &data.pages {
        let mut incoming = page.clone();
        incoming.workspace_id = target.to_owned();
        match adapter.get_page(&incoming.id)? {
            None => {
                adapter.upsert_page(&incoming)?;
                result.pages_added += 1;
            }
            Some(local) => {
                result.conflicts.push(ImportConflict {
                    kind: EntityKind::Page,
                    id: incoming.id.clone(),
                    local_updated_at: local.updated_at,
                    imported_updated_at: incoming.updated_at,
                    local_title: local.title.clone(),
                    imported_title: incoming.title.clone(),
                });
                if incoming.updated_at > local.updated_at {
                    adapter.upsert_page(&incoming)?;
                    result.pages_updated += 1;
                }
            }
        }
    }

    // Database schemas carry no timestamps; the imported schema wins.
    for database in &data.databases {
        adapter.upsert_database(database)?;
    }

    for row in &data.rows {
        match adapter.get_row(&row.id)? {
            None => {
                adapter.upsert_row(row)?;
                result.rows_added += 1;
            }
            Some(local) => {
                let local_title = adapter
                    .get_page(&local.page_id)?
                    .map(|page| page.title)
                    .unwrap_or_default();
                let imported_title = data
                    .pages
                    .iter()
                    .find(|page| page.id == row.page_id)
                    .map(|page| page.title.clone())
                    .unwrap_or_default();
                result.conflicts.push(ImportConflict {
                    kind: EntityKind::Row,
                    id: row.id.clone(),
                    local_updated_at: local.updated_at,
                    imported_updated_at: row.updated_at,
                    local_title,
                    imported_title,
                });
                if row.updated_at > local.updated_at {
                    adapter.upsert_row(row)?;
                    result.rows_updated += 1;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Page, PageType, Workspace};
    use potion_store::MemoryStore;
    use std::sync::Arc;

    fn adapter() -> StorageAdapter {
        let adapter = StorageAdapter::new(Arc::new(MemoryStore::new()));
        adapter.init().unwrap();
        adapter
    }

    fn document() -> WorkspaceExport {
        let mut workspace = Workspace::create("Exported");
        workspace.id = "w-src".to_owned();
        let mut page = Page::create("w-src", "Doc page", PageType::Page);
        page.id = "p1".to_owned();
        WorkspaceExport {
            version: EXPORT_VERSION,
            exported_at: Utc::now(),
            workspace,
            pages: vec![page],
            databases: Vec::new(),
            rows: Vec::new(),
            settings: None,
        }
    }

    #[test]
    fn newer_version_is_rejected_without_writes() {
        let adapter = adapter();
        let mut doc = document();
        doc.version = EXPORT_VERSION + 1;

        let result = import_workspace(&adapter, None, &doc, ImportMode::Replace);

        assert!(!result.success);
        assert!(result.errors[0].contains(&format!("{}", EXPORT_VERSION + 1)));
        assert!(adapter.list_workspaces().unwrap().is_empty());
    }

    #[test]
    fn replace_rewrites_ids_to_target() {
        let adapter = adapter();
        let doc = document();

        let result = import_workspace(&adapter, Some("w-new"), &doc, ImportMode::Replace);

        assert!(result.success);
        assert_eq!(result.pages_added, 1);
        assert!(adapter.get_workspace("w-new").unwrap().is_some());
        let page = adapter.get_page("p1").unwrap().unwrap();
        assert_eq!(page.workspace_id, "w-new");
    }

    #[test]
    fn merge_creates_workspace_when_absent() {
        let adapter = adapter();
        let doc = document();

        let result = import_workspace(&adapter, None, &doc, ImportMode::Merge);

        assert!(result.success);
        assert!(result.conflicts.is_empty());
        assert!(adapter.get_workspace("w-src").unwrap().is_some());
    }

    #[test]
    fn merge_keeps_newer_local_page_but_records_conflict() {
        let adapter = adapter();
        let doc = document();

        let mut workspace = doc.workspace.clone();
        workspace.updated_at = Utc::now();
        adapter.upsert_workspace(&workspace).unwrap();

        let mut local = doc.pages[0].clone();
        local.title = "Local wins".to_owned();
        local.updated_at = doc.pages[0].updated_at + chrono::Duration::seconds(60);
        adapter.upsert_page(&local).unwrap();

        let result = import_workspace(&adapter, None, &doc, ImportMode::Merge);

        assert!(result.success);
        assert_eq!(result.pages_added, 0);
        assert_eq!(result.pages_updated, 0);
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].kind, EntityKind::Page);
        assert_eq!(
            adapter.get_page("p1").unwrap().unwrap().title,
            "Local wins"
        );
    }
}
