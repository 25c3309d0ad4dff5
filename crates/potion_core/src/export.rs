//! Workspace, page-subtree, and database export.
//!
//! Every export operation produces a [`WorkspaceExport`]: the portable
//! JSON document consumed by import, backups, and external tooling.

use crate::adapter::StorageAdapter;
use crate::error::{CoreError, CoreResult, EntityKind};
use crate::model::{
    Database, Page, PageType, Row, Settings, Timestamp, Workspace, DEFAULT_SETTINGS_ID,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

/// Current export document format version.
///
/// Importers accept documents with `version <=` this constant and reject
/// newer ones.
pub const EXPORT_VERSION: u32 = 1;

/// The portable export document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceExport {
    /// Document format version.
    pub version: u32,
    /// When the export was produced.
    pub exported_at: Timestamp,
    /// The exported workspace record.
    pub workspace: Workspace,
    /// Exported pages.
    pub pages: Vec<Page>,
    /// Exported database schemas.
    pub databases: Vec<Database>,
    /// Exported rows.
    pub rows: Vec<Row>,
    /// Settings, present only in full-workspace exports.
    pub settings: Option<Settings>,
}

/// Exports a full workspace snapshot: the workspace, every page under
/// it, every database and its rows, and the settings singleton when
/// present.
pub fn export_workspace(
    adapter: &StorageAdapter,
    workspace_id: &str,
) -> CoreResult<WorkspaceExport> {
    let workspace = adapter
        .get_workspace(workspace_id)?
        .ok_or_else(|| CoreError::not_found(EntityKind::Workspace, workspace_id))?;
    let pages = adapter.workspace_pages(workspace_id)?;

    let (databases, rows) = collect_databases(adapter, &pages)?;
    let settings = adapter.get_settings(DEFAULT_SETTINGS_ID)?;

    Ok(WorkspaceExport {
        version: EXPORT_VERSION,
        exported_at: Utc::now(),
        workspace,
        pages,
        databases,
        rows,
        settings,
    })
}

/// Exports a page, optionally with its full descendant subtree, plus the
/// database and rows of every included database page. `settings` is
/// always `None` in this mode.
pub fn export_page(
    adapter: &StorageAdapter,
    page_id: &str,
    include_children: bool,
) -> CoreResult<WorkspaceExport> {
    let root = adapter
        .get_page(page_id)?
        .ok_or_else(|| CoreError::not_found(EntityKind::Page, page_id))?;
    let workspace = adapter
        .get_workspace(&root.workspace_id)?
        .ok_or_else(|| CoreError::not_found(EntityKind::Workspace, root.workspace_id.clone()))?;

    let mut pages = vec![root];
    if include_children {
        collect_subtree(adapter, page_id, &mut pages)?;
    }

    let (databases, rows) = collect_databases(adapter, &pages)?;

    Ok(WorkspaceExport {
        version: EXPORT_VERSION,
        exported_at: Utc::now(),
        workspace,
        pages,
        databases,
        rows,
        settings: None,
    })
}

/// Exports one database page: the page itself, its schema and rows, and
/// every row's companion page.
///
/// Fails naming the page id when the page is absent or not a database
/// page, or when its database record is missing.
pub fn export_database(
    adapter: &StorageAdapter,
    database_page_id: &str,
) -> CoreResult<WorkspaceExport> {
    let page = adapter.require_database_page(database_page_id)?;
    let database = adapter
        .get_database(database_page_id)?
        .ok_or_else(|| CoreError::not_found(EntityKind::Database, database_page_id))?;
    let workspace = adapter
        .get_workspace(&page.workspace_id)?
        .ok_or_else(|| CoreError::not_found(EntityKind::Workspace, page.workspace_id.clone()))?;

    let rows = adapter.database_rows(database_page_id)?;
    let mut pages = vec![page];
    for row in &rows {
        let companion = adapter
            .get_page(&row.page_id)?
            .ok_or_else(|| CoreError::not_found(EntityKind::Page, row.page_id.clone()))?;
        pages.push(companion);
    }

    Ok(WorkspaceExport {
        version: EXPORT_VERSION,
        exported_at: Utc::now(),
        workspace,
        pages,
        databases: vec![database],
        rows,
        settings: None,
    })
}

/// Breadth-first descendant collection with a visited set, so a corrupt
/// parent chain forming a cycle terminates instead of looping.
fn collect_subtree(
    adapter: &StorageAdapter,
    root_id: &str,
    pages: &mut Vec<Page>,
) -> CoreResult<()> {
    let mut visited: HashSet<String> = pages.iter().map(|page| page.id.clone()).collect();
    let mut queue = VecDeque::from([root_id.to_owned()]);

    while let Some(parent_id) = queue.pop_front() {
        for child in adapter.get_child_pages(&parent_id)? {
            if !visited.insert(child.id.clone()) {
                continue;
            }
            if let Some(page) = adapter.get_page(&child.id)? {
                queue.push_back(page.id.clone());
                pages.push(page);
            }
        }
    }
    Ok(())
}

/// Gathers the database schema and rows of every database-typed page in
/// the given set.
fn collect_databases(
    adapter: &StorageAdapter,
    pages: &[Page],
) -> CoreResult<(Vec<Database>, Vec<Row>)> {
    let mut databases = Vec::new();
    let mut rows = Vec::new();
    for page in pages.iter().filter(|p| p.page_type == PageType::Database) {
        if let Some(database) = adapter.get_database(&page.id)? {
            databases.push(database);
            rows.extend(adapter.database_rows(&page.id)?);
        }
    }
    Ok((databases, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use potion_store::MemoryStore;
    use std::sync::Arc;

    fn adapter() -> StorageAdapter {
        let adapter = StorageAdapter::new(Arc::new(MemoryStore::new()));
        adapter.init().unwrap();
        adapter
    }

    fn seed_workspace(adapter: &StorageAdapter) {
        let mut workspace = Workspace::create("Home");
        workspace.id = "w1".to_owned();
        adapter.upsert_workspace(&workspace).unwrap();
    }

    fn seed_page(adapter: &StorageAdapter, id: &str, parent: Option<&str>, page_type: PageType) {
        let mut page = Page::create("w1", format!("Page {id}"), page_type);
        page.id = id.to_owned();
        page.parent_page_id = parent.map(str::to_owned);
        adapter.upsert_page(&page).unwrap();
    }

    #[test]
    fn export_missing_workspace_names_id() {
        let adapter = adapter();
        let err = export_workspace(&adapter, "ghost").unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn export_page_without_children_is_single_page() {
        let adapter = adapter();
        seed_workspace(&adapter);
        seed_page(&adapter, "root", None, PageType::Page);
        seed_page(&adapter, "child", Some("root"), PageType::Page);

        let doc = export_page(&adapter, "root", false).unwrap();
        assert_eq!(doc.pages.len(), 1);
        assert!(doc.settings.is_none());
    }

    #[test]
    fn export_page_subtree_collects_descendants() {
        let adapter = adapter();
        seed_workspace(&adapter);
        seed_page(&adapter, "root", None, PageType::Page);
        seed_page(&adapter, "child", Some("root"), PageType::Page);
        seed_page(&adapter, "grandchild", Some("child"), PageType::Page);
        seed_page(&adapter, "unrelated", None, PageType::Page);

        let doc = export_page(&adapter, "root", true).unwrap();
        let ids: Vec<&str> = doc.pages.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids.len(), 3);
        assert!(ids.contains(&"root") && ids.contains(&"child") && ids.contains(&"grandchild"));
    }

    #[test]
    fn export_page_survives_parent_cycle() {
        let adapter = adapter();
        seed_workspace(&adapter);
        seed_page(&adapter, "a", Some("b"), PageType::Page);
        seed_page(&adapter, "b", Some("a"), PageType::Page);

        let doc = export_page(&adapter, "a", true).unwrap();
        assert_eq!(doc.pages.len(), 2);
    }

    #[test]
    fn export_database_rejects_plain_page() {
        let adapter = adapter();
        seed_workspace(&adapter);
        seed_page(&adapter, "plain", None, PageType::Page);

        let err = export_database(&adapter, "plain").unwrap_err();
        assert!(matches!(err, CoreError::NotADatabase { ref id } if id == "plain"));
    }

    #[test]
    fn export_database_requires_schema_record() {
        let adapter = adapter();
        seed_workspace(&adapter);
        seed_page(&adapter, "db", None, PageType::Database);

        let err = export_database(&adapter, "db").unwrap_err();
        assert!(matches!(
            err,
            CoreError::NotFound {
                kind: EntityKind::Database,
                ..
            }
        ));
    }

    #[test]
    fn export_database_fails_on_missing_companion_page() {
        let adapter = adapter();
        seed_workspace(&adapter);
        seed_page(&adapter, "db", None, PageType::Database);
        adapter
            .upsert_database(&Database {
                page_id: "db".to_owned(),
                properties: Vec::new(),
            })
            .unwrap();
        let mut row = Row::create("db", "missing-page");
        row.id = "r1".to_owned();
        adapter.upsert_row(&row).unwrap();

        let err = export_database(&adapter, "db").unwrap_err();
        assert!(err.to_string().contains("missing-page"));
    }
}
