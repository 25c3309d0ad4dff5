//! Round-trip, merge, and version-gate behavior of export/import.

use chrono::{Duration, Utc};
use potion_core::{
    import_workspace, CoreError, Database, ImportMode, Page, PageType, PropertyDef, PropertyKind,
    Row, Settings, StorageAdapter, Workspace, EXPORT_VERSION,
};
use potion_store::MemoryStore;
use std::sync::Arc;

fn adapter() -> StorageAdapter {
    let adapter = StorageAdapter::new(Arc::new(MemoryStore::new()));
    adapter.init().unwrap();
    adapter
}

/// Builds a workspace with a plain page, a database page with schema,
/// two rows, and their companion pages.
fn seed(adapter: &StorageAdapter, workspace_id: &str) {
    let mut workspace = Workspace::create("Seeded");
    workspace.id = workspace_id.to_owned();
    adapter.upsert_workspace(&workspace).unwrap();

    let mut notes = Page::create(workspace_id, "Notes", PageType::Page);
    notes.id = "notes".to_owned();
    notes.content = serde_json::from_value(serde_json::json!({
        "blocks": [{"type": "paragraph", "text": [{"text": "remember the milk"}]}]
    }))
    .unwrap();
    adapter.upsert_page(&notes).unwrap();

    let mut tasks = Page::create(workspace_id, "Tasks", PageType::Database);
    tasks.id = "tasks".to_owned();
    adapter.upsert_page(&tasks).unwrap();
    adapter
        .upsert_database(&Database {
            page_id: "tasks".to_owned(),
            properties: vec![PropertyDef {
                id: "status".to_owned(),
                name: "Status".to_owned(),
                kind: PropertyKind::Select,
                options: Vec::new(),
            }],
        })
        .unwrap();

    for (row_id, page_id, title) in [("r1", "rp1", "First"), ("r2", "rp2", "Second")] {
        let mut companion = Page::create(workspace_id, title, PageType::Page);
        companion.id = page_id.to_owned();
        companion.parent_page_id = Some("tasks".to_owned());
        adapter.upsert_page(&companion).unwrap();

        let mut row = Row::create("tasks", page_id);
        row.id = row_id.to_owned();
        adapter.upsert_row(&row).unwrap();
    }

    adapter.upsert_settings(&Settings::default()).unwrap();
}

#[test]
fn replace_import_round_trips_a_workspace() {
    let source = adapter();
    seed(&source, "w-src");
    let doc = source.export_workspace("w-src").unwrap();
    assert_eq!(doc.version, EXPORT_VERSION);
    assert_eq!(doc.pages.len(), 4);
    assert_eq!(doc.databases.len(), 1);
    assert_eq!(doc.rows.len(), 2);
    assert!(doc.settings.is_some());

    let target = adapter();
    let result = import_workspace(&target, Some("w-dst"), &doc, ImportMode::Replace);

    assert!(result.success, "errors: {:?}", result.errors);
    assert_eq!(result.pages_added, 4);
    assert_eq!(result.rows_added, 2);
    assert!(result.conflicts.is_empty());

    let imported = target.get_workspace("w-dst").unwrap().unwrap();
    assert_eq!(imported.name, "Seeded");

    for page in &doc.pages {
        let restored = target.get_page(&page.id).unwrap().unwrap();
        assert_eq!(restored.workspace_id, "w-dst");
        assert_eq!(restored.title, page.title);
        assert_eq!(restored.content, page.content);
    }
    let restored_db = target.get_database("tasks").unwrap().unwrap();
    assert_eq!(restored_db, doc.databases[0]);
    for row in &doc.rows {
        assert_eq!(target.get_row(&row.id).unwrap().as_ref(), Some(row));
    }
    assert_eq!(
        target.get_settings("default").unwrap(),
        doc.settings.clone()
    );
}

#[test]
fn replace_import_deletes_existing_target_first() {
    let adapter = adapter();
    seed(&adapter, "w1");

    let mut stale = Page::create("w1", "Stale local page", PageType::Page);
    stale.id = "stale".to_owned();
    adapter.upsert_page(&stale).unwrap();

    let doc = adapter.export_workspace("w1").unwrap();
    // Remove the stale page from the document, then replace-import back.
    let mut doc = doc;
    doc.pages.retain(|page| page.id != "stale");

    let result = import_workspace(&adapter, Some("w1"), &doc, ImportMode::Replace);
    assert!(result.success);

    assert!(adapter.get_page("stale").unwrap().is_none());
    assert!(adapter.get_page("notes").unwrap().is_some());
}

#[test]
fn merge_import_applies_last_writer_wins_per_page() {
    let adapter = adapter();
    seed(&adapter, "w1");
    let mut doc = adapter.export_workspace("w1").unwrap();

    let now = Utc::now();

    // Imported "notes" is newer than local; imported "rp1" is older.
    for page in &mut doc.pages {
        if page.id == "notes" {
            page.title = "Notes (imported)".to_owned();
            page.updated_at = now + Duration::hours(1);
        }
        if page.id == "rp1" {
            page.title = "First (imported)".to_owned();
            page.updated_at = now - Duration::hours(1);
        }
    }

    let result = import_workspace(&adapter, Some("w1"), &doc, ImportMode::Merge);
    assert!(result.success);

    // Every imported page collided with a local one.
    assert_eq!(result.pages_added, 0);
    assert_eq!(result.conflicts.len() as u32, 4 + 2); // 4 pages + 2 rows
    assert_eq!(result.pages_updated, 1);

    assert_eq!(
        adapter.get_page("notes").unwrap().unwrap().title,
        "Notes (imported)"
    );
    // Older import lost; local title kept.
    assert_eq!(adapter.get_page("rp1").unwrap().unwrap().title, "First");
}

#[test]
fn merge_never_duplicates_and_always_records_one_conflict() {
    let adapter = adapter();
    seed(&adapter, "w1");
    let doc = adapter.export_workspace("w1").unwrap();

    let result = import_workspace(&adapter, Some("w1"), &doc, ImportMode::Merge);
    assert!(result.success);

    let page_conflicts: Vec<_> = result
        .conflicts
        .iter()
        .filter(|conflict| conflict.id == "notes")
        .collect();
    assert_eq!(page_conflicts.len(), 1);

    // Same number of pages as before the merge.
    assert_eq!(adapter.list_pages("w1").unwrap().len(), 4);
}

#[test]
fn newer_document_version_is_a_hard_failure() {
    let adapter = adapter();
    let source = {
        let a = self::adapter();
        seed(&a, "w-src");
        a.export_workspace("w-src").unwrap()
    };
    let mut doc = source;
    doc.version = EXPORT_VERSION + 1;

    let result = import_workspace(&adapter, None, &doc, ImportMode::Merge);

    assert!(!result.success);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains(&(EXPORT_VERSION + 1).to_string()));
    // No writes happened.
    assert!(adapter.list_workspaces().unwrap().is_empty());
}

#[test]
fn import_converts_failures_into_result_errors() {
    let adapter = adapter();
    seed(&adapter, "w1");
    let doc = adapter.export_workspace("w1").unwrap();

    // A closed adapter fails every write; import must still return a
    // structured result rather than raising.
    adapter.close().unwrap();
    let result = import_workspace(&adapter, Some("w1"), &doc, ImportMode::Replace);

    assert!(!result.success);
    assert!(!result.errors.is_empty());
    assert_eq!(result.pages_added, 0);
}

#[test]
fn export_database_of_plain_page_names_the_page() {
    let adapter = adapter();
    seed(&adapter, "w1");

    let err = adapter.export_database("notes").unwrap_err();
    assert!(matches!(err, CoreError::NotADatabase { ref id } if id == "notes"));
    assert!(err.to_string().contains("notes"));
}

#[test]
fn export_page_subtree_carries_database_and_rows() {
    let adapter = adapter();
    seed(&adapter, "w1");

    let doc = adapter.export_page("tasks", true).unwrap();
    // The database page plus both companion pages under it.
    assert_eq!(doc.pages.len(), 3);
    assert_eq!(doc.databases.len(), 1);
    assert_eq!(doc.rows.len(), 2);
    assert!(doc.settings.is_none());
}

#[test]
fn export_database_includes_companion_pages() {
    let adapter = adapter();
    seed(&adapter, "w1");

    let doc = adapter.export_database("tasks").unwrap();
    let ids: Vec<&str> = doc.pages.iter().map(|page| page.id.as_str()).collect();
    assert!(ids.contains(&"tasks") && ids.contains(&"rp1") && ids.contains(&"rp2"));
    assert_eq!(doc.rows.len(), 2);
}
