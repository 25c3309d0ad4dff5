//! Typed storage adapter over the record store.
//!
//! The adapter is the only component that touches the record store
//! directly. It owns the schema of the five logical stores, implements
//! CRUD and the enumerated index lookups, and executes cascading deletes
//! as single atomic batches.

use crate::error::{CoreError, CoreResult, EntityKind};
use crate::export;
use crate::model::{
    Database, Page, PageSummary, PageType, Row, RowSummary, Settings, Workspace,
};
use crate::stats::StorageStats;
use parking_lot::RwLock;
use potion_store::{RecordStore, StoreSpec, WriteBatch};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Workspace store name.
pub const STORE_WORKSPACES: &str = "workspaces";
/// Page store name.
pub const STORE_PAGES: &str = "pages";
/// Database store name.
pub const STORE_DATABASES: &str = "databases";
/// Row store name.
pub const STORE_ROWS: &str = "rows";
/// Settings store name.
pub const STORE_SETTINGS: &str = "settings";

/// Pages by owning workspace.
pub const INDEX_PAGES_BY_WORKSPACE: &str = "by_workspace";
/// Pages by parent page. Root pages (null parent) have no entry.
pub const INDEX_PAGES_BY_PARENT: &str = "by_parent";
/// Pages by page type.
pub const INDEX_PAGES_BY_TYPE: &str = "by_type";
/// Rows by owning database page.
pub const INDEX_ROWS_BY_DATABASE: &str = "by_database";

/// Placeholder title for rows whose companion page is missing.
const UNTITLED: &str = "Untitled";

fn schema() -> Vec<StoreSpec> {
    vec![
        StoreSpec::new(STORE_WORKSPACES, "id"),
        StoreSpec::new(STORE_PAGES, "id")
            .with_index(INDEX_PAGES_BY_WORKSPACE, "workspaceId")
            .with_index(INDEX_PAGES_BY_PARENT, "parentPageId")
            .with_index(INDEX_PAGES_BY_TYPE, "type"),
        StoreSpec::new(STORE_DATABASES, "pageId"),
        StoreSpec::new(STORE_ROWS, "id").with_index(INDEX_ROWS_BY_DATABASE, "databasePageId"),
        StoreSpec::new(STORE_SETTINGS, "id"),
    ]
}

/// Typed CRUD and query surface over the five logical stores.
///
/// Construct with [`StorageAdapter::new`], then call [`init`] before any
/// other operation; everything else fails with
/// [`CoreError::NotInitialized`] until `init` completes, and again after
/// [`close`].
///
/// [`init`]: StorageAdapter::init
/// [`close`]: StorageAdapter::close
pub struct StorageAdapter {
    store: Arc<dyn RecordStore>,
    ready: RwLock<bool>,
}

impl StorageAdapter {
    /// Creates an adapter over the given record store. No I/O happens
    /// until [`init`](StorageAdapter::init).
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            ready: RwLock::new(false),
        }
    }

    /// Creates stores and indexes if absent, and opens the adapter for
    /// use. Idempotent.
    pub fn init(&self) -> CoreResult<()> {
        self.store.ensure_schema(&schema())?;
        *self.ready.write() = true;
        Ok(())
    }

    /// Flushes the store and closes the adapter. Subsequent operations
    /// fail with `NotInitialized` until [`init`](StorageAdapter::init)
    /// succeeds again.
    pub fn close(&self) -> CoreResult<()> {
        self.guard()?;
        self.store.flush()?;
        *self.ready.write() = false;
        Ok(())
    }

    fn guard(&self) -> CoreResult<()> {
        if *self.ready.read() {
            Ok(())
        } else {
            Err(CoreError::NotInitialized)
        }
    }

    /// The underlying record store, for engine-internal side-channel and
    /// raw access. Guarded like every other operation.
    pub(crate) fn record_store(&self) -> CoreResult<&dyn RecordStore> {
        self.guard()?;
        Ok(self.store.as_ref())
    }

    fn get_typed<T: DeserializeOwned>(&self, store: &str, key: &str) -> CoreResult<Option<T>> {
        self.guard()?;
        match self.store.get(store, key)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    fn put_typed<T: Serialize>(&self, store: &str, record: &T) -> CoreResult<()> {
        self.guard()?;
        self.store.put(store, serde_json::to_value(record)?)?;
        Ok(())
    }

    fn scan_typed<T: DeserializeOwned>(&self, store: &str) -> CoreResult<Vec<T>> {
        self.guard()?;
        self.store
            .scan(store)?
            .into_iter()
            .map(|value| serde_json::from_value(value).map_err(CoreError::from))
            .collect()
    }

    fn scan_index_typed<T: DeserializeOwned>(
        &self,
        store: &str,
        index: &str,
        key: &str,
    ) -> CoreResult<Vec<T>> {
        self.guard()?;
        self.store
            .scan_index(store, index, key)?
            .into_iter()
            .map(|value| serde_json::from_value(value).map_err(CoreError::from))
            .collect()
    }

    // ----- workspaces -----

    /// Reads a workspace. Returns `None` if absent.
    pub fn get_workspace(&self, id: &str) -> CoreResult<Option<Workspace>> {
        self.get_typed(STORE_WORKSPACES, id)
    }

    /// Lists all workspaces.
    pub fn list_workspaces(&self) -> CoreResult<Vec<Workspace>> {
        self.scan_typed(STORE_WORKSPACES)
    }

    /// Creates or replaces a workspace, keyed by its id.
    pub fn upsert_workspace(&self, workspace: &Workspace) -> CoreResult<()> {
        self.put_typed(STORE_WORKSPACES, workspace)
    }

    /// Deletes a workspace and everything under it: all rows of all its
    /// database pages, then the database records, then the pages, then
    /// the workspace itself, in one atomic batch. Deleting an absent
    /// workspace is a no-op.
    pub fn delete_workspace(&self, id: &str) -> CoreResult<()> {
        self.guard()?;
        if self.store.get(STORE_WORKSPACES, id)?.is_none() {
            return Ok(());
        }

        let pages: Vec<PageSummary> =
            self.scan_index_typed(STORE_PAGES, INDEX_PAGES_BY_WORKSPACE, id)?;
        let database_pages: Vec<&PageSummary> = pages
            .iter()
            .filter(|page| page.page_type == PageType::Database)
            .collect();

        let mut batch = WriteBatch::new();
        for page in &database_pages {
            for row in self.database_rows(&page.id)? {
                batch.delete(STORE_ROWS, row.id);
            }
        }
        for page in &database_pages {
            batch.delete(STORE_DATABASES, page.id.clone());
        }
        for page in &pages {
            batch.delete(STORE_PAGES, page.id.clone());
        }
        batch.delete(STORE_WORKSPACES, id);

        self.store.apply(batch)?;
        Ok(())
    }

    // ----- pages -----

    /// Lists page summaries of a workspace. Content is not decoded.
    pub fn list_pages(&self, workspace_id: &str) -> CoreResult<Vec<PageSummary>> {
        self.scan_index_typed(STORE_PAGES, INDEX_PAGES_BY_WORKSPACE, workspace_id)
    }

    /// Reads a full page including content. Returns `None` if absent.
    pub fn get_page(&self, id: &str) -> CoreResult<Option<Page>> {
        self.get_typed(STORE_PAGES, id)
    }

    /// Creates or replaces a page, keyed by its id.
    pub fn upsert_page(&self, page: &Page) -> CoreResult<()> {
        self.put_typed(STORE_PAGES, page)
    }

    /// Deletes only the page record. Children are not touched; callers
    /// must relocate or delete descendants first.
    pub fn delete_page(&self, id: &str) -> CoreResult<()> {
        self.guard()?;
        self.store.delete(STORE_PAGES, id)?;
        Ok(())
    }

    /// Lists summaries of the direct children of a page.
    pub fn get_child_pages(&self, parent_id: &str) -> CoreResult<Vec<PageSummary>> {
        self.scan_index_typed(STORE_PAGES, INDEX_PAGES_BY_PARENT, parent_id)
    }

    /// Case-insensitive substring search over a workspace's pages,
    /// matching the title or any inline text in the block tree. No
    /// ranking; result order follows store iteration order.
    pub fn search_pages(&self, workspace_id: &str, query: &str) -> CoreResult<Vec<PageSummary>> {
        self.guard()?;
        let needle = query.to_lowercase();
        let mut hits = Vec::new();
        for value in self
            .store
            .scan_index(STORE_PAGES, INDEX_PAGES_BY_WORKSPACE, workspace_id)?
        {
            let page: Page = serde_json::from_value(value)?;
            if page.title.to_lowercase().contains(&needle)
                || page.content.extract_text().to_lowercase().contains(&needle)
            {
                hits.push(PageSummary::from(&page));
            }
        }
        Ok(hits)
    }

    /// All full pages of a workspace, content included. Export needs
    /// whole pages where the public listing wants summaries.
    pub(crate) fn workspace_pages(&self, workspace_id: &str) -> CoreResult<Vec<Page>> {
        self.scan_index_typed(STORE_PAGES, INDEX_PAGES_BY_WORKSPACE, workspace_id)
    }

    // ----- databases -----

    /// Reads a database schema by its page id. Returns `None` if absent.
    pub fn get_database(&self, page_id: &str) -> CoreResult<Option<Database>> {
        self.get_typed(STORE_DATABASES, page_id)
    }

    /// Creates or replaces a database schema, keyed by its page id.
    pub fn upsert_database(&self, database: &Database) -> CoreResult<()> {
        self.put_typed(STORE_DATABASES, database)
    }

    /// Deletes a database and all its rows in one atomic batch. The
    /// owning page is not deleted.
    pub fn delete_database(&self, page_id: &str) -> CoreResult<()> {
        self.guard()?;
        let mut batch = WriteBatch::new();
        for row in self.database_rows(page_id)? {
            batch.delete(STORE_ROWS, row.id);
        }
        batch.delete(STORE_DATABASES, page_id);
        self.store.apply(batch)?;
        Ok(())
    }

    // ----- rows -----

    /// Lists rows of a database joined with their companion page titles.
    /// Costs one extra page lookup per row.
    pub fn list_rows(&self, database_page_id: &str) -> CoreResult<Vec<RowSummary>> {
        let rows = self.database_rows(database_page_id)?;
        let mut summaries = Vec::with_capacity(rows.len());
        for row in rows {
            let title = self
                .get_typed::<PageSummary>(STORE_PAGES, &row.page_id)?
                .map(|page| page.title)
                .unwrap_or_else(|| UNTITLED.to_owned());
            summaries.push(RowSummary {
                id: row.id,
                database_page_id: row.database_page_id,
                page_id: row.page_id,
                title,
                values: row.values,
                created_at: row.created_at,
                updated_at: row.updated_at,
            });
        }
        Ok(summaries)
    }

    /// Reads a row. Returns `None` if absent.
    pub fn get_row(&self, id: &str) -> CoreResult<Option<Row>> {
        self.get_typed(STORE_ROWS, id)
    }

    /// Creates or replaces a row, keyed by its id.
    pub fn upsert_row(&self, row: &Row) -> CoreResult<()> {
        self.put_typed(STORE_ROWS, row)
    }

    /// Deletes only the row record; the companion page stays.
    pub fn delete_row(&self, id: &str) -> CoreResult<()> {
        self.guard()?;
        self.store.delete(STORE_ROWS, id)?;
        Ok(())
    }

    /// All full rows of a database page.
    pub(crate) fn database_rows(&self, database_page_id: &str) -> CoreResult<Vec<Row>> {
        self.scan_index_typed(STORE_ROWS, INDEX_ROWS_BY_DATABASE, database_page_id)
    }

    // ----- settings -----

    /// Reads a settings record. Returns `None` if absent.
    pub fn get_settings(&self, id: &str) -> CoreResult<Option<Settings>> {
        self.get_typed(STORE_SETTINGS, id)
    }

    /// Creates or replaces a settings record.
    pub fn upsert_settings(&self, settings: &Settings) -> CoreResult<()> {
        self.put_typed(STORE_SETTINGS, settings)
    }

    // ----- export -----

    /// Exports a full workspace snapshot. See [`export::export_workspace`].
    pub fn export_workspace(&self, workspace_id: &str) -> CoreResult<export::WorkspaceExport> {
        export::export_workspace(self, workspace_id)
    }

    /// Exports a page, optionally with its descendant subtree. See
    /// [`export::export_page`].
    pub fn export_page(
        &self,
        page_id: &str,
        include_children: bool,
    ) -> CoreResult<export::WorkspaceExport> {
        export::export_page(self, page_id, include_children)
    }

    /// Exports a database page with its rows and their companion pages.
    /// See [`export::export_database`].
    pub fn export_database(&self, database_page_id: &str) -> CoreResult<export::WorkspaceExport> {
        export::export_database(self, database_page_id)
    }

    // ----- maintenance -----

    /// Record counts plus a serialized-size estimate of the four record
    /// collections. Advisory only.
    pub fn get_stats(&self) -> CoreResult<StorageStats> {
        self.guard()?;
        let mut estimated_size_bytes = 0;
        for store in [STORE_WORKSPACES, STORE_PAGES, STORE_DATABASES, STORE_ROWS] {
            for value in self.store.scan(store)? {
                estimated_size_bytes += serde_json::to_string(&value)?.len();
            }
        }
        Ok(StorageStats {
            workspaces: self.store.count(STORE_WORKSPACES)?,
            pages: self.store.count(STORE_PAGES)?,
            databases: self.store.count(STORE_DATABASES)?,
            rows: self.store.count(STORE_ROWS)?,
            estimated_size_bytes,
        })
    }

    /// Wipes all five stores in one atomic batch.
    pub fn clear_all(&self) -> CoreResult<()> {
        self.guard()?;
        let mut batch = WriteBatch::new();
        for store in [
            STORE_WORKSPACES,
            STORE_PAGES,
            STORE_DATABASES,
            STORE_ROWS,
            STORE_SETTINGS,
        ] {
            batch.clear(store);
        }
        self.store.apply(batch)?;
        Ok(())
    }

    // ----- raw access for migrations -----

    /// Returns every raw record of a store. Migration steps use this to
    /// read records whose shape predates the current model types.
    pub fn scan_raw(&self, store: &str) -> CoreResult<Vec<Value>> {
        self.guard()?;
        Ok(self.store.scan(store)?)
    }

    /// Writes a raw record. Counterpart of [`scan_raw`](Self::scan_raw)
    /// for migration steps.
    pub fn put_raw(&self, store: &str, value: Value) -> CoreResult<()> {
        self.guard()?;
        self.store.put(store, value)?;
        Ok(())
    }

    /// Deletes a raw record by key.
    pub fn delete_raw(&self, store: &str, key: &str) -> CoreResult<()> {
        self.guard()?;
        self.store.delete(store, key)?;
        Ok(())
    }

    /// Fails with the id when the given page is missing or not a
    /// database page. Shared by export and the CLI.
    pub(crate) fn require_database_page(&self, page_id: &str) -> CoreResult<Page> {
        let page = self
            .get_page(page_id)?
            .ok_or_else(|| CoreError::not_found(EntityKind::Page, page_id))?;
        if page.page_type != PageType::Database {
            return Err(CoreError::not_a_database(page_id));
        }
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DEFAULT_SETTINGS_ID;
    use potion_store::MemoryStore;

    fn adapter() -> StorageAdapter {
        let adapter = StorageAdapter::new(Arc::new(MemoryStore::new()));
        adapter.init().unwrap();
        adapter
    }

    fn page(id: &str, workspace_id: &str, title: &str, page_type: PageType) -> Page {
        let mut page = Page::create(workspace_id, title, page_type);
        page.id = id.to_owned();
        page
    }

    #[test]
    fn operations_fail_before_init() {
        let adapter = StorageAdapter::new(Arc::new(MemoryStore::new()));
        let result = adapter.list_workspaces();
        assert!(matches!(result, Err(CoreError::NotInitialized)));
    }

    #[test]
    fn operations_fail_after_close_until_reinit() {
        let adapter = adapter();
        adapter.close().unwrap();
        assert!(matches!(
            adapter.list_workspaces(),
            Err(CoreError::NotInitialized)
        ));

        adapter.init().unwrap();
        assert!(adapter.list_workspaces().unwrap().is_empty());
    }

    #[test]
    fn init_is_idempotent() {
        let adapter = adapter();
        let mut workspace = Workspace::create("Home");
        workspace.id = "w1".to_owned();
        adapter.upsert_workspace(&workspace).unwrap();

        adapter.init().unwrap();
        assert_eq!(adapter.list_workspaces().unwrap().len(), 1);
    }

    #[test]
    fn get_missing_entities_returns_none() {
        let adapter = adapter();
        assert!(adapter.get_workspace("x").unwrap().is_none());
        assert!(adapter.get_page("x").unwrap().is_none());
        assert!(adapter.get_database("x").unwrap().is_none());
        assert!(adapter.get_row("x").unwrap().is_none());
        assert!(adapter.get_settings("x").unwrap().is_none());
    }

    #[test]
    fn child_pages_by_parent_index() {
        let adapter = adapter();
        adapter
            .upsert_page(&page("root", "w1", "Root", PageType::Page))
            .unwrap();
        let mut child = page("child", "w1", "Child", PageType::Page);
        child.parent_page_id = Some("root".to_owned());
        adapter.upsert_page(&child).unwrap();

        let children = adapter.get_child_pages("root").unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id, "child");

        // Root pages have no parent index entry.
        assert!(adapter.get_child_pages("child").unwrap().is_empty());
    }

    #[test]
    fn search_matches_title_and_block_text() {
        let adapter = adapter();
        adapter
            .upsert_page(&page("p1", "w1", "Meeting Notes", PageType::Page))
            .unwrap();
        let mut body = page("p2", "w1", "Scratch", PageType::Page);
        body.content = serde_json::from_value(serde_json::json!({
            "blocks": [{"text": [{"text": "Quarterly BUDGET numbers"}]}]
        }))
        .unwrap();
        adapter.upsert_page(&body).unwrap();

        let by_title = adapter.search_pages("w1", "meeting").unwrap();
        assert_eq!(by_title.len(), 1);
        assert_eq!(by_title[0].id, "p1");

        let by_body = adapter.search_pages("w1", "budget").unwrap();
        assert_eq!(by_body.len(), 1);
        assert_eq!(by_body[0].id, "p2");

        assert!(adapter.search_pages("w1", "absent").unwrap().is_empty());
    }

    #[test]
    fn list_rows_joins_companion_titles() {
        let adapter = adapter();
        adapter
            .upsert_page(&page("db", "w1", "Tasks", PageType::Database))
            .unwrap();
        adapter
            .upsert_page(&page("rp1", "w1", "Write report", PageType::Page))
            .unwrap();

        let mut with_page = Row::create("db", "rp1");
        with_page.id = "r1".to_owned();
        adapter.upsert_row(&with_page).unwrap();

        let mut orphan = Row::create("db", "rp-missing");
        orphan.id = "r2".to_owned();
        adapter.upsert_row(&orphan).unwrap();

        let mut rows = adapter.list_rows("db").unwrap();
        rows.sort_by(|a, b| a.id.cmp(&b.id));
        assert_eq!(rows[0].title, "Write report");
        assert_eq!(rows[1].title, "Untitled");
    }

    #[test]
    fn delete_database_cascades_rows_but_not_page() {
        let adapter = adapter();
        adapter
            .upsert_page(&page("db", "w1", "Tasks", PageType::Database))
            .unwrap();
        adapter
            .upsert_database(&Database {
                page_id: "db".to_owned(),
                properties: Vec::new(),
            })
            .unwrap();
        let mut row = Row::create("db", "rp1");
        row.id = "r1".to_owned();
        adapter.upsert_row(&row).unwrap();

        adapter.delete_database("db").unwrap();

        assert!(adapter.get_database("db").unwrap().is_none());
        assert!(adapter.get_row("r1").unwrap().is_none());
        assert!(adapter.get_page("db").unwrap().is_some());
    }

    #[test]
    fn delete_workspace_is_noop_when_absent() {
        let adapter = adapter();
        adapter.delete_workspace("ghost").unwrap();
    }

    #[test]
    fn settings_roundtrip() {
        let adapter = adapter();
        let settings = Settings::default();
        adapter.upsert_settings(&settings).unwrap();

        let loaded = adapter.get_settings(DEFAULT_SETTINGS_ID).unwrap().unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn stats_count_all_collections() {
        let adapter = adapter();
        let mut workspace = Workspace::create("Home");
        workspace.id = "w1".to_owned();
        adapter.upsert_workspace(&workspace).unwrap();
        adapter
            .upsert_page(&page("p1", "w1", "One", PageType::Page))
            .unwrap();

        let stats = adapter.get_stats().unwrap();
        assert_eq!(stats.workspaces, 1);
        assert_eq!(stats.pages, 1);
        assert_eq!(stats.databases, 0);
        assert_eq!(stats.rows, 0);
        assert!(stats.estimated_size_bytes > 0);
    }

    #[test]
    fn clear_all_wipes_every_store() {
        let adapter = adapter();
        let mut workspace = Workspace::create("Home");
        workspace.id = "w1".to_owned();
        adapter.upsert_workspace(&workspace).unwrap();
        adapter
            .upsert_page(&page("p1", "w1", "One", PageType::Page))
            .unwrap();
        adapter.upsert_settings(&Settings::default()).unwrap();

        adapter.clear_all().unwrap();

        let stats = adapter.get_stats().unwrap();
        assert_eq!(stats.workspaces + stats.pages + stats.databases + stats.rows, 0);
        assert!(adapter.get_settings(DEFAULT_SETTINGS_ID).unwrap().is_none());
    }
}
