//! In-memory record store for testing and ephemeral use.

use crate::error::StoreResult;
use crate::store::{RecordStore, StoreSpec, WriteBatch};
use crate::tables::Tables;
use parking_lot::RwLock;
use serde_json::Value;

/// An in-memory record store.
///
/// This backend keeps all stores, indexes, and the side channel in memory
/// and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral workspaces that don't need persistence
///
/// # Thread Safety
///
/// The store is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use potion_store::{MemoryStore, RecordStore, StoreSpec};
/// use serde_json::json;
///
/// let store = MemoryStore::new();
/// store.ensure_schema(&[StoreSpec::new("items", "id")]).unwrap();
/// store.put("items", json!({"id": "a"})).unwrap();
/// assert_eq!(store.count("items").unwrap(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryStore {
    fn ensure_schema(&self, specs: &[StoreSpec]) -> StoreResult<()> {
        self.tables.write().ensure_schema(specs)
    }

    fn get(&self, store: &str, key: &str) -> StoreResult<Option<Value>> {
        self.tables.read().get(store, key)
    }

    fn put(&self, store: &str, value: Value) -> StoreResult<()> {
        self.tables.write().put(store, value)
    }

    fn delete(&self, store: &str, key: &str) -> StoreResult<()> {
        self.tables.write().delete(store, key)
    }

    fn scan(&self, store: &str) -> StoreResult<Vec<Value>> {
        self.tables.read().scan(store)
    }

    fn scan_index(&self, store: &str, index: &str, key: &str) -> StoreResult<Vec<Value>> {
        self.tables.read().scan_index(store, index, key)
    }

    fn count(&self, store: &str) -> StoreResult<usize> {
        self.tables.read().count(store)
    }

    fn apply(&self, batch: WriteBatch) -> StoreResult<()> {
        self.tables.write().apply(&batch)
    }

    fn side_get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.tables.read().side.get(key).cloned())
    }

    fn side_put(&self, key: &str, value: &str) -> StoreResult<()> {
        self.tables.write().side.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn side_delete(&self, key: &str) -> StoreResult<()> {
        self.tables.write().side.remove(key);
        Ok(())
    }

    fn side_keys(&self) -> StoreResult<Vec<String>> {
        Ok(self.tables.read().side.keys().cloned().collect())
    }

    fn flush(&self) -> StoreResult<()> {
        // Nothing to persist
        Ok(())
    }
}
