//! Record store trait definition and schema/batch types.

use crate::error::StoreResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declaration of a single record store.
///
/// The primary key is extracted from each record at the declared
/// `key_path` (a top-level field name) and must be a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSpec {
    /// Store name.
    pub name: String,
    /// Field holding the primary key.
    pub key_path: String,
    /// Secondary indexes on this store.
    pub indexes: Vec<IndexSpec>,
}

impl StoreSpec {
    /// Creates a spec with no secondary indexes.
    #[must_use]
    pub fn new(name: impl Into<String>, key_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_path: key_path.into(),
            indexes: Vec::new(),
        }
    }

    /// Adds a secondary index to the spec.
    #[must_use]
    pub fn with_index(mut self, name: impl Into<String>, key_path: impl Into<String>) -> Self {
        self.indexes.push(IndexSpec {
            name: name.into(),
            key_path: key_path.into(),
        });
        self
    }
}

/// Declaration of a secondary index.
///
/// Records whose field at `key_path` is absent or not a string are simply
/// not indexed under this index. This is how nullable fields (e.g. a null
/// parent reference) behave: they exist in the store but have no index
/// entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Index name, unique within the store.
    pub name: String,
    /// Field holding the index key.
    pub key_path: String,
}

/// A single operation inside a [`WriteBatch`].
#[derive(Debug, Clone)]
pub enum BatchOp {
    /// Insert or replace a record (key extracted from the record).
    Put {
        /// Target store.
        store: String,
        /// The record value.
        value: Value,
    },
    /// Delete a record by key. Deleting an absent key is a no-op.
    Delete {
        /// Target store.
        store: String,
        /// Primary key.
        key: String,
    },
    /// Remove every record from a store.
    Clear {
        /// Target store.
        store: String,
    },
}

/// An ordered set of writes applied atomically across stores.
///
/// Either every operation in the batch is applied, or none is. Ops are
/// applied in insertion order, so cascades can be expressed as
/// deepest-dependents-first sequences.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    /// The operations, in application order.
    pub ops: Vec<BatchOp>,
}

impl WriteBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a put.
    pub fn put(&mut self, store: impl Into<String>, value: Value) {
        self.ops.push(BatchOp::Put {
            store: store.into(),
            value,
        });
    }

    /// Queues a delete.
    pub fn delete(&mut self, store: impl Into<String>, key: impl Into<String>) {
        self.ops.push(BatchOp::Delete {
            store: store.into(),
            key: key.into(),
        });
    }

    /// Queues a store wipe.
    pub fn clear(&mut self, store: impl Into<String>) {
        self.ops.push(BatchOp::Clear {
            store: store.into(),
        });
    }

    /// Returns true if the batch holds no operations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Number of queued operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }
}

/// A keyed, indexed local persistence substrate.
///
/// Implementations hold named record stores (JSON values keyed by a string
/// extracted from each record) with declared secondary indexes, plus a flat
/// side-channel string log used for out-of-band data such as backup
/// snapshots and the migration ledger.
///
/// # Invariants
///
/// - `ensure_schema` is idempotent; existing stores keep their records
/// - `put` replaces any record with the same primary key
/// - `apply` is atomic: a failing batch leaves the store untouched
/// - Iteration order of `scan`/`scan_index` is deterministic per backend
///   but not specified across backends
///
/// # Implementors
///
/// - [`crate::MemoryStore`] - for tests and ephemeral data
/// - [`crate::FileStore`] - for persistent storage
pub trait RecordStore: Send + Sync {
    /// Creates missing stores and indexes. Never drops data.
    fn ensure_schema(&self, specs: &[StoreSpec]) -> StoreResult<()>;

    /// Reads a record by primary key. Returns `None` if absent.
    fn get(&self, store: &str, key: &str) -> StoreResult<Option<Value>>;

    /// Inserts or replaces a record; the key is extracted from the record
    /// at the store's declared key path.
    fn put(&self, store: &str, value: Value) -> StoreResult<()>;

    /// Deletes a record by primary key. Deleting an absent key is a no-op.
    fn delete(&self, store: &str, key: &str) -> StoreResult<()>;

    /// Returns every record in the store.
    fn scan(&self, store: &str) -> StoreResult<Vec<Value>>;

    /// Returns every record whose index key equals `key`.
    fn scan_index(&self, store: &str, index: &str, key: &str) -> StoreResult<Vec<Value>>;

    /// Number of records in the store.
    fn count(&self, store: &str) -> StoreResult<usize>;

    /// Applies a batch of writes atomically across stores.
    fn apply(&self, batch: WriteBatch) -> StoreResult<()>;

    /// Reads a side-channel entry.
    fn side_get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Writes a side-channel entry.
    fn side_put(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Deletes a side-channel entry. Absent keys are a no-op.
    fn side_delete(&self, key: &str) -> StoreResult<()>;

    /// Lists all side-channel keys.
    fn side_keys(&self) -> StoreResult<Vec<String>>;

    /// Durability barrier. After this returns, all previous writes are
    /// as durable as the backend can make them.
    fn flush(&self) -> StoreResult<()>;
}
