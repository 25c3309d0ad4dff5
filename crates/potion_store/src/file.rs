//! File-backed record store for persistent storage.

use crate::error::{StoreError, StoreResult};
use crate::store::{RecordStore, StoreSpec, WriteBatch};
use crate::tables::{Table, Tables};
use fs2::FileExt;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const IMAGE_FILE: &str = "potion.json";
const IMAGE_TMP_FILE: &str = "potion.json.tmp";
const LOCK_FILE: &str = "LOCK";

/// A file-backed record store.
///
/// The whole store is held in memory and persisted as a single JSON image
/// file inside the store directory. Every mutation rewrites the image via
/// a temp file and an atomic rename, so a crash leaves either the previous
/// image or the new one, never a torn file. Secondary indexes are rebuilt
/// at open and never persisted.
///
/// An exclusive lock file guards the directory against a second process.
///
/// # Example
///
/// ```no_run
/// use potion_store::{FileStore, RecordStore, StoreSpec};
/// use std::path::Path;
///
/// let store = FileStore::open(Path::new("potion-data")).unwrap();
/// store.ensure_schema(&[StoreSpec::new("items", "id")]).unwrap();
/// ```
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    /// Held for the lifetime of the store; releasing it unlocks the dir.
    _lock: File,
    tables: RwLock<Tables>,
}

#[derive(Serialize, Deserialize)]
struct StoreImage {
    stores: Vec<StoreImageEntry>,
    side: BTreeMap<String, String>,
}

#[derive(Serialize, Deserialize)]
struct StoreImageEntry {
    spec: StoreSpec,
    records: Vec<Value>,
}

impl StoreImage {
    fn from_tables(tables: &Tables) -> Self {
        Self {
            stores: tables
                .stores
                .values()
                .map(|table| StoreImageEntry {
                    spec: table.spec.clone(),
                    records: table.records.values().cloned().collect(),
                })
                .collect(),
            side: tables.side.clone(),
        }
    }

    fn into_tables(self) -> StoreResult<Tables> {
        let mut tables = Tables::default();
        for entry in self.stores {
            let name = entry.spec.name.clone();
            let mut table = Table::new(entry.spec);
            for record in entry.records {
                table.insert(record).map_err(|err| {
                    StoreError::invalid_image(format!("store {name}: {err}"))
                })?;
            }
            tables.stores.insert(name, table);
        }
        tables.side = self.side;
        Ok(tables)
    }
}

impl FileStore {
    /// Opens or creates a store in the given directory.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Locked`] if another process holds the store,
    /// and [`StoreError::InvalidImage`] if the persisted image cannot be
    /// interpreted.
    pub fn open(dir: &Path) -> StoreResult<Self> {
        fs::create_dir_all(dir)?;

        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(dir.join(LOCK_FILE))?;
        lock.try_lock_exclusive().map_err(|_| StoreError::Locked)?;

        let image_path = dir.join(IMAGE_FILE);
        let tables = if image_path.exists() {
            let data = fs::read_to_string(&image_path)?;
            let image: StoreImage = serde_json::from_str(&data)
                .map_err(|err| StoreError::invalid_image(err.to_string()))?;
            image.into_tables()?
        } else {
            Tables::default()
        };

        Ok(Self {
            dir: dir.to_path_buf(),
            _lock: lock,
            tables: RwLock::new(tables),
        })
    }

    /// Returns the store directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn persist(&self, tables: &Tables) -> StoreResult<()> {
        let data = serde_json::to_string(&StoreImage::from_tables(tables))?;
        let tmp = self.dir.join(IMAGE_TMP_FILE);
        let mut file = File::create(&tmp)?;
        file.write_all(data.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp, self.dir.join(IMAGE_FILE))?;
        Ok(())
    }

    /// Runs a mutation against a copy of the tables, persists the copy,
    /// and only then makes it visible. A failed persist leaves both the
    /// in-memory state and the image untouched.
    fn mutate<F>(&self, mutation: F) -> StoreResult<()>
    where
        F: FnOnce(&mut Tables) -> StoreResult<()>,
    {
        let mut guard = self.tables.write();
        let mut next = guard.clone();
        mutation(&mut next)?;
        self.persist(&next)?;
        *guard = next;
        Ok(())
    }
}

impl RecordStore for FileStore {
    fn ensure_schema(&self, specs: &[StoreSpec]) -> StoreResult<()> {
        self.mutate(|tables| tables.ensure_schema(specs))
    }

    fn get(&self, store: &str, key: &str) -> StoreResult<Option<Value>> {
        self.tables.read().get(store, key)
    }

    fn put(&self, store: &str, value: Value) -> StoreResult<()> {
        self.mutate(|tables| tables.put(store, value))
    }

    fn delete(&self, store: &str, key: &str) -> StoreResult<()> {
        self.mutate(|tables| tables.delete(store, key))
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
        self.mutate(|tables| tables.apply(&batch))
    }

    fn side_get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.tables.read().side.get(key).cloned())
    }

    fn side_put(&self, key: &str, value: &str) -> StoreResult<()> {
        self.mutate(|tables| {
            tables.side.insert(key.to_owned(), value.to_owned());
            Ok(())
        })
    }

    fn side_delete(&self, key: &str) -> StoreResult<()> {
        self.mutate(|tables| {
            tables.side.remove(key);
            Ok(())
        })
    }

    fn side_keys(&self) -> StoreResult<Vec<String>> {
        Ok(self.tables.read().side.keys().cloned().collect())
    }

    fn flush(&self) -> StoreResult<()> {
        let guard = self.tables.read();
        self.persist(&guard)
    }
}
