//! CLI command implementations.

pub mod backup;
pub mod export;
pub mod import;
pub mod inspect;
pub mod migrate;

use potion_core::{builtin_runner, Storage, StorageAdapter};
use potion_store::FileStore;
use std::path::Path;
use std::sync::Arc;

/// Opens the file store, initializes the adapter, and applies pending
/// migrations. Every read/write command goes through this.
pub fn open_storage(
    path: &Path,
) -> Result<(Arc<StorageAdapter>, Arc<FileStore>), Box<dyn std::error::Error>> {
    let store = Arc::new(FileStore::open(path)?);
    let storage = Storage::new(store.clone(), builtin_runner()?);
    let adapter = storage.adapter()?;
    Ok((adapter, store))
}
