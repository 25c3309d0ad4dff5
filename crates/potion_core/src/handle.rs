//! Process-wide storage handle with single-flight initialization.
//!
//! Constructed once at startup and passed to every consumer. The first
//! caller of [`Storage::adapter`] runs `init` plus pending migrations;
//! concurrent first callers block on the same in-flight initialization
//! instead of racing to run migrations twice.

use crate::adapter::StorageAdapter;
use crate::error::CoreResult;
use crate::migration::MigrationRunner;
use parking_lot::Mutex;
use potion_store::RecordStore;
use std::sync::Arc;
use tracing::warn;

/// The application's storage context.
pub struct Storage {
    adapter: Arc<StorageAdapter>,
    runner: MigrationRunner,
    /// True once init and the migration run completed.
    ready: Mutex<bool>,
}

impl Storage {
    /// Creates the handle. No I/O happens until the first
    /// [`adapter`](Storage::adapter) call.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, runner: MigrationRunner) -> Self {
        Self {
            adapter: Arc::new(StorageAdapter::new(store)),
            runner,
            ready: Mutex::new(false),
        }
    }

    /// Returns the initialized adapter, initializing on first call.
    ///
    /// Initialization runs `init` and applies pending migrations while
    /// holding the guard, so concurrent callers wait for the one
    /// in-flight attempt and then share its outcome. A failed migration
    /// run does not fail this call: the adapter keeps serving the last
    /// successfully migrated schema version. A failed `init` leaves the
    /// handle un-initialized, so a later call retries.
    pub fn adapter(&self) -> CoreResult<Arc<StorageAdapter>> {
        let mut ready = self.ready.lock();
        if !*ready {
            self.adapter.init()?;
            let report = self.runner.run(&self.adapter)?;
            if !report.success {
                warn!(
                    current_version = report.current_version,
                    "migration run failed; continuing on last migrated schema"
                );
            }
            *ready = true;
        }
        Ok(Arc::clone(&self.adapter))
    }

    /// Closes the adapter if it was initialized. The next
    /// [`adapter`](Storage::adapter) call re-initializes.
    pub fn close(&self) -> CoreResult<()> {
        let mut ready = self.ready.lock();
        if *ready {
            self.adapter.close()?;
            *ready = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::{Migration, MigrationState};
    use potion_store::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static COUNTER_SLOT: AtomicUsize = AtomicUsize::new(0);

    struct CountingMigration;

    impl Migration for CountingMigration {
        fn version(&self) -> u32 {
            1
        }

        fn name(&self) -> &str {
            "counting"
        }

        fn up(&self, _adapter: &StorageAdapter) -> CoreResult<()> {
            COUNTER_SLOT.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn concurrent_first_callers_share_one_initialization() {
        COUNTER_SLOT.store(0, Ordering::SeqCst);

        let mut runner = MigrationRunner::new();
        runner.register(Box::new(CountingMigration)).unwrap();
        let storage = Arc::new(Storage::new(Arc::new(MemoryStore::new()), runner));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let storage = Arc::clone(&storage);
                std::thread::spawn(move || storage.adapter().unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(COUNTER_SLOT.load(Ordering::SeqCst), 1);

        let adapter = storage.adapter().unwrap();
        let state = MigrationState::load(adapter.record_store().unwrap()).unwrap();
        assert_eq!(state.current_version, 1);
    }

    #[test]
    fn close_and_reopen() {
        let storage = Storage::new(Arc::new(MemoryStore::new()), MigrationRunner::new());
        let adapter = storage.adapter().unwrap();
        assert!(adapter.list_workspaces().unwrap().is_empty());

        storage.close().unwrap();
        assert!(adapter.list_workspaces().is_err());

        let adapter = storage.adapter().unwrap();
        assert!(adapter.list_workspaces().unwrap().is_empty());
    }
}
