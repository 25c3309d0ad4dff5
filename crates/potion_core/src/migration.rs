//! Schema migration engine.
//!
//! Migrations are registered once per version, kept sorted, and applied
//! strictly in ascending order. The persisted ledger is rewritten after
//! every attempt, so a crash mid-run resumes from the last completed
//! version. A failing step stops the run (fail-stop); nothing is rolled
//! back automatically. Destructive steps are preceded by a best-effort
//! backup instead.

use crate::adapter::StorageAdapter;
use crate::backup;
use crate::error::{CoreError, CoreResult};
use crate::model::Timestamp;
use chrono::Utc;
use potion_store::RecordStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Bound;
use tracing::{info, warn};

/// Fixed side-channel key of the persisted ledger.
pub const MIGRATION_STATE_KEY: &str = "potion-migration-state";

/// A single versioned schema/data migration.
///
/// `up` must be written so that re-running it after a partial failure is
/// safe up to the failure point; the engine only guarantees that a
/// *successful* migration is never re-applied.
pub trait Migration: Send + Sync {
    /// Unique positive version. Determines ordering.
    fn version(&self) -> u32;

    /// Short kebab-case name.
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str {
        ""
    }

    /// Destructive migrations get a backup snapshot before running.
    fn destructive(&self) -> bool {
        false
    }

    /// Applies the migration.
    fn up(&self, adapter: &StorageAdapter) -> CoreResult<()>;

    /// Reverses the migration. Never invoked by the engine; a human
    /// operator may call it after inspecting a failed ledger and the
    /// associated backup. Optional.
    fn down(&self, _adapter: &StorageAdapter) -> CoreResult<()> {
        Err(CoreError::migration_failed(format!(
            "migration v{} has no down step",
            self.version()
        )))
    }
}

/// Ledger entry for one migration attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationRecord {
    /// Migration version.
    pub version: u32,
    /// Migration name.
    pub name: String,
    /// When the attempt finished.
    pub applied_at: Timestamp,
    /// Whether the attempt succeeded.
    pub success: bool,
    /// Error message of a failed attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Key of the pre-migration backup, when one was taken.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_key: Option<String>,
}

/// The persisted migration ledger. `current_version` is monotonic and
/// only advances on success; history is append-only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationState {
    /// Highest successfully applied version.
    pub current_version: u32,
    /// Every attempt, success or failure, in order.
    #[serde(default)]
    pub history: Vec<MigrationRecord>,
    /// Time of the most recent attempt.
    #[serde(default)]
    pub last_migration_at: Option<Timestamp>,
}

impl MigrationState {
    /// Loads the ledger from the side channel, or a fresh one if absent.
    pub fn load(store: &dyn RecordStore) -> CoreResult<Self> {
        match store.side_get(MIGRATION_STATE_KEY)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Self::default()),
        }
    }

    /// Persists the ledger to the side channel.
    pub fn save(&self, store: &dyn RecordStore) -> CoreResult<()> {
        store.side_put(MIGRATION_STATE_KEY, &serde_json::to_string(self)?)?;
        Ok(())
    }
}

/// Descriptive listing entry for a registered migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationInfo {
    /// Migration version.
    pub version: u32,
    /// Migration name.
    pub name: String,
    /// Migration description.
    pub description: String,
    /// Whether the migration is destructive.
    pub destructive: bool,
}

/// Outcome of one `run` invocation.
#[derive(Debug, Clone)]
pub struct MigrationReport {
    /// False when a migration failed and the run stopped early.
    pub success: bool,
    /// Ledger records appended by this run.
    pub applied: Vec<MigrationRecord>,
    /// Ledger version after the run.
    pub current_version: u32,
}

/// Registry and runner of migrations.
pub struct MigrationRunner {
    /// Registered migrations, keyed (and therefore sorted) by version.
    migrations: BTreeMap<u32, Box<dyn Migration>>,
}

impl MigrationRunner {
    /// Creates an empty runner.
    #[must_use]
    pub fn new() -> Self {
        Self {
            migrations: BTreeMap::new(),
        }
    }

    /// Registers a migration.
    ///
    /// Fails fast if the version is already registered.
    pub fn register(&mut self, migration: Box<dyn Migration>) -> CoreResult<()> {
        let version = migration.version();
        if self.migrations.contains_key(&version) {
            return Err(CoreError::migration_failed(format!(
                "migration version {version} already registered"
            )));
        }
        self.migrations.insert(version, migration);
        Ok(())
    }

    /// Lists registered migrations in ascending version order.
    #[must_use]
    pub fn list(&self) -> Vec<MigrationInfo> {
        self.migrations
            .values()
            .map(|m| MigrationInfo {
                version: m.version(),
                name: m.name().to_owned(),
                description: m.description().to_owned(),
                destructive: m.destructive(),
            })
            .collect()
    }

    /// Registered migrations with `version > current_version`, ascending.
    #[must_use]
    pub fn pending(&self, current_version: u32) -> Vec<&dyn Migration> {
        self.migrations
            .range((Bound::Excluded(current_version), Bound::Unbounded))
            .map(|(_, m)| m.as_ref())
            .collect()
    }

    /// Highest registered version, or 0 with an empty registry.
    #[must_use]
    pub fn target_version(&self) -> u32 {
        self.migrations.keys().next_back().copied().unwrap_or(0)
    }

    /// Whether any registered migration is newer than `current_version`.
    #[must_use]
    pub fn needs_migrations(&self, current_version: u32) -> bool {
        current_version < self.target_version()
    }

    /// Applies all pending migrations in ascending order.
    ///
    /// Destructive migrations are preceded by a backup snapshot tagged
    /// with the pre-migration version; backup failures are logged and
    /// skipped, never fatal. The ledger is persisted after every attempt.
    /// The first failure stops the run. After a fully successful run,
    /// old backups are pruned to the most recent
    /// [`backup::DEFAULT_BACKUP_KEEP`].
    pub fn run(&self, adapter: &StorageAdapter) -> CoreResult<MigrationReport> {
        let store = adapter.record_store()?;
        let mut state = MigrationState::load(store)?;
        let pending = self.pending(state.current_version);

        if pending.is_empty() {
            return Ok(MigrationReport {
                success: true,
                applied: Vec::new(),
                current_version: state.current_version,
            });
        }

        info!(
            from = state.current_version,
            to = self.target_version(),
            count = pending.len(),
            "applying pending migrations"
        );

        let mut applied = Vec::new();
        let mut success = true;

        for migration in pending {
            let backup_key = if migration.destructive() {
                match backup::create_backup(adapter, state.current_version) {
                    Ok(key) => Some(key),
                    Err(err) => {
                        warn!(
                            version = migration.version(),
                            error = %err,
                            "pre-migration backup skipped"
                        );
                        None
                    }
                }
            } else {
                None
            };

            let record = match migration.up(adapter) {
                Ok(()) => {
                    info!(version = migration.version(), name = migration.name(), "migration applied");
                    state.current_version = migration.version();
                    MigrationRecord {
                        version: migration.version(),
                        name: migration.name().to_owned(),
                        applied_at: Utc::now(),
                        success: true,
                        error: None,
                        backup_key,
                    }
                }
                Err(err) => {
                    warn!(
                        version = migration.version(),
                        name = migration.name(),
                        error = %err,
                        "migration failed, stopping run"
                    );
                    success = false;
                    MigrationRecord {
                        version: migration.version(),
                        name: migration.name().to_owned(),
                        applied_at: Utc::now(),
                        success: false,
                        error: Some(err.to_string()),
                        backup_key,
                    }
                }
            };

            state.last_migration_at = Some(record.applied_at);
            state.history.push(record.clone());
            state.save(store)?;
            applied.push(record);

            if !success {
                break;
            }
        }

        if success {
            if let Err(err) = backup::prune_backups(store, backup::DEFAULT_BACKUP_KEEP) {
                warn!(error = %err, "backup prune failed");
            }
        }

        Ok(MigrationReport {
            success,
            applied,
            current_version: state.current_version,
        })
    }
}

impl Default for MigrationRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use potion_store::MemoryStore;
    use std::sync::Arc;

    struct TestMigration {
        version: u32,
        name: String,
        should_fail: bool,
    }

    impl Migration for TestMigration {
        fn version(&self) -> u32 {
            self.version
        }

        fn name(&self) -> &str {
            &self.name
        }

        fn up(&self, adapter: &StorageAdapter) -> CoreResult<()> {
            if self.should_fail {
                return Err(CoreError::migration_failed("intentional failure"));
            }
            // Leave a visible trace so tests can assert side effects.
            adapter
                .record_store()?
                .side_put(&format!("ran-{}", self.version), "1")?;
            Ok(())
        }
    }

    fn make(version: u32, name: &str) -> Box<dyn Migration> {
        Box::new(TestMigration {
            version,
            name: name.to_owned(),
            should_fail: false,
        })
    }

    fn make_failing(version: u32, name: &str) -> Box<dyn Migration> {
        Box::new(TestMigration {
            version,
            name: name.to_owned(),
            should_fail: true,
        })
    }

    fn adapter() -> StorageAdapter {
        let adapter = StorageAdapter::new(Arc::new(MemoryStore::new()));
        adapter.init().unwrap();
        adapter
    }

    #[test]
    fn duplicate_version_rejected_at_registration() {
        let mut runner = MigrationRunner::new();
        runner.register(make(1, "first")).unwrap();
        assert!(runner.register(make(1, "duplicate")).is_err());
    }

    #[test]
    fn pending_respects_current_version() {
        let mut runner = MigrationRunner::new();
        runner.register(make(1, "first")).unwrap();
        runner.register(make(2, "second")).unwrap();

        assert_eq!(runner.pending(0).len(), 2);
        let pending = runner.pending(1);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].version(), 2);
        assert!(runner.pending(2).is_empty());
    }

    #[test]
    fn target_version_of_empty_registry_is_zero() {
        let runner = MigrationRunner::new();
        assert_eq!(runner.target_version(), 0);
        assert!(!runner.needs_migrations(0));
    }

    #[test]
    fn run_applies_all_and_persists_ledger() {
        let mut runner = MigrationRunner::new();
        runner.register(make(1, "first")).unwrap();
        runner.register(make(2, "second")).unwrap();

        let adapter = adapter();
        let report = runner.run(&adapter).unwrap();

        assert!(report.success);
        assert_eq!(report.current_version, 2);
        assert_eq!(report.applied.len(), 2);

        let state = MigrationState::load(adapter.record_store().unwrap()).unwrap();
        assert_eq!(state.current_version, 2);
        assert_eq!(state.history.len(), 2);
        assert!(state.history.iter().all(|r| r.success));
        assert!(state.last_migration_at.is_some());
    }

    #[test]
    fn run_with_no_pending_is_a_successful_noop() {
        let runner = MigrationRunner::new();
        let adapter = adapter();

        let report = runner.run(&adapter).unwrap();
        assert!(report.success);
        assert!(report.applied.is_empty());
        assert_eq!(report.current_version, 0);
    }

    #[test]
    fn failure_stops_run_and_keeps_version() {
        let mut runner = MigrationRunner::new();
        runner.register(make(1, "first")).unwrap();
        runner.register(make_failing(2, "failing")).unwrap();
        runner.register(make(3, "third")).unwrap();

        let adapter = adapter();
        let report = runner.run(&adapter).unwrap();

        assert!(!report.success);
        assert_eq!(report.current_version, 1);
        assert_eq!(report.applied.len(), 2);
        assert!(!report.applied[1].success);

        let store = adapter.record_store().unwrap();
        // The third migration never executed.
        assert!(store.side_get("ran-3").unwrap().is_none());

        let state = MigrationState::load(store).unwrap();
        assert_eq!(state.current_version, 1);
        assert_eq!(state.history.len(), 2);
        assert_eq!(
            state.history[1].error.as_deref(),
            Some("migration failed: intentional failure")
        );
    }

    #[test]
    fn rerun_resumes_after_failure_was_fixed() {
        let adapter = adapter();

        let mut broken = MigrationRunner::new();
        broken.register(make(1, "first")).unwrap();
        broken.register(make_failing(2, "second")).unwrap();
        assert!(!broken.run(&adapter).unwrap().success);

        let mut fixed = MigrationRunner::new();
        fixed.register(make(1, "first")).unwrap();
        fixed.register(make(2, "second")).unwrap();
        let report = fixed.run(&adapter).unwrap();

        assert!(report.success);
        // v1 was not reapplied; only v2 ran this time.
        assert_eq!(report.applied.len(), 1);
        assert_eq!(report.applied[0].version, 2);
        assert_eq!(report.current_version, 2);
    }

    #[test]
    fn successful_migration_never_reapplied() {
        let adapter = adapter();
        let mut runner = MigrationRunner::new();
        runner.register(make(1, "first")).unwrap();

        assert_eq!(runner.run(&adapter).unwrap().applied.len(), 1);
        assert!(runner.run(&adapter).unwrap().applied.is_empty());

        let state = MigrationState::load(adapter.record_store().unwrap()).unwrap();
        assert_eq!(state.history.len(), 1);
    }
}
