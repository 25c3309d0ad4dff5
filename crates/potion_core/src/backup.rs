//! Export-based backup snapshots.
//!
//! Backups live in the side-channel string log, not in the record
//! stores, because the substrate may not support atomic whole-database
//! snapshots. They are best-effort and non-transactional: a snapshot is
//! a JSON bundle of per-workspace exports written under a prefixed key,
//! and a failure to write one must never block a migration.

use crate::adapter::StorageAdapter;
use crate::error::{CoreError, CoreResult, EntityKind};
use crate::export::{self, WorkspaceExport};
use crate::model::Timestamp;
use chrono::{TimeZone, Utc};
use potion_store::RecordStore;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Prefix of every backup key in the side channel.
pub const BACKUP_KEY_PREFIX: &str = "potion-backup-";

/// How many snapshots `prune_backups` keeps by default.
pub const DEFAULT_BACKUP_KEEP: usize = 3;

/// One snapshot: every workspace exported at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupSnapshot {
    /// Schema version the store was at when the snapshot was taken.
    pub version: u32,
    /// When the snapshot was taken.
    pub created_at: Timestamp,
    /// One export document per workspace.
    pub workspaces: Vec<WorkspaceExport>,
}

/// Listing entry for a stored snapshot, parsed from its key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupInfo {
    /// Full side-channel key.
    pub key: String,
    /// Schema version encoded in the key.
    pub version: u32,
    /// Creation time encoded in the key.
    pub created_at: Timestamp,
}

/// Exports every workspace and writes the bundle to the side channel
/// under `potion-backup-v{version}-{timestamp_millis}`. Returns the key.
pub fn create_backup(adapter: &StorageAdapter, version: u32) -> CoreResult<String> {
    let workspaces = adapter.list_workspaces()?;
    let mut exports = Vec::with_capacity(workspaces.len());
    for workspace in &workspaces {
        exports.push(export::export_workspace(adapter, &workspace.id)?);
    }

    let created_at = Utc::now();
    let snapshot = BackupSnapshot {
        version,
        created_at,
        workspaces: exports,
    };
    let key = format!(
        "{BACKUP_KEY_PREFIX}v{version}-{}",
        created_at.timestamp_millis()
    );
    adapter
        .record_store()?
        .side_put(&key, &serde_json::to_string(&snapshot)?)?;
    info!(%key, workspaces = snapshot.workspaces.len(), "backup written");
    Ok(key)
}

/// Parses `potion-backup-v{version}-{millis}` back into its parts.
fn parse_key(key: &str) -> Option<(u32, Timestamp)> {
    let rest = key.strip_prefix(BACKUP_KEY_PREFIX)?.strip_prefix('v')?;
    let (version, millis) = rest.split_once('-')?;
    let version: u32 = version.parse().ok()?;
    let millis: i64 = millis.parse().ok()?;
    let created_at = Utc.timestamp_millis_opt(millis).single()?;
    Some((version, created_at))
}

/// Lists stored snapshots, newest first (version descending, then
/// creation time descending). Keys under the prefix that fail to parse
/// are skipped.
pub fn list_backups(store: &dyn RecordStore) -> CoreResult<Vec<BackupInfo>> {
    let mut infos = Vec::new();
    for key in store.side_keys()? {
        if !key.starts_with(BACKUP_KEY_PREFIX) {
            continue;
        }
        match parse_key(&key) {
            Some((version, created_at)) => infos.push(BackupInfo {
                key,
                version,
                created_at,
            }),
            None => debug!(%key, "skipping unparsable backup key"),
        }
    }
    infos.sort_by(|a, b| {
        b.version
            .cmp(&a.version)
            .then(b.created_at.cmp(&a.created_at))
    });
    Ok(infos)
}

/// Deletes all but the `keep` most recent snapshots. Returns the deleted
/// keys.
pub fn prune_backups(store: &dyn RecordStore, keep: usize) -> CoreResult<Vec<String>> {
    let mut deleted = Vec::new();
    for info in list_backups(store)?.into_iter().skip(keep) {
        store.side_delete(&info.key)?;
        deleted.push(info.key);
    }
    if !deleted.is_empty() {
        info!(count = deleted.len(), "pruned old backups");
    }
    Ok(deleted)
}

/// Reads a snapshot back out of the side channel, for manual recovery.
pub fn read_backup(store: &dyn RecordStore, key: &str) -> CoreResult<BackupSnapshot> {
    let raw = store
        .side_get(key)?
        .ok_or_else(|| CoreError::not_found(EntityKind::Backup, key))?;
    Ok(serde_json::from_str(&raw)?)
}
