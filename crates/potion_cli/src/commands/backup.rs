//! Backup commands.

use potion_core::{self as core, MigrationState};
use std::path::Path;
use tracing::info;

/// Snapshot every workspace into the side channel.
pub fn create(store_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    info!("Creating backup of {:?}", store_path);

    let (adapter, store) = super::open_storage(store_path)?;
    let state = MigrationState::load(store.as_ref())?;

    let key = core::create_backup(&adapter, state.current_version)?;
    let snapshot = core::read_backup(store.as_ref(), &key)?;

    println!("✓ Backup created successfully");
    println!("  Key: {key}");
    println!("  Schema version: {}", snapshot.version);
    println!("  Workspaces: {}", snapshot.workspaces.len());
    println!("  Created: {}", snapshot.created_at.to_rfc3339());

    Ok(())
}

/// List stored snapshots, newest first.
pub fn list(store_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    info!("Listing backups in {:?}", store_path);

    let (_, store) = super::open_storage(store_path)?;
    let backups = core::list_backups(store.as_ref())?;

    println!("Backups");
    println!("=======");

    if backups.is_empty() {
        println!("  No backups stored.");
        return Ok(());
    }

    for info in &backups {
        println!(
            "  v{} - {} ({})",
            info.version,
            info.created_at.to_rfc3339(),
            info.key
        );
    }

    Ok(())
}

/// Delete all but the most recent snapshots.
pub fn prune(store_path: &Path, keep: usize) -> Result<(), Box<dyn std::error::Error>> {
    info!("Pruning backups in {:?}, keeping {}", store_path, keep);

    let (_, store) = super::open_storage(store_path)?;
    let deleted = core::prune_backups(store.as_ref(), keep)?;

    if deleted.is_empty() {
        println!("✓ Nothing to prune.");
    } else {
        println!("✓ Deleted {} backup(s):", deleted.len());
        for key in &deleted {
            println!("  {key}");
        }
    }

    Ok(())
}
