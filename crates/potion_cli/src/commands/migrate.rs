//! Migration commands.

use potion_core::{builtin_runner, Migration, MigrationState, StorageAdapter};
use potion_store::FileStore;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Show the persisted ledger and pending migrations.
pub fn status(store_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    info!("Checking migration status for {:?}", store_path);

    let store = Arc::new(FileStore::open(store_path)?);
    let state = MigrationState::load(store.as_ref())?;
    let runner = builtin_runner()?;

    println!("Migration Status");
    println!("================");
    println!("  Current version: {}", state.current_version);
    println!("  Target version: {}", runner.target_version());
    println!("  Attempts recorded: {}", state.history.len());

    if !state.history.is_empty() {
        println!("\nHistory:");
        for record in &state.history {
            let mark = if record.success { "✓" } else { "✗" };
            println!(
                "  {} v{}: {} ({})",
                mark,
                record.version,
                record.name,
                record.applied_at.to_rfc3339()
            );
            if let Some(error) = &record.error {
                println!("      Error: {error}");
            }
            if let Some(key) = &record.backup_key {
                println!("      Backup: {key}");
            }
        }
    }

    let pending = runner.pending(state.current_version);
    if pending.is_empty() {
        println!("\n✓ Schema is up to date.");
    } else {
        println!("\nPending:");
        for migration in pending {
            println!("  ○ v{}: {}", migration.version(), migration.name());
        }
    }

    Ok(())
}

/// Apply pending migrations.
pub fn run(store_path: &Path, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    info!("Running migrations for {:?}", store_path);

    let store = Arc::new(FileStore::open(store_path)?);
    let runner = builtin_runner()?;

    // Drive the adapter directly here instead of Storage: the handle
    // would apply migrations as a side effect of opening, and this
    // command wants to report on the run itself.
    let adapter = StorageAdapter::new(store.clone());
    adapter.init()?;

    let state = MigrationState::load(store.as_ref())?;
    let pending = runner.pending(state.current_version);

    if pending.is_empty() {
        println!("✓ No pending migrations to run.");
        return Ok(());
    }

    if dry_run {
        println!("Dry run - would apply {} migration(s):", pending.len());
        for migration in pending {
            let tag = if migration.destructive() {
                " [destructive]"
            } else {
                ""
            };
            println!("  v{}: {}{}", migration.version(), migration.name(), tag);
        }
        return Ok(());
    }

    println!("Running {} migration(s)...", pending.len());
    let report = runner.run(&adapter)?;

    if !report.success {
        println!("\n⚠ Migration failed!");
        for record in &report.applied {
            if !record.success {
                println!("  Failed: v{} - {}", record.version, record.name);
                if let Some(error) = &record.error {
                    println!("    Error: {error}");
                }
            }
        }
        return Err("Migration failed".into());
    }

    println!(
        "\n✓ Successfully applied {} migration(s)",
        report.applied.len()
    );
    println!("  Final version: {}", report.current_version);

    Ok(())
}
