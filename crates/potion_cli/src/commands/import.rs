//! Import command.

use potion_core::{import_workspace, ImportMode, WorkspaceExport};
use std::fs;
use std::path::Path;
use tracing::info;

/// Import an export document into the store.
pub fn run(
    store_path: &Path,
    input: &Path,
    mode: &str,
    workspace: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Importing {:?} into {:?}", input, store_path);

    let mode = match mode {
        "replace" => ImportMode::Replace,
        "merge" => ImportMode::Merge,
        other => return Err(format!("unknown import mode: {other}").into()),
    };

    let data = fs::read_to_string(input)?;
    let document: WorkspaceExport = serde_json::from_str(&data)?;

    let (adapter, _store) = super::open_storage(store_path)?;
    let result = import_workspace(&adapter, workspace, &document, mode);

    if result.success {
        println!("✓ Import completed");
    } else {
        println!("⚠ Import failed");
        for error in &result.errors {
            println!("  Error: {error}");
        }
    }

    println!("  Pages added: {}", result.pages_added);
    println!("  Pages updated: {}", result.pages_updated);
    println!("  Rows added: {}", result.rows_added);
    println!("  Rows updated: {}", result.rows_updated);

    if !result.conflicts.is_empty() {
        println!("  Conflicts: {}", result.conflicts.len());
        for conflict in &result.conflicts {
            println!(
                "    {} {} - local \"{}\" ({}) vs imported \"{}\" ({})",
                conflict.kind,
                conflict.id,
                conflict.local_title,
                conflict.local_updated_at.to_rfc3339(),
                conflict.imported_title,
                conflict.imported_updated_at.to_rfc3339()
            );
        }
    }

    if !result.success {
        return Err("Import failed".into());
    }

    Ok(())
}
