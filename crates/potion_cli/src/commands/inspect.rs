//! Inspect command.

use std::path::Path;
use tracing::info;

/// Show store statistics and workspaces.
pub fn run(store_path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    info!("Inspecting store at {:?}", store_path);

    let (adapter, _store) = super::open_storage(store_path)?;
    let stats = adapter.get_stats()?;
    let workspaces = adapter.list_workspaces()?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Store Statistics");
    println!("================");
    println!("  Workspaces: {}", stats.workspaces);
    println!("  Pages: {}", stats.pages);
    println!("  Databases: {}", stats.databases);
    println!("  Rows: {}", stats.rows);
    println!("  Estimated size: {} bytes", stats.estimated_size_bytes);

    if !workspaces.is_empty() {
        println!("\nWorkspaces:");
        for workspace in &workspaces {
            let pages = adapter.list_pages(&workspace.id)?;
            println!(
                "  {} - {} ({} pages, updated {})",
                workspace.id,
                workspace.name,
                pages.len(),
                workspace.updated_at.to_rfc3339()
            );
        }
    }

    Ok(())
}
