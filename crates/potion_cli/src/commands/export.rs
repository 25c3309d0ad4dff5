//! Export command.

use std::fs;
use std::path::Path;
use tracing::info;

/// What to export.
pub enum Target {
    /// Full workspace snapshot.
    Workspace(String),
    /// A page, optionally with its subtree.
    Page(String, bool),
    /// A database page with rows and companion pages.
    Database(String),
}

impl Target {
    /// Resolves the mutually exclusive CLI flags into a target.
    pub fn from_flags(
        workspace: Option<String>,
        page: Option<String>,
        database: Option<String>,
        children: bool,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        match (workspace, page, database) {
            (Some(id), None, None) => Ok(Self::Workspace(id)),
            (None, Some(id), None) => Ok(Self::Page(id, children)),
            (None, None, Some(id)) => Ok(Self::Database(id)),
            (None, None, None) => {
                Err("one of --workspace, --page, or --database is required".into())
            }
            _ => Err("--workspace, --page, and --database are mutually exclusive".into()),
        }
    }
}

/// Export the target to a file or stdout.
pub fn run(
    store_path: &Path,
    target: Target,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Exporting from {:?}", store_path);

    let (adapter, _store) = super::open_storage(store_path)?;

    let document = match &target {
        Target::Workspace(id) => adapter.export_workspace(id)?,
        Target::Page(id, children) => adapter.export_page(id, *children)?,
        Target::Database(id) => adapter.export_database(id)?,
    };

    let json = serde_json::to_string_pretty(&document)?;
    match output {
        Some(path) => {
            fs::write(path, &json)?;
            println!("✓ Export written");
            println!("  Path: {}", path.display());
        }
        None => println!("{json}"),
    }

    if output.is_some() {
        println!("  Pages: {}", document.pages.len());
        println!("  Databases: {}", document.databases.len());
        println!("  Rows: {}", document.rows.len());
    }

    Ok(())
}
