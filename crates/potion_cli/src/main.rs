//! Potion CLI
//!
//! Maintenance tools for a Potion storage directory.
//!
//! # Commands
//!
//! - `inspect` - Display store statistics and workspaces
//! - `migrate` - Show migration status or apply pending migrations
//! - `backup` - Create, list, or prune backup snapshots
//! - `export` - Write a workspace, page subtree, or database to a file
//! - `import` - Import an export document (replace or merge)

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Potion command-line storage tools.
#[derive(Parser)]
#[command(name = "potion")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the storage directory
    #[arg(global = true, short, long, default_value = "potion-data")]
    path: PathBuf,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display store statistics and workspaces
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show migration status or apply pending migrations
    Migrate {
        /// Show the ledger without applying anything
        #[arg(short, long)]
        status: bool,

        /// Dry run - list pending migrations without applying them
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Create, list, or prune backup snapshots
    Backup {
        #[command(subcommand)]
        action: BackupAction,
    },

    /// Export a workspace, page subtree, or database to a file
    Export {
        /// Workspace id to export
        #[arg(long)]
        workspace: Option<String>,

        /// Page id to export
        #[arg(long)]
        page: Option<String>,

        /// Database page id to export
        #[arg(long)]
        database: Option<String>,

        /// Include the page's descendant subtree (with --page)
        #[arg(long)]
        children: bool,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import an export document
    Import {
        /// Input file holding an export document
        #[arg(short, long)]
        input: PathBuf,

        /// Import mode (replace, merge)
        #[arg(short, long, default_value = "merge")]
        mode: String,

        /// Target workspace id (defaults to the document's)
        #[arg(long)]
        workspace: Option<String>,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum BackupAction {
    /// Snapshot every workspace into the side channel
    Create,
    /// List stored snapshots, newest first
    List,
    /// Delete all but the most recent snapshots
    Prune {
        /// How many snapshots to keep
        #[arg(short, long, default_value = "3")]
        keep: usize,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect { format } => {
            commands::inspect::run(&cli.path, &format)?;
        }
        Commands::Migrate { status, dry_run } => {
            if status {
                commands::migrate::status(&cli.path)?;
            } else {
                commands::migrate::run(&cli.path, dry_run)?;
            }
        }
        Commands::Backup { action } => match action {
            BackupAction::Create => commands::backup::create(&cli.path)?,
            BackupAction::List => commands::backup::list(&cli.path)?,
            BackupAction::Prune { keep } => commands::backup::prune(&cli.path, keep)?,
        },
        Commands::Export {
            workspace,
            page,
            database,
            children,
            output,
        } => {
            let target = commands::export::Target::from_flags(workspace, page, database, children)?;
            commands::export::run(&cli.path, target, output.as_deref())?;
        }
        Commands::Import {
            input,
            mode,
            workspace,
        } => {
            commands::import::run(&cli.path, &input, &mode, workspace.as_deref())?;
        }
        Commands::Version => {
            println!("Potion CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Potion Core v{}", potion_core::VERSION);
        }
    }

    Ok(())
}
