//! # Project Search Sync CLI (`searchsync`)
//!
//! Rebuilds the projects search index from the relational project store.
//!
//! ## Usage
//!
//! ```bash
//! searchsync --config ./config/searchsync.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `searchsync init` | Create the SQLite project store schema |
//! | `searchsync rebuild` | Reconfigure the index, clear it, and reload every eligible project |
//! | `searchsync stats` | Compare eligible projects in the store with documents in the index |
//! | `searchsync show <id>` | Print the search document one project would produce |
//! | `searchsync settings` | Print the index settings a rebuild writes |
//!
//! ## Examples
//!
//! ```bash
//! # Create the store schema
//! searchsync init --config ./config/searchsync.toml
//!
//! # Full rebuild with JSON progress lines on stderr
//! searchsync rebuild --progress json
//!
//! # Inspect one project's document
//! searchsync show p1a2b3
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use project_search_sync::config;
use project_search_sync::logging::{init_logging, LogFormat};
use project_search_sync::progress::ProgressMode;
use project_search_sync::{migrate, show, stats, sync};
use search_sync_core::index::IndexSettings;

/// Project Search Sync CLI: keeps the projects search index in step with
/// the project store.
#[derive(Parser)]
#[command(
    name = "searchsync",
    about = "Project Search Sync: rebuild the projects search index from the project store",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/searchsync.toml`. Database, index, sync, and
    /// media settings are read from this file.
    #[arg(long, global = true, default_value = "./config/searchsync.toml")]
    config: PathBuf,

    /// Log format override (`pretty` or `json`). Defaults to `[log] format`.
    #[arg(long, global = true)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the project store schema.
    ///
    /// Creates the SQLite database file and the projects, users,
    /// team_members, organisations, and gallery_items tables.
    /// Running it again is safe.
    Init,

    /// Rebuild the search index.
    ///
    /// Writes the index settings, deletes every document, then loads all
    /// eligible projects page by page. Failures end the run and are shown
    /// in the summary; the exit status is 0 either way.
    Rebuild {
        /// Progress output: `auto` (human when stderr is a TTY), `human`, `json`, or `off`.
        #[arg(long, default_value = "auto")]
        progress: String,
    },

    /// Show store and index counts.
    Stats,

    /// Print the search document for one project as JSON.
    Show {
        /// Project id.
        id: String,
    },

    /// Print the index settings a rebuild writes, as JSON.
    Settings,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cli_format = match cli.log_format.as_deref() {
        Some(f) => Some(
            LogFormat::parse(f)
                .ok_or_else(|| anyhow::anyhow!("Unknown log format: '{}'", f))?,
        ),
        None => None,
    };

    // Commands that don't need a config file
    if let Commands::Settings = cli.command {
        init_logging(cli_format.unwrap_or_default());
        println!("{}", serde_json::to_string_pretty(&IndexSettings::projects())?);
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;
    init_logging(cli_format.unwrap_or_else(|| {
        LogFormat::parse(&cfg.log.format).unwrap_or_default()
    }));

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Rebuild { progress } => {
            let mode = ProgressMode::from_flag(&progress).ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown progress mode: '{}'. Must be auto, human, json, or off.",
                    progress
                )
            })?;
            let reporter = mode.reporter();
            sync::run_rebuild(&cfg, reporter.as_ref()).await;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Show { id } => {
            show::run_show(&cfg, &id).await?;
        }
        Commands::Settings => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
