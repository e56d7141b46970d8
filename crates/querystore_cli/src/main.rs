//! Command-line front end for the stored query store.
//!
//! # Responsibility
//! - Wire config, logging and the SQLite backend into one process.
//! - Print records as JSON so output is scriptable.
//!
//! # Invariants
//! - The CLI always persists to a file: without `--db` or `database.path`
//!   it uses `querystore.db` in the working directory.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use querystore_core::{
    core_version, init_logging, ConfigError, QueryDefinitionStore, QueryId, QueryListQuery,
    SqliteQueryRepository, StoreConfig, StoredQuery,
};
use std::path::PathBuf;

const DEFAULT_DB_FILE: &str = "querystore.db";

#[derive(Parser)]
#[command(name = "querystore")]
#[command(version = core_version())]
#[command(about = "Store and look up persisted query definitions")]
struct Cli {
    /// TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database file (overrides `database.path`; default `querystore.db`)
    #[arg(short, long, global = true)]
    db: Option<PathBuf>,

    /// Log level (overrides `logging.level`)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print one stored query, or `null` when absent
    Get { id: QueryId },

    /// Print stored queries in id order
    List {
        /// Only queries with this exact name
        #[arg(short, long)]
        name: Option<String>,

        #[arg(short, long)]
        limit: Option<u32>,

        #[arg(short, long, default_value = "0")]
        offset: u32,
    },

    /// Create a stored query, or replace one with --id
    Save {
        /// Existing id to replace
        #[arg(long)]
        id: Option<QueryId>,

        #[arg(short, long)]
        name: Option<String>,

        /// Query definition text
        definition: String,
    },

    /// Delete a stored query; absent ids succeed
    Delete { id: QueryId },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let file_config = match cli.config.as_deref() {
        Some(path) => StoreConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => StoreConfig::default(),
    };
    let config = resolve_config(file_config, cli.db, cli.log_level)?;

    init_logging(&config.logging).context("initializing logging")?;
    info!(
        "event=cli_start module=cli status=ok core_version={} db={}",
        core_version(),
        config
            .database
            .path
            .as_deref()
            .map(|path| path.display().to_string())
            .unwrap_or_default()
    );

    let repo = SqliteQueryRepository::open_configured(&config.database)
        .context("opening query database")?;
    let store = QueryDefinitionStore::new(repo);

    match cli.command {
        Commands::Get { id } => {
            let found = store.find_by_id(id)?;
            print_json(&found)?;
        }
        Commands::List {
            name,
            limit,
            offset,
        } => {
            let rows = store.list(&QueryListQuery {
                name,
                limit,
                offset,
            })?;
            print_json(&rows)?;
        }
        Commands::Save {
            id,
            name,
            definition,
        } => {
            let query = StoredQuery {
                id,
                name,
                ..StoredQuery::new(definition)
            };
            let saved = store.save(&query)?;
            print_json(&saved)?;
        }
        Commands::Delete { id } => {
            store.delete_by_id(id)?;
            info!("event=cli_delete module=cli status=ok id={id}");
        }
    }

    Ok(())
}

/// Applies command-line overrides on top of the file config.
///
/// Flags win over file values; a missing database path falls back to
/// [`DEFAULT_DB_FILE`] so saves outlive the process.
fn resolve_config(
    mut config: StoreConfig,
    db: Option<PathBuf>,
    log_level: Option<String>,
) -> Result<StoreConfig, ConfigError> {
    if let Some(db) = db {
        config.database.path = Some(db);
    }
    if config.database.path.is_none() {
        config.database.path = Some(PathBuf::from(DEFAULT_DB_FILE));
    }
    if let Some(level) = log_level {
        config.logging.level = level;
    }
    config.validate()?;
    Ok(config)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
