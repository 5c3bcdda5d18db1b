// SQLite Reconcile - command line tool
// Import CSV data, check a table's reconciliation settings, run queries.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use sqlite_reconcile::import::{create_fts_index, import_table, CsvTable};
use sqlite_reconcile::{
    check_config, parse_batch, reconcile_batch, ServiceSettings, SqliteStore,
};

#[derive(Parser, Debug)]
#[command(name = "reconcile")]
#[command(about = "Reconciliation Service API over SQLite tables", version)]
struct Cli {
    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a CSV file into a new table
    Import {
        /// SQLite database file (created if missing)
        #[arg(long)]
        db: PathBuf,

        #[arg(long)]
        table: String,

        csv: PathBuf,

        /// Column to declare as the primary key
        #[arg(long)]
        pk: Option<String>,

        /// Columns to index for full-text search
        #[arg(long, num_args = 1..)]
        fts: Vec<String>,
    },

    /// Resolve a table's reconciliation settings and print them
    Check {
        #[arg(long)]
        settings: PathBuf,

        #[arg(long)]
        database: String,

        #[arg(long)]
        table: String,
    },

    /// Run a batch of reconciliation queries
    Query {
        #[arg(long)]
        settings: PathBuf,

        #[arg(long)]
        database: String,

        #[arg(long)]
        table: String,

        /// JSON object of {query_id: query}
        queries: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Import { db, table, csv, pk, fts } => run_import(&db, &table, &csv, pk.as_deref(), &fts),
        Command::Check { settings, database, table } => run_check(&settings, &database, &table),
        Command::Query { settings, database, table, queries } => {
            run_query(&settings, &database, &table, &queries)
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn run_import(db: &Path, table: &str, csv: &Path, pk: Option<&str>, fts: &[String]) -> Result<()> {
    let data = CsvTable::from_path(csv).with_context(|| format!("Failed to read {}", csv.display()))?;

    let mut store = SqliteStore::open(db).with_context(|| format!("Failed to open {}", db.display()))?;
    let inserted = import_table(store.connection_mut(), table, &data, pk).context("Failed to import CSV")?;
    println!("✓ Imported {} rows into {}", inserted, table);

    if !fts.is_empty() {
        let fts_table = create_fts_index(store.connection(), table, fts).context("Failed to build FTS index")?;
        println!("✓ Full-text index {} over {}", fts_table, fts.join(", "));
    }

    Ok(())
}

/// Open the database a settings file points at and fetch the table's settings
fn open_table(settings_path: &Path, database: &str) -> Result<(ServiceSettings, SqliteStore)> {
    let settings = ServiceSettings::load(settings_path)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;

    let path = settings.database(database)?.path.clone();
    if !path.exists() {
        bail!("Database file not found: {}", path.display());
    }
    let store = SqliteStore::open(&path).with_context(|| format!("Failed to open {}", path.display()))?;

    Ok((settings, store))
}

fn run_check(settings_path: &Path, database: &str, table: &str) -> Result<()> {
    let (settings, store) = open_table(settings_path, database)?;
    let config = check_config(settings.table_settings(database, table)?, &store, table)?;

    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn run_query(settings_path: &Path, database: &str, table: &str, queries: &str) -> Result<()> {
    let (settings, store) = open_table(settings_path, database)?;
    let config = check_config(settings.table_settings(database, table)?, &store, table)?;

    let value: Value = serde_json::from_str(queries).context("queries must be valid JSON")?;
    let batch = parse_batch(&value)?;
    let results = reconcile_batch(&store, &config, table, &batch)?;

    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}
