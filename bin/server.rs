// SQLite Reconcile - Web Server
// Serves the reconciliation API for every database in a settings file

use anyhow::{Context, Result};
use clap::Parser;
use sqlite_reconcile::server::{build_router, AppState};
use sqlite_reconcile::ServiceSettings;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "reconcile-server")]
#[command(about = "Reconciliation Service API over SQLite tables")]
struct Args {
    /// Settings file (TOML, or JSON with a .json extension)
    #[arg(short, long)]
    settings: PathBuf,

    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(short, long, default_value = "8001")]
    port: u16,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_target(false)
        .compact()
        .init();

    let settings = ServiceSettings::load(&args.settings)
        .with_context(|| format!("Failed to load settings from {}", args.settings.display()))?;
    let databases: Vec<String> = settings.databases.keys().cloned().collect();

    let state = AppState::open(settings).context("Failed to open databases")?;
    let app = build_router(state);

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!(%addr, databases = ?databases, "reconciliation server listening");
    for db in &databases {
        info!("   http://{}/{}/<table>/-/reconcile", addr, db);
    }

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
