//! flixd — a movie catalog REST API with per-user favorites and
//! bearer-token authentication.

mod auth;
mod config;
mod error;
mod gateway;
mod model;
mod store;
mod validate;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use auth::token::TokenKeeper;
use config::Config;
use gateway::AppState;
use model::NewMovie;
use store::CatalogStore;

#[derive(Parser)]
#[command(name = "flixd", version, about)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the API server (the default).
    Serve,
    /// Load movies from a JSON file into the catalog.
    Seed { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("flixd=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    let store = Arc::new(CatalogStore::open(&config.database.path)?);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            // Fail fast: no secret, no server.
            let secret = config.token_secret()?.to_owned();
            let tokens = Arc::new(TokenKeeper::new(secret.as_bytes(), config.token_ttl()));
            gateway::run(&config.bind_addr(), AppState { store, tokens }).await
        }
        Command::Seed { file } => {
            let added = seed(&store, &file)?;
            tracing::info!(added, file = %file.display(), "catalog seeded");
            Ok(())
        }
    }
}

/// Insert every movie from a JSON array file. Titles already present are
/// skipped rather than treated as failures.
fn seed(store: &CatalogStore, file: &std::path::Path) -> Result<usize> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("reading seed file {}", file.display()))?;
    let movies: Vec<NewMovie> =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", file.display()))?;

    let mut added = 0;
    for movie in &movies {
        match store.add_movie(movie) {
            Ok(_) => added += 1,
            Err(error::ApiError::Conflict { .. }) => {
                tracing::debug!(title = %movie.title, "already in catalog, skipping");
            }
            Err(e) => return Err(anyhow::anyhow!(e)),
        }
    }
    Ok(added)
}
