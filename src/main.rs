mod auth;
mod commands;
mod config;
mod db;
mod entities;
mod error;
mod importer;
mod models;
mod omdb;
mod repository;
mod routes;
mod templates;

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use clap::{Parser, Subcommand};
use dialoguer::console::Term;
use sea_orm::DatabaseConnection;

use crate::{
    commands::import::{CandidatePicker, DeclineAll, ImportCommand, TerminalPicker},
    config::Config,
    omdb::{CachedSource, MovieSource, OmdbClient},
    repository::MovieRepository,
};

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub movies: MovieRepository,
    pub omdb: Arc<dyn MovieSource>,
    pub cookie_key: Key,
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

#[derive(Debug, Parser)]
#[command(name = "cinematheque", version, about = "Movie catalog with OMDb import")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the web catalog (default).
    Serve,

    /// Import movies from OMDb by IMDb id or title.
    #[command(visible_alias = "movies:import", alias = "omdb:movies:import")]
    Import {
        /// IMDb ids (tt...) or titles, processed in order.
        #[arg(required = true, value_name = "ID_OR_TITLE")]
        id_or_title: Vec<String>,

        /// Do everything but commit.
        #[arg(long)]
        dry_run: bool,

        /// Never prompt; title searches with candidates count as declined.
        #[arg(long)]
        no_interaction: bool,
    },

    /// Create the development users and base genres.
    SeedUsers,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,cinematheque=debug,sqlx=warn".to_string()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let db = db::connect_and_migrate(&config.database_url).await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, db).await,
        Command::Import { id_or_title, dry_run, no_interaction } => {
            let source = omdb_source(&config)?;
            let picker: Box<dyn CandidatePicker> =
                if no_interaction { Box::new(DeclineAll) } else { Box::new(TerminalPicker::new()) };

            let mut command = ImportCommand::new(&source, picker, Term::stdout());
            let report = command.run(&db, &id_or_title, dry_run).await?;
            report.render(&mut Term::stdout())?;
            if report.saved {
                tracing::info!(imported = report.imported.len(), failed = report.failed.len(), "import saved");
            }
            Ok(())
        },
        Command::SeedUsers => {
            let today = jiff::Zoned::now().date();
            let created = commands::seed::seed_users(&db, today).await?;
            commands::seed::seed_genres(&db).await?;
            tracing::info!(created = created.len(), "fixtures loaded");
            Ok(())
        },
    }
}

fn omdb_source(config: &Config) -> anyhow::Result<CachedSource<OmdbClient>> {
    let http = wreq::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .context("building HTTP client")?;

    let client = OmdbClient::new(
        http,
        config.omdb_api_key.clone(),
        config.omdb_base_url.clone(),
        config.omdb_rps,
    );
    Ok(CachedSource::new(client))
}

fn session_key(secret: &str) -> Key {
    match Key::try_from(secret.as_bytes()) {
        Ok(key) => key,
        Err(_) => {
            tracing::warn!("SESSION_SECRET missing or shorter than 64 bytes, sessions end on restart");
            Key::generate()
        },
    }
}

async fn serve(config: Config, db: DatabaseConnection) -> anyhow::Result<()> {
    let state = AppState {
        db: db.clone(),
        movies: MovieRepository::new(db),
        omdb: Arc::new(omdb_source(&config)?),
        cookie_key: session_key(&config.session_secret),
    };

    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!(addr = %config.addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
