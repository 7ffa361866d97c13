//! Application entry point for the `weather-metrics` service.
//!
//! This binary orchestrates the full startup sequence for the sensor metrics
//! API, including:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Constructing the reading store (PostgreSQL pool, or in-memory)
//! - Creating the database schema if it does not exist
//! - Mounting all API routes via the `routes` gateway (EMBP pattern)
//! - Serving requests until Ctrl-C / SIGTERM, then closing the pool
//!
//! # Environment Variables
//! - `DATABASE_URL` (**required** for postgres) – PostgreSQL connection string
//! - `STORE_BACKEND` (optional) – `postgres` (default) or `memory`
//! - `DB_POOL_MAX` (optional) – maximum number of DB connections (default: 5)
//! - `SERVER_PORT` (optional) – listen port (default: 8080)
//! - `APP_LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `APP_SPAN_EVENTS` (optional) – span event mode for tracing
//!
//! This module follows the Explicit Module Boundary Pattern (EMBP) by
//! delegating schema setup to `schema`, configuration parsing to `config`,
//! and route registration to `routes`.
use std::{env, net::SocketAddr, sync::Arc, time::Duration};

use axum::Router;
use dotenvy::dotenv;
use is_terminal::IsTerminal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tokio::signal;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use anyhow::{anyhow, Result};

mod config;
mod error;
mod ingest;
mod models;
mod query;
mod routes;
mod schema;
mod store;
mod validation;

pub use config::{Config, StoreBackend};

// Re-exported for routes/*.rs, which only know their parent module (main.rs)
// and not the individual sibling modules.
pub use error::AppError;
pub use ingest::ingest;
pub use query::{run_query, QueryResponse};
pub use store::{InMemoryReadingStore, PgReadingStore, SharedStore};
pub use validation::{validate_ingest, validate_query, IngestRequest, QueryParams};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    init_tracing();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let (store, pool) = open_store(&cfg).await?;

    // Build app from routes gateway (EMBP)
    let app: Router = routes::router(store);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.server_port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(pool) = pool {
        pool.close().await;
        tracing::info!("Database pool closed");
    }

    Ok(())
}

/// Construct the store selected by `STORE_BACKEND`.
///
/// The pool is returned alongside the store handle so `main` can close it
/// once the server has drained.
async fn open_store(cfg: &Config) -> Result<(SharedStore, Option<PgPool>)> {
    // ---
    match cfg.store_backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; readings are lost on shutdown");
            let store: SharedStore = Arc::new(InMemoryReadingStore::new());
            Ok((store, None))
        }
        StoreBackend::Postgres => {
            let db_url = cfg
                .db_url
                .as_deref()
                .ok_or_else(|| anyhow!("DATABASE_URL is required for the postgres backend"))?;

            tracing::info!("Attempting to connect to database");

            let pool = PgPoolOptions::new()
                .max_connections(cfg.db_pool_max)
                .acquire_timeout(Duration::from_secs(cfg.db_acquire_timeout_secs))
                .connect(db_url)
                .await
                .map_err(|e| anyhow!("Failed to connect to database: {}", e))?;

            tracing::info!("Successfully connected to database");

            schema::create_schema(&pool).await?;

            let store: SharedStore = Arc::new(PgReadingStore::new(pool.clone()));
            Ok((store, Some(pool)))
        }
    }
}

/// Resolve when the process receives Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    // ---
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining requests");
}

// ---

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Log target, file, and line number output enabled
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Span event emission mode controlled by the `APP_SPAN_EVENTS` env var:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level from `RUST_LOG`, else the `APP_LOG_LEVEL` env var
///
/// Called once at startup, after `.env` is loaded so it can supply these
/// variables too.
fn init_tracing() {
    // ---
    let span_events = match env::var("APP_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("APP_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "debug",
        };
        EnvFilter::new(format!("{level},sqlx::query=warn"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
