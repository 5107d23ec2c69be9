//! Loglane Server
//!
//! Anonymous identities, sessions and log batch ingestion over HTTP:
//! - `POST /user/create` mints an anonymous user keyed by a hashed client address
//! - `POST /session/create` opens a two-day session for the `User-Id` header
//! - `POST /session/upload?session_id=..&tag=..` counts a batch of log entries
//! - `/healthz`, `/readyz` and `/metrics` for operations
//!
//! Usage:
//! ```bash
//! # Minimal, everything from the environment
//! DATABASE_URL=sqlite://loglane.db IP_HASH=change-me loglane-server
//!
//! # With a config file (env vars and flags override it)
//! loglane-server --config loglane.yaml --port 9000
//!
//! # Only create the schema
//! loglane-server --config loglane.yaml init-db
//! ```
//!
//! Try it:
//! ```bash
//! curl -X POST http://localhost:8000/user/create
//! curl -X POST http://localhost:8000/session/create -H "User-Id: <user_id>"
//! curl -X POST "http://localhost:8000/session/upload?session_id=<session_id>&tag=t1" \
//!   -H "Content-Type: application/json" \
//!   -d '[{"message": "hello"}, {"message": "world"}]'
//! ```

mod config;
mod store_factory;

use anyhow::Context;
use clap::{Parser, Subcommand};
use config::{LogFormat, ServerConfig};
use loglane_ingest::{AppState, IpHasher, router};
use loglane_observability::Metrics;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Loglane Server - session and log ingestion service
#[derive(Parser)]
#[command(name = "loglane-server")]
#[command(about = "Anonymous session and log ingestion service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to configuration file (YAML or TOML)
    #[arg(short, long, value_name = "FILE", env = "LOGLANE_CONFIG", global = true)]
    config: Option<String>,

    /// Address to bind (overrides config and LOGLANE_HOST)
    #[arg(long, value_name = "HOST", global = true)]
    host: Option<String>,

    /// Port to bind (overrides config and LOGLANE_PORT)
    #[arg(short, long, value_name = "PORT", global = true)]
    port: Option<u16>,
}

#[derive(Subcommand)]
enum Commands {
    /// Bootstrap the schema and serve HTTP (default)
    Serve,
    /// Bootstrap the schema and exit
    InitDb,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ServerConfig::from_file(path)?,
        None => ServerConfig::default(),
    };
    config.merge_env()?;
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    let backend = config.validate()?;

    init_tracing(&config)?;

    match &cli.config {
        Some(path) => info!(path = %path, "Loaded configuration"),
        None => info!("Using default configuration with environment overrides"),
    }

    let store = store_factory::create_store(&config.database, backend)
        .await
        .context("Failed to open database")?;
    info!(backend = store.backend(), "Database schema ready");

    if matches!(cli.command, Some(Commands::InitDb)) {
        return Ok(());
    }

    let hasher = IpHasher::new(config.ip_hash.algorithm, &config.ip_hash.secret)?;
    let metrics = Arc::new(Metrics::new().context("Failed to register metrics")?);
    let state = AppState::new(store, hasher, metrics, config.ingest_config());
    let counter = Arc::clone(&state.counter);

    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.host, config.port))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!(
        %addr,
        ip_hash = %config.ip_hash.algorithm,
        verify_references = config.ingest.verify_references,
        trust_forwarded_headers = config.ingest.trust_forwarded_headers,
        "Loglane listening"
    );
    info!("   Health check:       http://{}/healthz", addr);
    info!("   Readiness check:    http://{}/readyz", addr);
    info!("   Prometheus metrics: http://{}/metrics", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    match counter.total() {
        Ok(total) => info!(total, "Server stopped"),
        Err(e) => error!(error = %e, "Server stopped; ingestion total unavailable"),
    }

    Ok(())
}

/// Initialize tracing with the configured level, format and sqlx query control
fn init_tracing(config: &ServerConfig) -> anyhow::Result<()> {
    let mut filter = EnvFilter::try_new(&config.logging.level)
        .with_context(|| format!("Invalid log level '{}'", config.logging.level))?;

    // sqlx logs every query at INFO/DEBUG; keep it at WARN unless asked
    if !config.logging.log_sql_queries {
        filter = filter.add_directive("sqlx=warn".parse()?);
    }

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = match config.logging.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    result.map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
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
                error!(error = %e, "Failed to install SIGTERM handler");
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

    info!("Shutdown signal received");
}
