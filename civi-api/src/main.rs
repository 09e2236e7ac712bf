//! civi-api - read-only query service for the CIVI store
//!
//! Serves scores of the active generation and the exported country
//! documents. Never writes to the database.

use anyhow::{Context, Result};
use civi_common::config::{RootFolderInitializer, RootFolderResolver, TomlConfig};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use civi_api::{build_router, db, AppState};

/// Command-line arguments for civi-api
#[derive(Parser, Debug)]
#[command(name = "civi-api")]
#[command(about = "Critical Infrastructure Vitals Index query API")]
#[command(version)]
struct Args {
    /// Root folder holding the database
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Path to a TOML config file
    #[arg(short, long, env = "CIVI_CONFIG")]
    config: Option<PathBuf>,

    /// Bind address (overrides config)
    #[arg(long, env = "CIVI_API_HOST")]
    host: Option<String>,

    /// Port (overrides config)
    #[arg(short, long, env = "CIVI_API_PORT")]
    port: Option<u16>,

    /// Directory of exported documents to serve under /data
    #[arg(long)]
    export_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = TomlConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("civi_api={0},civi_common={0},tower_http={0}", config.logging.level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting CIVI query API (civi-api) v{}", env!("CARGO_PKG_VERSION"));

    let root_folder = RootFolderResolver::new("civi-api")
        .with_cli_override(args.root_folder)
        .with_config(&config)
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);

    let db_path = initializer.database_path();
    info!("Database path: {}", db_path.display());

    let pool = match db::connect_readonly(&db_path).await {
        Ok(pool) => {
            info!("Connected to database (read-only)");
            pool
        }
        Err(e) => {
            error!("Failed to connect to database: {}", e);
            return Err(e);
        }
    };

    let export_dir = args
        .export_dir
        .unwrap_or_else(|| initializer.export_dir(&config.export));
    let export_dir = if export_dir.is_dir() {
        info!("Serving exported documents from {}", export_dir.display());
        Some(export_dir)
    } else {
        warn!("Export directory {} not found; /data disabled", export_dir.display());
        None
    };

    let app = build_router(AppState::new(pool).with_export_dir(export_dir));

    let host = args.host.unwrap_or(config.api.host);
    let port = args.port.unwrap_or(config.api.port);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("civi-api listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("civi-api stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
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
