//! unicat-ex - UniCat exchange program directory service
//!
//! Serves the exchange directory API over the shared UniCat database.
//! Startup order: CLI/env, TOML bootstrap config, logging, database, server.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use unicat_common::config::{config_source, database_path, load_toml_config, resolve_root_folder};
use unicat_common::db::init::init_database;
use unicat_ex::{build_router, AppState};

const ROOT_FOLDER_ENV: &str = "UNICAT_ROOT_FOLDER";

/// Command-line arguments for unicat-ex
#[derive(Parser, Debug)]
#[command(name = "unicat-ex")]
#[command(about = "Exchange program directory service for UniCat")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "UNICAT_PORT")]
    port: Option<u16>,

    /// Root folder holding unicat.db
    #[arg(short, long, env = "UNICAT_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// TOML bootstrap config file
    #[arg(short, long, env = "UNICAT_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_toml_config(args.config.as_deref()).context("Failed to load configuration")?;

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting UniCat exchange directory (unicat-ex) v{}", env!("CARGO_PKG_VERSION"));

    // The loader ran before the subscriber existed
    match config_source(args.config.as_deref()) {
        Some(path) => info!("Loaded configuration from {}", path.display()),
        None => warn!("No config file found, using built-in defaults"),
    }

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), ROOT_FOLDER_ENV, &config);
    let db_path = database_path(&root_folder);
    info!("Database path: {}", db_path.display());

    let pool = init_database(&db_path, &config.database)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    info!(
        "Directory hides home country {} and shows {} programs per page",
        config.exchange.home_country_code, config.exchange.page_size
    );

    let state = AppState::new(pool.clone(), config.exchange.clone());
    let app = build_router(state);

    // The identity header is trusted; only the local auth proxy may connect
    let port = args.port.unwrap_or(config.port);
    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("unicat-ex listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    pool.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
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
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
