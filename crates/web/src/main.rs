mod routes;
mod views;

use std::{
    fs::{self, OpenOptions},
    sync::Arc,
};

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};
use titlepatch_core::{
    config::{self, AppConfig},
    Catalog, CatalogStore, PatchFetcher,
};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;
    install_panic_hook();

    if let Err(err) = config::ensure_default_config() {
        warn!(?err, "could not write default config");
    }
    let config = AppConfig::load()?;

    let store = CatalogStore::from_config(&config)?;
    let fetcher = PatchFetcher::from_config(&config)?;
    let catalog = Arc::new(Catalog::new(fetcher, store));
    let app = routes::router(routes::AppState::new(catalog));

    let address = config.listen_address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!(address = %listener.local_addr()?, vendor = %config.vendor_base_url, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(?err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic| {
        error!("panic: {panic}");
    }));
}

fn init_logging() -> Result<()> {
    let log_dir = std::env::current_dir()?.join("logs");
    fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join("titlepatch.log");
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open log file {}", log_path.display()))?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact()
        .with_writer(std::io::stdout);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .compact()
        .with_ansi(false)
        .with_writer(Arc::new(log_file));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    Ok(())
}
