//! Movie Catalog API
//!
//! JSON API serving a movie catalog from memory or `PostgreSQL`.
//!
//! # Configuration
//!
//! Run with `--help` for the full flag list. Each flag also reads an
//! environment variable, and a `.env` file in the working directory is loaded
//! first. Notable variables:
//!
//! - `PORT`: Server port (default: `4000`)
//! - `APP_ENV`: `development` (default) | `staging` | `production`
//! - `GREENLIGHT_DB_DSN`: `PostgreSQL` DSN; selects postgres storage when set
//! - `STORAGE_MODE`: `in_memory` | `postgres`, overrides the DSN-based choice
//! - `LOG_FORMAT`: `text` (default) | `json`
//! - `RUST_LOG`: Logging filter (e.g. `movie_catalog_api=debug`)
//! - `WORKER_THREADS`: Number of tokio worker threads (default: logical CPU count)

use std::net::SocketAddr;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use movie_catalog_api::api::{AppState, router};
use movie_catalog_api::config::{Config, LogFormat};
use movie_catalog_api::infrastructure::RepositoryFactory;

const DEFAULT_LOG_FILTER: &str = "movie_catalog_api=info,tower_http=info";

fn main() {
    dotenvy::dotenv().ok();
    let config = Config::parse();

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if let Some(threads) = config.worker_threads {
        builder.worker_threads(threads.get());
    }

    let runtime = builder.build().expect("Failed to create tokio runtime");
    runtime.block_on(async_main(config));
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

async fn async_main(config: Config) {
    init_tracing(config.log_format);

    let repository_config = match config.repository_config() {
        Ok(repository_config) => repository_config,
        Err(error) => {
            tracing::error!(%error, "Configuration error");
            std::process::exit(1);
        }
    };

    tracing::info!(
        environment = %config.environment,
        storage_mode = ?repository_config.storage_mode,
        "Repository configuration loaded"
    );

    let repository = match RepositoryFactory::new(repository_config).create().await {
        Ok(repository) => repository,
        Err(error) => {
            tracing::error!(%error, "Failed to initialize repository");
            std::process::exit(1);
        }
    };

    let rate_limiter = match config.limiter_settings().build() {
        Ok(rate_limiter) => rate_limiter,
        Err(error) => {
            tracing::error!(%error, "Configuration error");
            std::process::exit(1);
        }
    };

    let state = AppState::new(repository)
        .with_config(config.app_config())
        .with_rate_limiter(rate_limiter);
    let application = router(state);

    let address = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = match TcpListener::bind(address).await {
        Ok(listener) => listener,
        Err(error) => {
            tracing::error!(%error, "Failed to bind to address {}", address);
            std::process::exit(1);
        }
    };

    tracing::info!(
        addr = %address,
        env = %config.environment,
        "starting server"
    );

    if let Err(error) = axum::serve(listener, application)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(%error, "Server error");
        std::process::exit(1);
    }

    tracing::info!(addr = %address, "stopped server");
}

/// Completes on SIGINT (Ctrl+C) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::warn!(%error, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::warn!(%error, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!(signal = "SIGINT", "shutting down server");
        }
        () = terminate => {
            tracing::info!(signal = "SIGTERM", "shutting down server");
        }
    }
}
