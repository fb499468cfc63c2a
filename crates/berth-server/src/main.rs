//! Berth server entry point.
//!
//! Bootstraps the storage backend and stores, then starts the Axum HTTP
//! server with graceful shutdown. A background session sweeper runs
//! alongside the server and is cancelled on shutdown.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use axum::http::{HeaderName, HeaderValue, Method, header};
use chrono::Utc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use berth_core::session::SessionStore;
use berth_storage::{MemoryBackend, StorageBackend};

use berth_server::config::{ServerConfig, StorageBackendType};
use berth_server::routes;
use berth_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env();

    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .json()
        .init();

    info!(storage = ?config.storage_backend, "Berth starting");

    let storage = open_storage(&config).await?;
    let state = Arc::new(AppState::new(storage, &config));

    // Shutdown signal channel.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let sweeper_handle = {
        let state = Arc::clone(&state);
        let mut rx = shutdown_rx.clone();
        let interval_secs = config.session_sweep_interval_secs;
        tokio::spawn(async move {
            session_sweep_worker(&state.sessions, &mut rx, interval_secs).await;
        })
    };

    let app = build_router(state, &config);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.bind_addr))?;

    info!(addr = %config.bind_addr, "Berth server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await
        .context("server error")?;

    info!("waiting for background workers to stop");
    let _ = tokio::time::timeout(Duration::from_secs(10), sweeper_handle).await;

    info!("Berth server stopped");
    Ok(())
}

async fn open_storage(config: &ServerConfig) -> anyhow::Result<Arc<dyn StorageBackend>> {
    let storage: Arc<dyn StorageBackend> = match &config.storage_backend {
        StorageBackendType::Memory => {
            info!("using in-memory storage (data will not persist)");
            Arc::new(MemoryBackend::new())
        }
        #[cfg(feature = "rocksdb-backend")]
        StorageBackendType::RocksDb { path } => {
            info!(path = %path, "using RocksDB storage");
            Arc::new(
                berth_storage::RocksDbBackend::open(path)
                    .context("failed to open RocksDB storage")?,
            )
        }
        #[cfg(not(feature = "rocksdb-backend"))]
        StorageBackendType::RocksDb { .. } => {
            anyhow::bail!("RocksDB backend requested but feature 'rocksdb-backend' is not enabled");
        }
        #[cfg(feature = "postgres-backend")]
        StorageBackendType::Postgres { url } => {
            info!(url = %"[redacted]", "using PostgreSQL storage");
            Arc::new(
                berth_storage::PostgresBackend::connect(url)
                    .await
                    .context("failed to connect to PostgreSQL storage")?,
            )
        }
        #[cfg(not(feature = "postgres-backend"))]
        StorageBackendType::Postgres { .. } => {
            anyhow::bail!(
                "PostgreSQL backend requested but feature 'postgres-backend' is not enabled"
            );
        }
    };
    Ok(storage)
}

/// Wrap the API router in tracing, CORS, and security headers.
fn build_router(state: Arc<AppState>, config: &ServerConfig) -> Router {
    routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.allowed_origins))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
}

/// Credentialed CORS for the configured dashboard origins only.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring unparsable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::PUT,
            Method::PATCH,
            Method::POST,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .expose_headers([
            header::CONTENT_RANGE,
            HeaderName::from_static("x-content-range"),
        ])
        .max_age(Duration::from_secs(3600))
}

/// Consecutive failed sweeps before the log level escalates.
const SWEEP_FAILURE_ESCALATION: u32 = 5;

/// Background worker that periodically deletes expired sessions.
async fn session_sweep_worker(
    sessions: &SessionStore,
    shutdown: &mut watch::Receiver<bool>,
    interval_secs: u64,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    let mut consecutive_failures: u32 = 0;
    info!(interval_secs, "session sweeper started");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match sessions.sweep_expired(Utc::now()).await {
                    Ok(0) => consecutive_failures = 0,
                    Ok(removed) => {
                        consecutive_failures = 0;
                        info!(removed, "expired sessions swept");
                    }
                    Err(e) => {
                        consecutive_failures = consecutive_failures.saturating_add(1);
                        if consecutive_failures >= SWEEP_FAILURE_ESCALATION {
                            tracing::error!(
                                error = %e,
                                consecutive_failures,
                                "session sweep persistently failing, storage may be down"
                            );
                        } else {
                            warn!(error = %e, consecutive_failures, "session sweep failed");
                        }
                    }
                }
            }
            _ = shutdown.changed() => {
                info!("session sweeper shutting down");
                return;
            }
        }
    }
}

/// Wait for SIGINT or SIGTERM, then broadcast shutdown.
async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut sig) =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            sig.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("shutdown signal received, stopping server");
    let _ = shutdown_tx.send(true);
}
