//! Weather Cache - a cache-aside layer in front of the OpenWeather API
//!
//! Serves current-weather lookups from Redis when possible and from the
//! upstream API otherwise, repopulating the cache on every miss.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use weather_cache::api::{create_router, AppState};
use weather_cache::cache::{CacheAside, CacheOptions, CacheStore, MemoryStore, RedisStore};
use weather_cache::config::{Config, StoreBackend};
use weather_cache::spawn_cleanup_task;
use weather_cache::weather::WeatherService;

/// Main entry point for the weather cache service.
///
/// # Startup Sequence
/// 1. Load `.env` if present and initialize the tracing subscriber
/// 2. Load configuration from environment variables
/// 3. Connect the cache store (Redis, or the in-memory store plus its cleanup task)
/// 4. Build the accessor and the weather service around it
/// 5. Start the HTTP server on the configured port
/// 6. On SIGINT/SIGTERM stop serving, then wait for pending cache writes
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "weather_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting weather cache service");

    let config = Config::from_env();
    info!(
        "Configuration loaded: store={:?}, default_ttl={}s, store_timeout={}ms, single_flight={}, port={}",
        config.store_backend,
        config.default_ttl,
        config.store_timeout_ms,
        config.single_flight,
        config.server_port
    );
    if config.weather_api_key.is_none() {
        warn!("OPEN_WEATHER_SECRET is not set, upstream requests will be unauthenticated");
    }

    let (store, cleanup_handle) = connect_store(&config).await?;
    let cache = CacheAside::new(store, CacheOptions::from_config(&config));
    info!("Cache store initialized: {}", cache.store_name());

    let service = WeatherService::from_config(cache.clone(), &config)
        .context("failed to build weather client")?;
    let state = AppState::new(service);
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("app is listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if let Some(handle) = cleanup_handle {
        handle.abort();
        warn!("Cleanup task aborted");
    }

    info!("Waiting for {} pending cache writes", cache.pending_writes());
    cache.drain_writes().await;

    info!("Server shutdown complete");
    Ok(())
}

/// Builds the configured store; the memory store also gets its cleanup task.
async fn connect_store(
    config: &Config,
) -> anyhow::Result<(Arc<dyn CacheStore>, Option<JoinHandle<()>>)> {
    match config.store_backend {
        StoreBackend::Redis => {
            let store = RedisStore::connect(&config.redis_url, config.store_timeout())
                .await
                .context("failed to connect to redis")?;
            let store: Arc<dyn CacheStore> = Arc::new(store);
            Ok((store, None))
        }
        StoreBackend::Memory => {
            let memory = Arc::new(MemoryStore::new(config.max_entries));
            let handle = spawn_cleanup_task(memory.clone(), config.cleanup_interval);
            info!("Background cleanup task started");
            let store: Arc<dyn CacheStore> = memory;
            Ok((store, Some(handle)))
        }
    }
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
