use std::net::SocketAddr;
use std::sync::Arc;

use dotenvy::dotenv;
use tokio::time::{Duration, timeout};
use tracing::{error, info, warn};

use dental_api::application::ports::cache_port::CachePort;
use dental_api::application::ports::rate_limiter::RateLimiter;
use dental_api::bootstrap::app_context::{AppContext, AppServices};
use dental_api::bootstrap::config::Config;
use dental_api::infrastructure::cache::{self, NoopCache, RedisCache};
use dental_api::infrastructure::db;
use dental_api::infrastructure::rate_limit::{MemoryRateLimiter, RedisRateLimiter};
use dental_api::presentation::http::build_router;

const REDIS_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

async fn redis_backends(cfg: &Config) -> anyhow::Result<(Arc<dyn CachePort>, Arc<dyn RateLimiter>)> {
    if !cfg.cache_enabled && !cfg.require_redis {
        info!("redis_disabled_using_in_memory_backends");
        return Ok((Arc::new(NoopCache), Arc::new(MemoryRateLimiter::new())));
    }
    let connected = match timeout(REDIS_CONNECT_TIMEOUT, cache::connect(&cfg.redis_url())).await {
        Ok(res) => res,
        Err(_) => Err(anyhow::anyhow!("redis connect timed out")),
    };
    match connected {
        Ok(conn) => {
            info!(cache = cfg.cache_enabled, "redis_connected");
            let cache: Arc<dyn CachePort> = if cfg.cache_enabled {
                Arc::new(RedisCache::new(conn.clone()))
            } else {
                Arc::new(NoopCache)
            };
            Ok((cache, Arc::new(RedisRateLimiter::new(conn))))
        }
        Err(e) if cfg.require_redis => Err(e.context("redis is required but unreachable")),
        Err(e) => {
            warn!(error = ?e, "redis_unavailable_falling_back_to_memory");
            Ok((Arc::new(NoopCache), Arc::new(MemoryRateLimiter::new())))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(?e, "shutdown_signal_failed");
    }
    info!("shutdown_requested");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "dental_api=debug,axum=info,tower_http=info".into()),
        )
        .init();

    let cfg = Config::from_env()?;
    info!(?cfg, "Starting dental clinic API");

    // Database: the pool connects lazily so a down database only degrades health.
    let pool = db::lazy_pool(&cfg.database_url, cfg.db_max_connections)?;
    match db::migrate(&pool).await {
        Ok(()) => info!("migrations_applied"),
        Err(e) => error!(error = ?e, "migrations_failed"),
    }

    let (cache, rate_limiter) = redis_backends(&cfg).await?;

    if let Err(e) = tokio::fs::create_dir_all(&cfg.medical_records_storage_path).await {
        warn!(error = ?e, dir = %cfg.medical_records_storage_path, "Failed to create medical records dir");
    }

    let services = AppServices::postgres(&cfg, pool, cache, rate_limiter);
    let ctx = AppContext::new(cfg.clone(), services);
    let app = build_router(ctx);

    let api_addr = SocketAddr::from(([0, 0, 0, 0], cfg.api_port));
    info!(%api_addr, "HTTP API listening");
    let listener = tokio::net::TcpListener::bind(api_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("HTTP API stopped");
    Ok(())
}
