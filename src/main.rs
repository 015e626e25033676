use anyhow::Context;
use std::net::SocketAddr;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cinema_booking::{
    app,
    cache::CacheService,
    config::{Config, LogFormat},
    database::Database,
    redis_client::RedisClient,
    store::{MemoryStore, PgStore, RecordStore},
    AppState,
};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env().context("invalid configuration")?;

    init_tracing(&config);
    info!(environment = %config.app.environment, "Starting Cinema Booking API");

    // Redis опционален: без него каталог читается напрямую из хранилища
    let cache = match config.redis.url.as_deref() {
        Some(url) => match RedisClient::new(url).await {
            Ok(redis) => {
                info!("Redis connected");
                CacheService::new(redis, config.redis.cache_ttl_secs)
            }
            Err(e) => {
                warn!(error = %e, "Redis unavailable, catalog cache disabled");
                CacheService::disabled()
            }
        },
        None => CacheService::disabled(),
    };

    match config.database.url.clone() {
        Some(url) => {
            let db = Database::new(&url, &config.database)
                .await
                .context("failed to connect to database")?;
            info!("Database connected");
            db.run_migrations().await.context("failed to run migrations")?;
            serve(PgStore::new(db.pool), cache, config).await
        }
        None => {
            warn!("DATABASE_URL is not set, bookings are kept in memory only");
            serve(MemoryStore::new(), cache, config).await
        }
    }
}

async fn serve<S: RecordStore>(store: S, cache: CacheService, config: Config) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.app.host, config.app.port)
        .parse()
        .context("invalid HOST/PORT")?;
    let router = app(AppState::new(store, cache, config));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.app.rust_log)
        .unwrap_or_else(|_| EnvFilter::new("cinema_booking=info"));
    let registry = tracing_subscriber::registry().with(filter);
    match config.app.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
