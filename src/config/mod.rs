use serde::Deserialize;
use std::env;
use std::time::Duration;

// Главная структура конфигурации - контейнер для всех настроек
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub booking: BookingConfig,
}

// Настройки приложения
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
    pub log_format: LogFormat,
    pub cors_allowed_origins: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Pretty,
    Json,
}

// Настройки базы данных. Без url сервис работает на in-memory хранилище.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub pool_size: u32,
    pub acquire_timeout_secs: u64,
}

// Настройки Redis (кеш каталога, опционально)
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: Option<String>,
    pub cache_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookingConfig {
    pub isolation: IsolationLevel,
    pub timeout_ms: u64,
    pub code_attempts: u32,
    /// Extra attempts after a serialization failure that involved no held seat.
    pub serialization_retries: u32,
}

/// Isolation level the booking transaction runs at.
///
/// The `held_seats` primary key keeps seats exclusive at every level; the
/// level only decides whether a lost race surfaces at the conflict check or
/// at the insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    pub fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

impl BookingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            isolation: IsolationLevel::RepeatableRead,
            timeout_ms: 5_000,
            code_attempts: 5,
            serialization_retries: 3,
        }
    }
}

impl AppConfig {
    pub fn allowed_origins(&self) -> Vec<String> {
        self.cors_allowed_origins
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect()
    }
}

// (ключ в конфиге, переменная окружения)
const ENV_KEYS: &[(&str, &str)] = &[
    ("app.host", "HOST"),
    ("app.port", "PORT"),
    ("app.environment", "ENVIRONMENT"),
    ("app.rust_log", "RUST_LOG"),
    ("app.log_format", "LOG_FORMAT"),
    ("app.cors_allowed_origins", "CORS_ALLOWED_ORIGINS"),
    ("database.url", "DATABASE_URL"),
    ("database.pool_size", "DB_POOL_SIZE"),
    ("database.acquire_timeout_secs", "DB_ACQUIRE_TIMEOUT_SECS"),
    ("redis.url", "REDIS_URL"),
    ("redis.cache_ttl_secs", "CACHE_TTL_SECS"),
    ("booking.isolation", "BOOKING_ISOLATION"),
    ("booking.timeout_ms", "BOOKING_TIMEOUT_MS"),
    ("booking.code_attempts", "BOOKING_CODE_ATTEMPTS"),
    ("booking.serialization_retries", "BOOKING_SERIALIZATION_RETRIES"),
];

impl Config {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds configuration from defaults overridden by whatever `lookup`
    /// returns for each environment variable name.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, config::ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = config::Config::builder()
            .set_default("app.host", "0.0.0.0")?
            .set_default("app.port", 8000)?
            .set_default("app.environment", "development")?
            .set_default("app.rust_log", "cinema_booking=debug,tower_http=debug")?
            .set_default("app.log_format", "pretty")?
            .set_default(
                "app.cors_allowed_origins",
                "http://localhost:3000,http://localhost:5173",
            )?
            .set_default("database.pool_size", 20)?
            .set_default("database.acquire_timeout_secs", 5)?
            .set_default("redis.cache_ttl_secs", 3600)?
            .set_default("booking.isolation", "repeatable_read")?
            .set_default("booking.timeout_ms", 5000)?
            .set_default("booking.code_attempts", 5)?
            .set_default("booking.serialization_retries", 3)?;

        for (key, var) in ENV_KEYS {
            let value = lookup(var).filter(|v| !v.trim().is_empty());
            builder = builder.set_override_option(*key, value)?;
        }

        builder.build()?.try_deserialize()
    }
}
