//! Read-through Redis cache for catalog lists.
//!
//! The cache is optional: without `REDIS_URL` every lookup is a miss and the
//! store answers directly. Redis failures are logged and treated as misses.
//! Seat availability is never cached.

use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};
use tracing::warn;

use crate::redis_client::RedisClient;

pub mod catalog;

pub use catalog::{MOVIES_KEY, VENUES_KEY};

/// Whether a response came from the cache. Sent as the `X-Cache` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_header(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

#[derive(Clone)]
pub struct CacheService {
    redis: Option<RedisClient>,
    ttl_secs: u64,
}

impl CacheService {
    pub fn new(redis: RedisClient, ttl_secs: u64) -> Self {
        Self {
            redis: Some(redis),
            ttl_secs,
        }
    }

    pub fn disabled() -> Self {
        Self {
            redis: None,
            ttl_secs: 0,
        }
    }

    /// State reported by `/health`. A missing Redis does not fail the check.
    pub async fn health(&self) -> &'static str {
        let Some(redis) = self.redis.as_ref() else {
            return "disabled";
        };
        match redis.ping().await {
            Ok(()) => "ok",
            Err(e) => {
                warn!(error = %e, "cache ping failed");
                "unavailable"
            }
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let redis = self.redis.as_ref()?;
        let mut conn = redis.conn.clone();
        let data: Option<String> = match conn.get(key).await {
            Ok(data) => data,
            Err(e) => {
                warn!(key, error = %e, "cache read failed");
                return None;
            }
        };
        match serde_json::from_str(&data?) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "dropping unreadable cache entry");
                self.invalidate(key).await;
                None
            }
        }
    }

    pub async fn put_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let Some(redis) = self.redis.as_ref() else {
            return;
        };
        let data = match serde_json::to_string(value) {
            Ok(data) => data,
            Err(e) => {
                warn!(key, error = %e, "cache serialize failed");
                return;
            }
        };
        let mut conn = redis.conn.clone();
        let written: redis::RedisResult<()> = conn.set_ex(key, data, self.ttl_secs).await;
        if let Err(e) = written {
            warn!(key, error = %e, "cache write failed");
        }
    }

    pub async fn invalidate(&self, key: &str) {
        let Some(redis) = self.redis.as_ref() else {
            return;
        };
        let mut conn = redis.conn.clone();
        let removed: redis::RedisResult<()> = conn.del(key).await;
        if let Err(e) = removed {
            warn!(key, error = %e, "cache invalidation failed");
        }
    }
}
