//! Short-TTL keyed cache used by the downstream services to deduplicate
//! retried operations.
//!
//! The contract is deliberately small so tests can substitute the
//! in-memory map for Redis. Key generation lives on the adapter so the
//! per-service prefix never leaks to call sites.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::AsyncCommands;
use thiserror::Error;

/// How long a deduplication record lives. Long enough to cover retries
/// within a single orchestration; not a durability guarantee.
pub const IDEMPOTENCY_TTL: Duration = Duration::from_secs(60);

/// Errors from a cache adapter. Callers treat these as non-fatal: the
/// in-process state map is the fallback dedupe.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Keyed store with per-entry expiry.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Stores `value` under `key` for `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Returns the live value for `key`, or `None` on miss or expiry.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Builds the cache key `"<service>:<operation>:<discriminator>"`.
    fn generate_key(&self, operation: &str, discriminator: &str) -> String;
}

/// Redis-backed cache adapter.
pub struct RedisCache {
    connection: redis::aio::ConnectionManager,
    service_name: String,
}

impl RedisCache {
    /// Connects to Redis at `addr` (with or without the `redis://` scheme).
    pub async fn connect(addr: &str, service_name: impl Into<String>) -> Result<Self, CacheError> {
        let url = if addr.starts_with("redis://") {
            addr.to_string()
        } else {
            format!("redis://{addr}")
        };
        let client = redis::Client::open(url.as_str())?;
        let connection = client.get_connection_manager().await?;
        Ok(Self {
            connection,
            service_name: service_name.into(),
        })
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut connection = self.connection.clone();
        connection
            .set_ex::<_, _, ()>(key, value, ttl.as_secs())
            .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut connection = self.connection.clone();
        let value: Option<String> = connection.get(key).await?;
        Ok(value)
    }

    fn generate_key(&self, operation: &str, discriminator: &str) -> String {
        format!("{}:{}:{}", self.service_name, operation, discriminator)
    }
}

/// In-memory TTL map. Used in tests and as the cache when no Redis
/// address is configured.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    service_name: String,
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl InMemoryCache {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let deadline = Instant::now() + ttl;
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value.to_string(), deadline));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut entries = self.entries.lock().unwrap();
        if let Some((value, deadline)) = entries.get(key) {
            if Instant::now() < *deadline {
                return Ok(Some(value.clone()));
            }
        }
        entries.remove(key);
        Ok(None)
    }

    fn generate_key(&self, operation: &str, discriminator: &str) -> String {
        format!("{}:{}:{}", self.service_name, operation, discriminator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_key_uses_service_prefix() {
        let cache = InMemoryCache::new("payment-service");
        assert_eq!(
            cache.generate_key("charge", "ord-1"),
            "payment-service:charge:ord-1"
        );
    }

    #[tokio::test]
    async fn set_then_get_within_ttl() {
        let cache = InMemoryCache::new("test");
        cache.set("k1", "v1", IDEMPOTENCY_TTL).await.unwrap();
        assert_eq!(cache.get("k1").await.unwrap(), Some("v1".to_string()));
    }

    #[tokio::test]
    async fn expired_entries_read_as_miss() {
        let cache = InMemoryCache::new("test");
        cache.set("k1", "v1", Duration::ZERO).await.unwrap();
        assert_eq!(cache.get("k1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn missing_key_is_a_miss() {
        let cache = InMemoryCache::new("test");
        assert_eq!(cache.get("absent").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_overwrites_existing_value() {
        let cache = InMemoryCache::new("test");
        cache.set("k1", "v1", IDEMPOTENCY_TTL).await.unwrap();
        cache.set("k1", "v2", IDEMPOTENCY_TTL).await.unwrap();
        assert_eq!(cache.get("k1").await.unwrap(), Some("v2".to_string()));
    }
}
