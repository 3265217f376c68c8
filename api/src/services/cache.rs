//! Short-lived cache of lookup results, keyed by [`LocationKey`].
//!
//! [`ResultCache`] never fails: backing-store errors are logged and treated
//! as a miss (reads) or a no-op (writes), so a broken cache degrades to
//! "always fetch from providers" rather than failing lookups.
//!
//! Expired entries are invisible to reads immediately. They are physically
//! removed by [`run_cache_sweeper`], and the in-memory store also drops them
//! on every write.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::db::queries;
use crate::errors::StoreError;
use crate::services::weather::{LocationKey, WeatherResult};

/// Longest lifetime any cache entry gets, whatever TTL was requested.
pub const MAX_CACHE_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// How often the background sweeper removes expired entries.
pub const CACHE_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Key/value store with per-entry expiry. Values are opaque JSON.
#[async_trait]
pub trait CacheStore: Send + Sync + Debug {
    /// Value for `key`, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError>;

    async fn set(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Remove every expired entry. Returns how many were removed.
    async fn purge_expired(&self) -> Result<u64, StoreError>;
}

fn bounded(ttl: Duration) -> Duration {
    ttl.min(MAX_CACHE_TTL)
}

/// Cache rows in the `weather_cache` table, valid until `expires_at`.
#[derive(Debug, Clone)]
pub struct PgCacheStore {
    pool: PgPool,
}

impl PgCacheStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CacheStore for PgCacheStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        Ok(queries::get_cached_weather(&self.pool, key)
            .await?
            .map(|row| row.payload))
    }

    async fn set(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let ttl = chrono::Duration::from_std(bounded(ttl))
            .map_err(|e| StoreError::Unavailable(format!("invalid TTL: {}", e)))?;
        let now = Utc::now();
        queries::upsert_cached_weather(&self.pool, key, &value, now, now + ttl).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        queries::delete_cached_weather(&self.pool, key).await?;
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        Ok(queries::purge_expired_cache(&self.pool).await?)
    }
}

/// Process-local cache. Expiry uses the tokio clock, so tests can advance it.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<String, (serde_json::Value, Instant)>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries currently held, expired or not.
    #[cfg(test)]
    pub async fn entry_count(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some((value, expires_at)) if Instant::now() < *expires_at => {
                    return Ok(Some(value.clone()))
                }
                Some(_) => {}
            }
        }

        self.entries.write().await.remove(key);
        Ok(None)
    }

    async fn set(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, (_, expires_at)| *expires_at > now);
        entries.insert(key.to_string(), (value, now + bounded(ttl)));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, (_, expires_at)| *expires_at > now);
        Ok((before - entries.len()) as u64)
    }
}

#[derive(Debug, Clone)]
pub struct ResultCache {
    store: Arc<dyn CacheStore>,
}

impl ResultCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, key: &LocationKey) -> Option<WeatherResult> {
        let value = match self.store.get(key.as_str()).await {
            Ok(Some(value)) => value,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Cache read failed for {}: {}", key, e);
                return None;
            }
        };

        match serde_json::from_value(value) {
            Ok(weather) => Some(weather),
            Err(e) => {
                tracing::warn!("Discarding unreadable cache entry {}: {}", key, e);
                self.delete(key).await;
                None
            }
        }
    }

    pub async fn set(&self, key: &LocationKey, weather: &WeatherResult, ttl: Duration) {
        let value = match serde_json::to_value(weather) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Cannot serialize weather for cache {}: {}", key, e);
                return;
            }
        };
        if let Err(e) = self.store.set(key.as_str(), value, ttl).await {
            tracing::warn!("Cache write failed for {}: {}", key, e);
        }
    }

    pub async fn delete(&self, key: &LocationKey) {
        if let Err(e) = self.store.delete(key.as_str()).await {
            tracing::warn!("Cache delete failed for {}: {}", key, e);
        }
    }

    /// Drop expired entries from the backing store. Returns how many went.
    pub async fn purge_expired(&self) -> u64 {
        match self.store.purge_expired().await {
            Ok(removed) => {
                if removed > 0 {
                    tracing::debug!("Swept {} expired cache entries", removed);
                }
                removed
            }
            Err(e) => {
                tracing::warn!("Cache sweep failed: {}", e);
                0
            }
        }
    }
}

/// Sweep expired entries every `every`, forever.
///
/// Should be spawned via `tokio::spawn(run_cache_sweeper(...))`.
pub async fn run_cache_sweeper(cache: ResultCache, every: Duration) {
    loop {
        tokio::time::sleep(every).await;
        cache.purge_expired().await;
    }
}
