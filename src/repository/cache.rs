//! Best-effort TTL cache
//!
//! A miss, an expired entry or a value that no longer deserializes all read as
//! absent; nothing here is allowed to fail the caller.

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

#[async_trait]
pub trait Cache: Send + Sync {
    async fn get_value(&self, key: &str) -> Option<Value>;

    async fn set_value(&self, key: &str, value: Value, ttl: Duration);
}

pub async fn get_cached<T: DeserializeOwned>(cache: &dyn Cache, key: &str) -> Option<T> {
    let value = cache.get_value(key).await?;
    match serde_json::from_value(value) {
        Ok(typed) => Some(typed),
        Err(e) => {
            debug!("Discarding unreadable cache entry {}: {}", key, e);
            None
        }
    }
}

pub async fn set_cached<T: Serialize>(cache: &dyn Cache, key: &str, value: &T, ttl: Duration) {
    match serde_json::to_value(value) {
        Ok(json) => cache.set_value(key, json, ttl).await,
        Err(e) => debug!("Skipping cache write for {}: {}", key, e),
    }
}

struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    /// An expired entry is evicted by the read that finds it.
    async fn get_value(&self, key: &str) -> Option<Value> {
        {
            let entries = self.entries.read().await;
            let entry = entries.get(key)?;
            if entry.expires_at > Instant::now() {
                return Some(entry.value.clone());
            }
        }

        let mut entries = self.entries.write().await;
        // a writer may have refreshed the key between the two locks
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    async fn set_value(&self, key: &str, value: Value, ttl: Duration) {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn typed_round_trip_until_expiry() {
        let cache = MemoryCache::new();
        set_cached(&cache, "price", &dec!(2000.5), Duration::from_millis(20)).await;

        let hit: Option<Decimal> = get_cached(&cache, "price").await;
        assert_eq!(hit, Some(dec!(2000.5)));

        tokio::time::sleep(Duration::from_millis(30)).await;
        let miss: Option<Decimal> = get_cached(&cache, "price").await;
        assert!(miss.is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn purge_drops_only_expired_entries() {
        let cache = MemoryCache::new();
        set_cached(&cache, "short", &1u32, Duration::from_millis(10)).await;
        set_cached(&cache, "long", &2u32, Duration::from_secs(60)).await;

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.purge_expired().await, 1);
        assert_eq!(cache.len().await, 1);
        assert_eq!(get_cached::<u32>(&cache, "long").await, Some(2));
    }

    #[tokio::test]
    async fn wrong_shape_reads_as_miss() {
        let cache = MemoryCache::new();
        set_cached(&cache, "key", &"not a list", Duration::from_secs(5)).await;
        let value: Option<Vec<u32>> = get_cached(&cache, "key").await;
        assert!(value.is_none());
    }
}
