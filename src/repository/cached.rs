//! Cache-then-store decorators over the repository contracts

use alloy::primitives::Address;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;
use super::{Cache, PoolRepository, TokenRepository, get_cached, set_cached};
use crate::{
    errors::EngineResult,
    types::{Pool, Token},
};

pub struct CachedPoolRepository {
    inner: Arc<dyn PoolRepository>,
    cache: Arc<dyn Cache>,
    ttl: Duration,
}

impl CachedPoolRepository {
    pub fn new(inner: Arc<dyn PoolRepository>, cache: Arc<dyn Cache>, ttl: Duration) -> Self {
        Self { inner, cache, ttl }
    }
}

#[async_trait]
impl PoolRepository for CachedPoolRepository {
    async fn get_all_by_chain_id(&self, chain_id: u64) -> EngineResult<Vec<Pool>> {
        let key = format!("pools:chain:{}", chain_id);
        if let Some(pools) = get_cached::<Vec<Pool>>(self.cache.as_ref(), &key).await {
            trace!("Pool cache hit for {}", key);
            return Ok(pools);
        }
        let pools = self.inner.get_all_by_chain_id(chain_id).await?;
        set_cached(self.cache.as_ref(), &key, &pools, self.ttl).await;
        Ok(pools)
    }

    async fn get_pools_by_token(&self, token: Address, chain_id: u64) -> EngineResult<Vec<Pool>> {
        let key = format!("pools:token:{}:{}", chain_id, token);
        if let Some(pools) = get_cached::<Vec<Pool>>(self.cache.as_ref(), &key).await {
            trace!("Pool cache hit for {}", key);
            return Ok(pools);
        }
        let pools = self.inner.get_pools_by_token(token, chain_id).await?;
        set_cached(self.cache.as_ref(), &key, &pools, self.ttl).await;
        Ok(pools)
    }

    async fn get_by_address(&self, address: Address, chain_id: u64) -> EngineResult<Option<Pool>> {
        let key = format!("pool:{}:{}", chain_id, address);
        if let Some(pool) = get_cached::<Pool>(self.cache.as_ref(), &key).await {
            return Ok(Some(pool));
        }
        let pool = self.inner.get_by_address(address, chain_id).await?;
        // misses are not cached so a newly indexed pool shows up on the next call
        if let Some(found) = &pool {
            set_cached(self.cache.as_ref(), &key, found, self.ttl).await;
        }
        Ok(pool)
    }
}

pub struct CachedTokenRepository {
    inner: Arc<dyn TokenRepository>,
    cache: Arc<dyn Cache>,
    ttl: Duration,
}

impl CachedTokenRepository {
    pub fn new(inner: Arc<dyn TokenRepository>, cache: Arc<dyn Cache>, ttl: Duration) -> Self {
        Self { inner, cache, ttl }
    }
}

#[async_trait]
impl TokenRepository for CachedTokenRepository {
    async fn get_token(&self, address: Address, chain_id: u64) -> EngineResult<Option<Token>> {
        let key = format!("token:{}:{}", chain_id, address);
        if let Some(token) = get_cached::<Token>(self.cache.as_ref(), &key).await {
            return Ok(Some(token));
        }
        let token = self.inner.get_token(address, chain_id).await?;
        if let Some(found) = &token {
            set_cached(self.cache.as_ref(), &key, found, self.ttl).await;
        }
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{InMemoryStore, MemoryCache};
    use alloy::primitives::U256;
    use rust_decimal::Decimal;

    fn pool(reserve: u64) -> Pool {
        Pool {
            address: Address::repeat_byte(0xa1),
            factory: Address::ZERO,
            chain_id: 8453,
            venue: "test".to_string(),
            token0: Address::repeat_byte(1),
            token1: Address::repeat_byte(2),
            reserve0: U256::from(reserve),
            reserve1: U256::from(reserve),
            fee_bps: 30,
            volume_24h_usd: Decimal::ZERO,
        }
    }

    #[tokio::test]
    async fn serves_cached_snapshot_within_ttl() {
        let store = Arc::new(InMemoryStore::new());
        store.upsert_pool(pool(100)).await.unwrap();
        let repo = CachedPoolRepository::new(store.clone(), Arc::new(MemoryCache::new()), Duration::from_secs(60));

        let first = repo.get_all_by_chain_id(8453).await.unwrap();
        store.upsert_pool(pool(200)).await.unwrap();
        let second = repo.get_all_by_chain_id(8453).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(second[0].reserve0, U256::from(100u64));
    }

    #[tokio::test]
    async fn misses_fall_through_to_the_store() {
        let store = Arc::new(InMemoryStore::new());
        let repo = CachedPoolRepository::new(store.clone(), Arc::new(MemoryCache::new()), Duration::from_secs(60));
        let address = Address::repeat_byte(0xa1);

        assert!(repo.get_by_address(address, 8453).await.unwrap().is_none());
        store.upsert_pool(pool(100)).await.unwrap();
        assert!(repo.get_by_address(address, 8453).await.unwrap().is_some());
    }
}
