//! In-memory store loaded from a JSON snapshot of pools, tokens and price history

use alloy::primitives::Address;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::info;
use super::{PoolRepository, PriceHistoryRepository, TokenRepository};
use crate::{
    errors::EngineResult,
    types::{Pool, PricePoint, PriceRecord, Token},
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub tokens: Vec<Token>,
    #[serde(default)]
    pub pools: Vec<Pool>,
    #[serde(default)]
    pub price_history: Vec<PriceRecord>,
}

#[derive(Default)]
pub struct InMemoryStore {
    tokens: RwLock<HashMap<(u64, Address), Token>>,
    pools: RwLock<HashMap<(u64, Address), Pool>>,
    history: RwLock<Vec<PriceRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: Snapshot) -> EngineResult<Self> {
        let mut tokens = HashMap::new();
        for token in snapshot.tokens {
            token.validate()?;
            tokens.insert((token.chain_id, token.address), token);
        }

        let mut pools = HashMap::new();
        for pool in snapshot.pools {
            pool.validate()?;
            pools.insert((pool.chain_id, pool.address), pool);
        }

        let mut history = snapshot.price_history;
        history.sort_by_key(|record| record.timestamp);

        Ok(Self {
            tokens: RwLock::new(tokens),
            pools: RwLock::new(pools),
            history: RwLock::new(history),
        })
    }

    pub fn load_snapshot(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
        let snapshot: Snapshot = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse snapshot {}", path.display()))?;

        info!(
            tokens = snapshot.tokens.len(),
            pools = snapshot.pools.len(),
            price_samples = snapshot.price_history.len(),
            "Loaded pool snapshot from {}", path.display()
        );

        Self::from_snapshot(snapshot).map_err(|e| anyhow::anyhow!("Invalid snapshot: {}", e))
    }

    pub async fn upsert_token(&self, token: Token) -> EngineResult<()> {
        token.validate()?;
        self.tokens.write().await.insert((token.chain_id, token.address), token);
        Ok(())
    }

    /// Applies a reserve update; the whole pool row is replaced.
    pub async fn upsert_pool(&self, pool: Pool) -> EngineResult<()> {
        pool.validate()?;
        self.pools.write().await.insert((pool.chain_id, pool.address), pool);
        Ok(())
    }

    pub async fn record_price(&self, record: PriceRecord) {
        let mut history = self.history.write().await;
        let position = history.partition_point(|existing| existing.timestamp <= record.timestamp);
        history.insert(position, record);
    }

    async fn samples(
        &self,
        token: Address,
        quote: Address,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<PricePoint> {
        self.history
            .read()
            .await
            .iter()
            .filter(|r| r.token_address == token && r.quote_token_address == quote)
            .filter(|r| r.timestamp >= from && r.timestamp <= to)
            .map(|r| PricePoint::new(r.price, r.timestamp))
            .collect()
    }
}

#[async_trait]
impl PoolRepository for InMemoryStore {
    async fn get_all_by_chain_id(&self, chain_id: u64) -> EngineResult<Vec<Pool>> {
        let mut pools: Vec<Pool> = self
            .pools
            .read()
            .await
            .values()
            .filter(|pool| pool.chain_id == chain_id)
            .cloned()
            .collect();
        pools.sort_by_key(|pool| pool.address);
        Ok(pools)
    }

    async fn get_pools_by_token(&self, token: Address, chain_id: u64) -> EngineResult<Vec<Pool>> {
        let mut pools: Vec<Pool> = self
            .pools
            .read()
            .await
            .values()
            .filter(|pool| pool.chain_id == chain_id && pool.contains(&token))
            .cloned()
            .collect();
        pools.sort_by_key(|pool| pool.address);
        Ok(pools)
    }

    async fn get_by_address(&self, address: Address, chain_id: u64) -> EngineResult<Option<Pool>> {
        Ok(self.pools.read().await.get(&(chain_id, address)).cloned())
    }
}

#[async_trait]
impl TokenRepository for InMemoryStore {
    async fn get_token(&self, address: Address, chain_id: u64) -> EngineResult<Option<Token>> {
        Ok(self.tokens.read().await.get(&(chain_id, address)).cloned())
    }
}

#[async_trait]
impl PriceHistoryRepository for InMemoryStore {
    async fn get_for_twap(
        &self,
        token: Address,
        quote: Address,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> EngineResult<Vec<PricePoint>> {
        Ok(self.samples(token, quote, from, to).await)
    }

    async fn get_by_token(
        &self,
        token: Address,
        quote: Address,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: usize,
    ) -> EngineResult<Vec<PricePoint>> {
        let mut samples = self.samples(token, quote, from, to).await;
        // keep the most recent `limit` samples
        if samples.len() > limit {
            samples.drain(..samples.len() - limit);
        }
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::U256;
    use chrono::Duration;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn pool(address: u8, token0: u8, token1: u8, chain_id: u64) -> Pool {
        Pool {
            address: Address::repeat_byte(address),
            factory: Address::ZERO,
            chain_id,
            venue: "test".to_string(),
            token0: Address::repeat_byte(token0),
            token1: Address::repeat_byte(token1),
            reserve0: U256::from(1u8),
            reserve1: U256::from(1u8),
            fee_bps: 30,
            volume_24h_usd: Decimal::ZERO,
        }
    }

    #[tokio::test]
    async fn pools_are_chain_scoped() {
        let store = InMemoryStore::new();
        store.upsert_pool(pool(0xa1, 1, 2, 8453)).await.unwrap();
        store.upsert_pool(pool(0xa2, 1, 3, 8453)).await.unwrap();
        store.upsert_pool(pool(0xa3, 1, 2, 1)).await.unwrap();

        let repo: &dyn PoolRepository = &store;
        assert_eq!(repo.get_all_by_chain_id(8453).await.unwrap().len(), 2);
        assert_eq!(repo.get_pools_by_token(Address::repeat_byte(2), 8453).await.unwrap().len(), 1);
        assert!(repo.get_by_address(Address::repeat_byte(0xa3), 8453).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rejects_pool_with_identical_sides() {
        let store = InMemoryStore::new();
        let err = store.upsert_pool(pool(0xa1, 1, 1, 8453)).await.unwrap_err();
        assert_eq!(err.code(), "Validation.InvalidArgument");
    }

    #[tokio::test]
    async fn history_is_windowed_and_limited_to_latest() {
        let store = InMemoryStore::new();
        let token = Address::repeat_byte(1);
        let quote = Address::repeat_byte(2);
        let now = Utc::now();
        for minutes in [50, 10, 30, 90] {
            store
                .record_price(PriceRecord {
                    token_address: token,
                    quote_token_address: quote,
                    price: Decimal::from(minutes),
                    timestamp: now - Duration::minutes(minutes),
                })
                .await;
        }

        let repo: &dyn PriceHistoryRepository = &store;
        let window = repo.get_for_twap(token, quote, now - Duration::minutes(60), now).await.unwrap();
        let prices: Vec<Decimal> = window.iter().map(|p| p.price).collect();
        assert_eq!(prices, vec![dec!(50), dec!(30), dec!(10)]);

        let latest = repo.get_by_token(token, quote, now - Duration::hours(2), now, 2).await.unwrap();
        let prices: Vec<Decimal> = latest.iter().map(|p| p.price).collect();
        assert_eq!(prices, vec![dec!(30), dec!(10)]);
    }

    #[test]
    fn snapshot_rejects_invalid_decimals() {
        let snapshot = Snapshot {
            tokens: vec![Token {
                address: Address::repeat_byte(1),
                symbol: "BAD".to_string(),
                decimals: 24,
                chain_id: 8453,
                is_placeholder: false,
            }],
            ..Snapshot::default()
        };
        assert!(InMemoryStore::from_snapshot(snapshot).is_err());
    }
}
