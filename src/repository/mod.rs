//! Read-only contracts for pool, token and price-history state
//!
//! Each contract has a direct store implementation ([`memory::InMemoryStore`]) and a
//! cache-then-store decorator ([`cached`]); callers compose them explicitly.

pub mod cache;
pub mod cached;
pub mod memory;

pub use cache::*;
pub use cached::*;
pub use memory::*;

use alloy::primitives::Address;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crate::{
    errors::EngineResult,
    types::{Pool, PricePoint, Token},
};

#[async_trait]
pub trait PoolRepository: Send + Sync {
    async fn get_all_by_chain_id(&self, chain_id: u64) -> EngineResult<Vec<Pool>>;

    async fn get_pools_by_token(&self, token: Address, chain_id: u64) -> EngineResult<Vec<Pool>>;

    async fn get_by_address(&self, address: Address, chain_id: u64) -> EngineResult<Option<Pool>>;
}

#[async_trait]
pub trait TokenRepository: Send + Sync {
    async fn get_token(&self, address: Address, chain_id: u64) -> EngineResult<Option<Token>>;
}

/// Samples come back ordered by timestamp, oldest first.
#[async_trait]
pub trait PriceHistoryRepository: Send + Sync {
    async fn get_for_twap(
        &self,
        token: Address,
        quote: Address,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> EngineResult<Vec<PricePoint>>;

    async fn get_by_token(
        &self,
        token: Address,
        quote: Address,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: usize,
    ) -> EngineResult<Vec<PricePoint>>;
}
