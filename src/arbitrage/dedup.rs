//! Bounded seen-set for published opportunities
//!
//! An opportunity hashes to its token, its pools and its net profit rounded down to a
//! $10 bucket, so small reserve drift does not re-announce the same trade. When the set
//! is full it is cleared in one go before the next insert.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;
use std::collections::HashSet;
use tokio::sync::Mutex;
use tracing::debug;
use crate::types::ArbitrageOpportunity;

pub const DEFAULT_MAX_CACHED_HASHES: usize = 1000;

const PROFIT_BUCKET_USD: Decimal = dec!(10);

pub fn opportunity_hash(opportunity: &ArbitrageOpportunity) -> String {
    let pools: Vec<String> = opportunity
        .pool_addresses()
        .iter()
        .map(|address| address.to_string())
        .collect();
    let bucket = (opportunity.net_profit_usd() / PROFIT_BUCKET_USD)
        .floor()
        .checked_mul(PROFIT_BUCKET_USD)
        .and_then(|bucket| bucket.to_i64())
        .unwrap_or_default();
    format!("{}:{}:{}", opportunity.token_address, pools.join(","), bucket)
}

pub struct OpportunityDeduplicator {
    seen: Mutex<HashSet<String>>,
    max_entries: usize,
}

impl OpportunityDeduplicator {
    pub fn new(max_entries: usize) -> Self {
        Self {
            seen: Mutex::new(HashSet::new()),
            max_entries: max_entries.max(1),
        }
    }

    pub async fn is_new(&self, opportunity: &ArbitrageOpportunity) -> bool {
        !self.seen.lock().await.contains(&opportunity_hash(opportunity))
    }

    /// Keeps opportunities not yet seen, dropping repeats within the batch too. Nothing
    /// is recorded; call [`commit`](Self::commit) once they have been published.
    pub async fn filter_new(&self, opportunities: Vec<ArbitrageOpportunity>) -> Vec<ArbitrageOpportunity> {
        let seen = self.seen.lock().await;
        let mut batch = HashSet::new();
        opportunities
            .into_iter()
            .filter(|opportunity| {
                let hash = opportunity_hash(opportunity);
                !seen.contains(&hash) && batch.insert(hash)
            })
            .collect()
    }

    pub async fn commit(&self, opportunities: &[ArbitrageOpportunity]) {
        let mut seen = self.seen.lock().await;
        for opportunity in opportunities {
            if seen.len() >= self.max_entries {
                debug!("Opportunity seen-set reached {} entries, clearing", seen.len());
                seen.clear();
            }
            seen.insert(opportunity_hash(opportunity));
        }
    }

    pub async fn len(&self) -> usize {
        self.seen.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.seen.lock().await.is_empty()
    }

    pub async fn clear(&self) {
        self.seen.lock().await.clear();
    }
}

impl Default for OpportunityDeduplicator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CACHED_HASHES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ArbitrageKind, ArbitrageLeg};
    use alloy::primitives::Address;
    use chrono::Utc;

    fn opportunity(pool_byte: u8, profit: Decimal) -> ArbitrageOpportunity {
        let leg = |pool: u8| ArbitrageLeg {
            pool_address: Address::repeat_byte(pool),
            venue: "test".to_string(),
            token_in: Address::repeat_byte(0x01),
            token_out: Address::repeat_byte(0x02),
            rate: dec!(1),
            liquidity_usd: dec!(100_000),
        };
        ArbitrageOpportunity {
            id: uuid::Uuid::new_v4().to_string(),
            kind: ArbitrageKind::Direct,
            token_address: Address::repeat_byte(0x02),
            token_symbol: "TKN".to_string(),
            path: vec![leg(pool_byte), leg(pool_byte + 1)],
            buy_price: dec!(1),
            sell_price: dec!(1.01),
            optimal_input_amount: dec!(1),
            input_value_usd: dec!(1000),
            expected_profit_usd: profit,
            estimated_gas_cost_usd: Decimal::ZERO,
            confidence_score: 70,
            detected_at: Utc::now(),
        }
    }

    #[test]
    fn hash_buckets_net_profit_by_ten_dollars() {
        let a = opportunity_hash(&opportunity(0xa0, dec!(21.5)));
        let b = opportunity_hash(&opportunity(0xa0, dec!(29.9)));
        let c = opportunity_hash(&opportunity(0xa0, dec!(30.1)));
        assert_eq!(a, b);
        assert_ne!(b, c);
        assert!(a.ends_with(":20"));
    }

    #[tokio::test]
    async fn committed_opportunities_are_not_new() {
        let dedup = OpportunityDeduplicator::default();
        let first = opportunity(0xa0, dec!(25));
        assert!(dedup.is_new(&first).await);

        dedup.commit(std::slice::from_ref(&first)).await;
        let repeat = opportunity(0xa0, dec!(27));
        assert!(!dedup.is_new(&repeat).await);
        assert!(dedup.filter_new(vec![repeat]).await.is_empty());
    }

    #[tokio::test]
    async fn filtering_drops_repeats_within_a_batch() {
        let dedup = OpportunityDeduplicator::default();
        let kept = dedup
            .filter_new(vec![opportunity(0xa0, dec!(5)), opportunity(0xa0, dec!(6)), opportunity(0xb0, dec!(5))])
            .await;
        assert_eq!(kept.len(), 2);
        assert!(dedup.is_empty().await);
    }

    #[tokio::test]
    async fn full_set_is_cleared_before_insert() {
        let dedup = OpportunityDeduplicator::new(2);
        dedup
            .commit(&[opportunity(0xa0, dec!(1)), opportunity(0xb0, dec!(1))])
            .await;
        assert_eq!(dedup.len().await, 2);

        dedup.commit(&[opportunity(0xc0, dec!(1))]).await;
        assert_eq!(dedup.len().await, 1);
        assert!(dedup.is_new(&opportunity(0xa0, dec!(1))).await);
    }
}
