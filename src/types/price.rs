//! Derived price values

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPrice {
    pub token_address: Address,
    pub quote_token_address: Address,
    pub quote_symbol: String,
    pub price: Decimal,
    /// `None` when the quote token itself has no USD route.
    pub price_usd: Option<Decimal>,
    /// `None` for the identity price (token quoted in itself).
    pub source_pool_address: Option<Address>,
    /// Quote-denominated depth of the source pool (both sides).
    pub liquidity: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl PricePoint {
    pub fn new(price: Decimal, timestamp: DateTime<Utc>) -> Self {
        Self { price, timestamp }
    }
}

/// A stored history row; the price-history repository filters on token and quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub token_address: Address,
    pub quote_token_address: Address,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwapResult {
    pub token_address: Address,
    pub quote_symbol: String,
    pub twap: Decimal,
    pub spot_price: Decimal,
    pub deviation_percent: Decimal,
    pub data_points: usize,
    pub period_secs: i64,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
}
