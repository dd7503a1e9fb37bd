//! Events handed to the external outbox

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use super::ArbitrageOpportunity;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrageOpportunityDetected {
    pub opportunity_id: String,
    pub token_address: Address,
    pub token_symbol: String,
    pub spread_percent: Decimal,
    pub expected_profit_usd: Decimal,
    pub net_profit_usd: Decimal,
    pub path_length: usize,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LargeArbitrageAlert {
    pub opportunity_id: String,
    pub token_address: Address,
    pub token_symbol: String,
    pub spread_percent: Decimal,
    pub net_profit_usd: Decimal,
    pub confidence_score: u8,
    pub pool_addresses: Vec<Address>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignificantPriceChange {
    pub token_address: Address,
    pub quote_symbol: String,
    pub old_price: Decimal,
    pub new_price: Decimal,
    pub price_change_percent: Decimal,
    pub time_period_secs: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DomainEvent {
    ArbitrageOpportunityDetected(ArbitrageOpportunityDetected),
    LargeArbitrageAlert(LargeArbitrageAlert),
    SignificantPriceChange(SignificantPriceChange),
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::ArbitrageOpportunityDetected(_) => "ArbitrageOpportunityDetected",
            DomainEvent::LargeArbitrageAlert(_) => "LargeArbitrageAlert",
            DomainEvent::SignificantPriceChange(_) => "SignificantPriceChange",
        }
    }
}

impl From<&ArbitrageOpportunity> for ArbitrageOpportunityDetected {
    fn from(opp: &ArbitrageOpportunity) -> Self {
        Self {
            opportunity_id: opp.id.clone(),
            token_address: opp.token_address,
            token_symbol: opp.token_symbol.clone(),
            spread_percent: opp.spread_percent(),
            expected_profit_usd: opp.expected_profit_usd,
            net_profit_usd: opp.net_profit_usd(),
            path_length: opp.path_length(),
            occurred_at: Utc::now(),
        }
    }
}

impl From<&ArbitrageOpportunity> for LargeArbitrageAlert {
    fn from(opp: &ArbitrageOpportunity) -> Self {
        Self {
            opportunity_id: opp.id.clone(),
            token_address: opp.token_address,
            token_symbol: opp.token_symbol.clone(),
            spread_percent: opp.spread_percent(),
            net_profit_usd: opp.net_profit_usd(),
            confidence_score: opp.confidence_score,
            pool_addresses: opp.pool_addresses(),
            occurred_at: Utc::now(),
        }
    }
}
