//! Liquidity risk types

use alloy::primitives::Address;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityMetrics {
    pub pool_address: Address,
    pub token0: Address,
    pub token1: Address,
    pub reserve0: Decimal,
    pub reserve1: Decimal,
    pub reserve0_usd: Decimal,
    pub reserve1_usd: Decimal,
    pub tvl_usd: Decimal,
    pub volume_24h_usd: Decimal,
    pub fee_percent: Decimal,
    pub fees_24h_usd: Decimal,
    pub apr_percent: Decimal,
    pub depth_score: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpermanentLossResult {
    pub initial_price_ratio: Decimal,
    pub current_price_ratio: Decimal,
    pub price_change_percent: Decimal,
    /// Never positive.
    pub impermanent_loss_percent: Decimal,
    pub hodl_value_usd: Decimal,
    pub lp_value_usd: Decimal,
    pub difference_usd: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConcentrationLevel {
    NoLiquidity,
    Low,
    Medium,
    High,
}

impl ConcentrationLevel {
    pub const MEDIUM_THRESHOLD: Decimal = dec!(0.15);
    pub const HIGH_THRESHOLD: Decimal = dec!(0.25);

    pub fn from_hhi(hhi: Decimal, pool_count: usize) -> Self {
        match hhi {
            _ if pool_count == 0 || hhi <= Decimal::ZERO => ConcentrationLevel::NoLiquidity,
            h if h < Self::MEDIUM_THRESHOLD => ConcentrationLevel::Low,
            h if h < Self::HIGH_THRESHOLD => ConcentrationLevel::Medium,
            _ => ConcentrationLevel::High,
        }
    }
}

impl fmt::Display for ConcentrationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConcentrationLevel::NoLiquidity => "No Liquidity",
            ConcentrationLevel::Low => "Low",
            ConcentrationLevel::Medium => "Medium",
            ConcentrationLevel::High => "High",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolLiquiditySummary {
    pub pool_address: Address,
    pub venue: String,
    pub paired_token: Address,
    pub tvl_usd: Decimal,
    pub volume_24h_usd: Decimal,
    pub depth_score: u8,
    pub share_percent: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenLiquiditySummary {
    pub token_address: Address,
    pub token_symbol: String,
    pub pool_count: usize,
    pub total_liquidity_usd: Decimal,
    pub total_volume_24h_usd: Decimal,
    pub hhi: Decimal,
    pub concentration: ConcentrationLevel,
    pub pools: Vec<PoolLiquiditySummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityConcentration {
    pub token_address: Address,
    pub pool_count: usize,
    pub hhi: Decimal,
    pub concentration: ConcentrationLevel,
}

impl From<&TokenLiquiditySummary> for LiquidityConcentration {
    fn from(summary: &TokenLiquiditySummary) -> Self {
        Self {
            token_address: summary.token_address,
            pool_count: summary.pool_count,
            hhi: summary.hhi,
            concentration: summary.concentration,
        }
    }
}
