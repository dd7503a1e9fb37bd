//! Arbitrage opportunity types

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArbitrageKind {
    Direct,
    Triangular,
}

/// One swap of a trade path. `rate` is the spot amount of `token_out` per `token_in`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrageLeg {
    pub pool_address: Address,
    pub venue: String,
    pub token_in: Address,
    pub token_out: Address,
    pub rate: Decimal,
    pub liquidity_usd: Decimal,
}

/// A detected opportunity. Spread, net profit, ROI and profitability are derived from
/// the stored prices and costs and cannot be set independently. A derived ratio that
/// leaves `Decimal` range reads as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrageOpportunity {
    pub id: String,
    pub kind: ArbitrageKind,
    pub token_address: Address,
    pub token_symbol: String,
    pub path: Vec<ArbitrageLeg>,
    pub buy_price: Decimal,
    pub sell_price: Decimal,
    /// Input size in units of the first leg's `token_in`.
    pub optimal_input_amount: Decimal,
    pub input_value_usd: Decimal,
    pub expected_profit_usd: Decimal,
    pub estimated_gas_cost_usd: Decimal,
    pub confidence_score: u8,
    pub detected_at: DateTime<Utc>,
}

impl ArbitrageOpportunity {
    pub fn spread_percent(&self) -> Decimal {
        if self.buy_price.is_zero() {
            return Decimal::ZERO;
        }
        self.sell_price
            .checked_sub(self.buy_price)
            .and_then(|gap| gap.checked_div(self.buy_price))
            .and_then(|ratio| ratio.checked_mul(dec!(100)))
            .unwrap_or(Decimal::ZERO)
    }

    pub fn net_profit_usd(&self) -> Decimal {
        self.expected_profit_usd.saturating_sub(self.estimated_gas_cost_usd)
    }

    pub fn roi_percent(&self) -> Decimal {
        if self.input_value_usd.is_zero() {
            return Decimal::ZERO;
        }
        self.net_profit_usd()
            .checked_div(self.input_value_usd)
            .and_then(|ratio| ratio.checked_mul(dec!(100)))
            .unwrap_or(Decimal::ZERO)
    }

    pub fn is_profitable(&self) -> bool {
        self.net_profit_usd() > Decimal::ZERO
    }

    pub fn pool_addresses(&self) -> Vec<Address> {
        self.path.iter().map(|leg| leg.pool_address).collect()
    }

    pub fn path_length(&self) -> usize {
        self.path.len()
    }
}

/// Ad-hoc sizing answer for two named pools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimalTrade {
    pub buy_pool: Address,
    pub sell_pool: Address,
    pub token_address: Address,
    pub quote_token_address: Address,
    pub buy_price: Decimal,
    pub sell_price: Decimal,
    pub spread_percent: Decimal,
    /// Quote-token amount to spend on the buy side.
    pub optimal_input: Decimal,
    /// Target tokens received from the buy pool, fees and curve included.
    pub expected_intermediate_out: Decimal,
    /// Quote tokens received back from the sell pool, fees and curve included.
    pub expected_output: Decimal,
    /// First-order profit at spot prices, in quote units.
    pub expected_profit: Decimal,
    /// `expected_output - optimal_input`.
    pub simulated_profit: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opportunity(buy: Decimal, sell: Decimal, profit: Decimal, gas: Decimal) -> ArbitrageOpportunity {
        ArbitrageOpportunity {
            id: "test".to_string(),
            kind: ArbitrageKind::Direct,
            token_address: Address::repeat_byte(0x01),
            token_symbol: "TKN".to_string(),
            path: Vec::new(),
            buy_price: buy,
            sell_price: sell,
            optimal_input_amount: dec!(1),
            input_value_usd: dec!(200),
            expected_profit_usd: profit,
            estimated_gas_cost_usd: gas,
            confidence_score: 50,
            detected_at: Utc::now(),
        }
    }

    #[test]
    fn derived_fields_follow_prices_and_costs() {
        let opp = opportunity(dec!(0.001), dec!(0.00101), dec!(2), dec!(0.06));
        assert_eq!(opp.spread_percent(), dec!(1));
        assert_eq!(opp.net_profit_usd(), dec!(1.94));
        assert_eq!(opp.roi_percent(), dec!(0.97));
        assert!(opp.is_profitable());
    }

    #[test]
    fn gas_above_profit_is_unprofitable() {
        let opp = opportunity(dec!(1), dec!(1.01), dec!(2), dec!(50));
        assert!(!opp.is_profitable());
        assert!(opp.net_profit_usd() < Decimal::ZERO);
    }

    #[test]
    fn extreme_prices_read_as_zero_spread() {
        let mut opp = opportunity(Decimal::new(1, 28), Decimal::MAX, Decimal::MAX, -Decimal::MAX);
        opp.input_value_usd = Decimal::new(1, 28);
        assert_eq!(opp.spread_percent(), Decimal::ZERO);
        assert_eq!(opp.net_profit_usd(), Decimal::MAX);
        assert_eq!(opp.roi_percent(), Decimal::ZERO);
    }
}
