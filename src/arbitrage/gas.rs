//! Gas cost estimation for multi-leg swaps

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

pub const BASE_GAS_PER_SWAP: u64 = 150_000;

/// Charged when no ETH/USD price is available.
pub const FALLBACK_GAS_COST_USD: Decimal = dec!(50);

const GWEI_PER_ETH: Decimal = dec!(1_000_000_000);

pub fn gas_cost_eth(legs: usize, gas_price_gwei: Decimal) -> Decimal {
    let gas_units = Decimal::from(BASE_GAS_PER_SWAP) * Decimal::from(legs as u64);
    gas_units.saturating_mul(gas_price_gwei) / GWEI_PER_ETH
}

/// Saturates at `Decimal::MAX` when a dust ETH/USD pool reports an absurd price.
pub fn gas_cost_usd(legs: usize, gas_price_gwei: Decimal, eth_usd: Option<Decimal>) -> Decimal {
    match eth_usd {
        Some(eth_usd) if eth_usd > Decimal::ZERO => gas_cost_eth(legs, gas_price_gwei).saturating_mul(eth_usd),
        _ => FALLBACK_GAS_COST_USD,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_legs_on_l2_cost_cents() {
        // 300k gas at 0.1 gwei = 0.00003 ETH
        assert_eq!(gas_cost_eth(2, dec!(0.1)), dec!(0.00003));
        assert_eq!(gas_cost_usd(2, dec!(0.1), Some(dec!(2000))), dec!(0.06));
    }

    #[test]
    fn scales_with_leg_count() {
        let two = gas_cost_usd(2, dec!(1), Some(dec!(2000)));
        let three = gas_cost_usd(3, dec!(1), Some(dec!(2000)));
        assert_eq!(three * dec!(2), two * dec!(3));
    }

    #[test]
    fn falls_back_without_eth_price() {
        assert_eq!(gas_cost_usd(2, dec!(0.1), None), FALLBACK_GAS_COST_USD);
        assert_eq!(gas_cost_usd(2, dec!(0.1), Some(Decimal::ZERO)), FALLBACK_GAS_COST_USD);
    }

    #[test]
    fn absurd_eth_price_saturates() {
        assert_eq!(gas_cost_usd(2, dec!(0.1), Some(Decimal::MAX)), Decimal::MAX);
    }
}
