//! Confidence scoring for detected opportunities

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;

const BASE_SCORE: i32 = 50;

/// Starts at 50 and moves with the thinner pool's USD depth and the spread size.
/// Wide spreads lose points.
pub fn confidence_score(liquidity_buy_usd: Decimal, liquidity_sell_usd: Decimal, spread_percent: Decimal) -> u8 {
    let min_liquidity = liquidity_buy_usd.min(liquidity_sell_usd);
    let mut score = BASE_SCORE;

    if min_liquidity > dec!(1_000_000) {
        score += 20;
    } else if min_liquidity > dec!(100_000) {
        score += 10;
    } else if min_liquidity < dec!(10_000) {
        score -= 20;
    }

    if spread_percent > dec!(10) {
        score -= 20;
    } else if spread_percent > dec!(5) {
        score -= 10;
    } else if spread_percent < dec!(2) {
        score += 10;
    }

    score.clamp(0, 100).to_u8().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn deep_pools_with_tight_spread_score_highest() {
        assert_eq!(confidence_score(dec!(2_000_000), dec!(5_000_000), dec!(1)), 80);
    }

    #[test]
    fn shallow_pools_with_wide_spread_score_lowest() {
        assert_eq!(confidence_score(dec!(5_000), dec!(2_000_000), dec!(12)), 10);
    }

    #[test]
    fn mid_range_adjustments() {
        assert_eq!(confidence_score(dec!(500_000), dec!(500_000), dec!(3)), 60);
        assert_eq!(confidence_score(dec!(50_000), dec!(50_000), dec!(6)), 40);
        assert_eq!(confidence_score(dec!(1_000_000), dec!(1_000_000), dec!(2)), 60);
    }

    proptest! {
        #[test]
        fn score_stays_in_range(
            buy in 0u64..10_000_000_000,
            sell in 0u64..10_000_000_000,
            spread_bps in 0u64..100_000,
        ) {
            let spread = Decimal::from(spread_bps) / dec!(100);
            let score = confidence_score(Decimal::from(buy), Decimal::from(sell), spread);
            prop_assert!(score <= 100);
            prop_assert!(score >= 10);
        }
    }
}
