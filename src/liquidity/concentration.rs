//! Market share concentration across a token's pools

use rust_decimal::Decimal;

fn checked_total(values: &[Decimal]) -> Option<Decimal> {
    values.iter().try_fold(Decimal::ZERO, |sum, value| sum.checked_add(*value))
}

/// Each entry's fraction of the total. Empty when the total is zero. Entries whose
/// sum overflows are scaled down by their count first.
pub fn market_shares(liquidities: &[Decimal]) -> Vec<Decimal> {
    let scaled: Vec<Decimal>;
    let (values, total) = match checked_total(liquidities) {
        Some(total) => (liquidities, total),
        None => {
            let count = Decimal::from(liquidities.len());
            scaled = liquidities.iter().map(|liquidity| *liquidity / count).collect();
            (&scaled[..], checked_total(&scaled).unwrap_or(Decimal::MAX))
        }
    };

    if total <= Decimal::ZERO {
        return Vec::new();
    }
    values
        .iter()
        .map(|value| value.checked_div(total).unwrap_or(Decimal::ZERO))
        .collect()
}

/// Herfindahl-Hirschman index over fractional shares, in `[0, 1]`.
pub fn herfindahl_index(liquidities: &[Decimal]) -> Decimal {
    market_shares(liquidities).iter().map(|share| share * share).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConcentrationLevel;
    use rust_decimal_macros::dec;

    #[test]
    fn fifty_thirty_twenty_split() {
        let hhi = herfindahl_index(&[dec!(500), dec!(300), dec!(200)]);
        assert_eq!(hhi, dec!(0.38));
        assert_eq!(ConcentrationLevel::from_hhi(hhi, 3), ConcentrationLevel::High);
    }

    #[test]
    fn even_split_across_ten_pools_is_low() {
        let hhi = herfindahl_index(&[dec!(100); 10]);
        assert_eq!(hhi, dec!(0.1));
        assert_eq!(ConcentrationLevel::from_hhi(hhi, 10), ConcentrationLevel::Low);
    }

    #[test]
    fn overflowing_total_still_splits_evenly() {
        let shares = market_shares(&[Decimal::MAX, Decimal::MAX]);
        assert_eq!(shares.len(), 2);
        for share in &shares {
            assert!((*share - dec!(0.5)).abs() < dec!(0.000001));
        }
        let hhi = herfindahl_index(&[Decimal::MAX, Decimal::MAX]);
        assert!((hhi - dec!(0.5)).abs() < dec!(0.000001));
    }

    #[test]
    fn empty_or_dry_pools_have_no_index() {
        assert_eq!(herfindahl_index(&[]), Decimal::ZERO);
        assert_eq!(herfindahl_index(&[Decimal::ZERO, Decimal::ZERO]), Decimal::ZERO);
        assert_eq!(ConcentrationLevel::from_hhi(Decimal::ZERO, 0), ConcentrationLevel::NoLiquidity);
    }
}
