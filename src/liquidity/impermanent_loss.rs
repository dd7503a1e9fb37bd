//! Impermanent loss for a 50/50 constant-product position

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use crate::{
    errors::{EngineError, EngineResult},
    types::ImpermanentLossResult,
    utils::sqrt,
};

/// `2√r / (1 + r)` for price ratio `r`; 1 at `r = 1` and below 1 everywhere else.
pub fn il_factor(ratio: Decimal) -> Option<Decimal> {
    if ratio == Decimal::ONE {
        return Some(Decimal::ONE);
    }
    let root = sqrt(ratio)?;
    let factor = dec!(2).checked_mul(root)?.checked_div(Decimal::ONE.checked_add(ratio)?)?;
    Some(factor.min(Decimal::ONE))
}

/// Loss of a 50/50 position when the price ratio moves from `entry_price_ratio` to
/// `current_price_ratio`.
///
/// HODL value is `inv/2 + inv/2 * r`, the entry split marked at the new ratio. LP value
/// is `inv * il_factor`, the investment scaled by the factor alone and not by the
/// HODL value, so at `r = 4` a 1000 position reads LP 800 against HODL 2500.
/// Ratios whose figures leave `Decimal` range fail with `Validation.InvalidArgument`.
pub fn impermanent_loss(
    entry_price_ratio: Decimal,
    current_price_ratio: Decimal,
    initial_investment_usd: Decimal,
) -> EngineResult<ImpermanentLossResult> {
    if entry_price_ratio <= Decimal::ZERO {
        return Err(EngineError::InvalidArgument {
            message: format!("entry price ratio must be positive, got {}", entry_price_ratio),
        });
    }
    if current_price_ratio < Decimal::ZERO || initial_investment_usd < Decimal::ZERO {
        return Err(EngineError::InvalidArgument {
            message: "price ratio and investment cannot be negative".to_string(),
        });
    }

    let ratio = current_price_ratio
        .checked_div(entry_price_ratio)
        .ok_or_else(|| EngineError::InvalidArgument {
            message: format!("price ratio {} / {} is out of range", current_price_ratio, entry_price_ratio),
        })?;
    let factor = il_factor(ratio).ok_or_else(|| EngineError::InvalidArgument {
        message: format!("cannot take the square root of ratio {}", ratio),
    })?;

    let out_of_range = || EngineError::InvalidArgument {
        message: format!("price ratio {} is out of range for {} USD", ratio, initial_investment_usd),
    };

    let half = initial_investment_usd / dec!(2);
    let hodl_value = half
        .checked_mul(ratio)
        .and_then(|moved| moved.checked_add(half))
        .ok_or_else(out_of_range)?;
    let lp_value = initial_investment_usd * factor;
    let price_change_percent = (ratio - Decimal::ONE)
        .checked_mul(dec!(100))
        .ok_or_else(out_of_range)?;

    Ok(ImpermanentLossResult {
        initial_price_ratio: entry_price_ratio,
        current_price_ratio,
        price_change_percent,
        impermanent_loss_percent: (factor - Decimal::ONE) * dec!(100),
        hodl_value_usd: hodl_value,
        lp_value_usd: lp_value,
        difference_usd: lp_value - hodl_value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn unchanged_price_has_no_loss() {
        let result = impermanent_loss(dec!(2000), dec!(2000), dec!(10_000)).unwrap();
        assert_eq!(result.impermanent_loss_percent, Decimal::ZERO);
        assert_eq!(result.hodl_value_usd, dec!(10_000));
        assert_eq!(result.lp_value_usd, dec!(10_000));
        assert_eq!(result.difference_usd, Decimal::ZERO);
    }

    #[test]
    fn quadrupled_price_loses_twenty_percent() {
        // factor = 2 * 2 / 5 = 0.8
        let result = impermanent_loss(dec!(1), dec!(4), dec!(1000)).unwrap();
        assert_eq!(result.impermanent_loss_percent, dec!(-20));
        assert_eq!(result.price_change_percent, dec!(300));
        assert_eq!(result.hodl_value_usd, dec!(2500));
        assert_eq!(result.lp_value_usd, dec!(800));
        assert_eq!(result.difference_usd, dec!(-1700));
    }

    #[test]
    fn ratio_beyond_decimal_range_is_rejected() {
        // tiny entry ratio: current / entry = 1e27, and half the investment times that overflows
        let err = impermanent_loss(Decimal::new(1, 27), dec!(1), dec!(1000)).unwrap_err();
        assert_eq!(err.code(), "Validation.InvalidArgument");
    }

    #[test]
    fn rejects_non_positive_entry_ratio() {
        let err = impermanent_loss(Decimal::ZERO, dec!(1), dec!(1000)).unwrap_err();
        assert_eq!(err.code(), "Validation.InvalidArgument");
    }

    proptest! {
        #[test]
        fn loss_is_never_positive(current in 1u64..10_000_000, entry in 1u64..10_000_000) {
            let result = impermanent_loss(
                Decimal::from(entry) / dec!(1000),
                Decimal::from(current) / dec!(1000),
                dec!(1000),
            ).unwrap();
            prop_assert!(result.impermanent_loss_percent <= Decimal::ZERO);
            prop_assert!(result.lp_value_usd <= dec!(1000));
        }
    }
}
