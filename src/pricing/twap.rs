//! Time-weighted average price over a sample window

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use crate::{
    errors::{EngineError, EngineResult},
    types::PricePoint,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TwapSummary {
    pub twap: Decimal,
    pub spot_price: Decimal,
    pub deviation_percent: Decimal,
    pub data_points: usize,
}

/// Mean of `price * weight` over `total`. Falls back to fractional weights when the
/// exact products overflow.
fn weighted_mean(weighted: &[(Decimal, Decimal)], total: Decimal) -> Option<Decimal> {
    let exact = weighted
        .iter()
        .try_fold(Decimal::ZERO, |sum, (price, weight)| sum.checked_add(price.checked_mul(*weight)?))
        .and_then(|sum| sum.checked_div(total));

    exact.or_else(|| {
        weighted.iter().try_fold(Decimal::ZERO, |sum, (price, weight)| {
            sum.checked_add(price.checked_mul(weight.checked_div(total)?)?)
        })
    })
}

/// Each sample holds until the next one; the latest holds until `now`. Samples stamped
/// after `now` carry no weight. `Ok(None)` for an empty sample set; prices whose average
/// or deviation leaves `Decimal` range fail with `Validation.InvalidArgument`.
pub fn time_weighted_average(samples: &[PricePoint], now: DateTime<Utc>) -> EngineResult<Option<TwapSummary>> {
    let mut ordered: Vec<PricePoint> = samples.to_vec();
    ordered.sort_by_key(|point| point.timestamp);
    let Some(spot_price) = ordered.last().map(|point| point.price) else {
        return Ok(None);
    };

    let mut weighted: Vec<(Decimal, Decimal)> = ordered
        .iter()
        .enumerate()
        .map(|(i, point)| {
            let until = ordered.get(i + 1).map(|next| next.timestamp).unwrap_or(now);
            let millis = (until - point.timestamp).num_milliseconds().max(0);
            (point.price, Decimal::from(millis))
        })
        .collect();

    let mut total_weight: Decimal = weighted.iter().map(|(_, weight)| *weight).sum();
    if total_weight.is_zero() {
        // every sample shares one instant
        for entry in weighted.iter_mut() {
            entry.1 = Decimal::ONE;
        }
        total_weight = Decimal::from(weighted.len());
    }

    let out_of_range = || EngineError::InvalidArgument {
        message: format!("prices around {} are out of range for a time-weighted average", spot_price),
    };
    let twap = weighted_mean(&weighted, total_weight).ok_or_else(out_of_range)?;

    let deviation_percent = if spot_price.is_zero() {
        Decimal::ZERO
    } else {
        (twap - spot_price)
            .abs()
            .checked_div(spot_price)
            .and_then(|ratio| ratio.checked_mul(dec!(100)))
            .ok_or_else(out_of_range)?
    };

    Ok(Some(TwapSummary {
        twap,
        spot_price,
        deviation_percent,
        data_points: ordered.len(),
    }))
}
