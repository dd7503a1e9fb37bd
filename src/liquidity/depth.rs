//! Pool depth scoring

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const BALANCE_CREDIT: u8 = 20;

fn tvl_points(tvl_usd: Decimal) -> u8 {
    match tvl_usd {
        tvl if tvl >= dec!(10_000_000) => 50,
        tvl if tvl >= dec!(1_000_000) => 40,
        tvl if tvl >= dec!(100_000) => 30,
        tvl if tvl >= dec!(10_000) => 20,
        tvl if tvl > Decimal::ZERO => 10,
        _ => 0,
    }
}

fn turnover_points(turnover: Decimal) -> u8 {
    match turnover {
        t if t >= dec!(1) => 30,
        t if t >= dec!(0.5) => 25,
        t if t >= dec!(0.1) => 20,
        t if t >= dec!(0.01) => 10,
        t if t > Decimal::ZERO => 5,
        _ => 0,
    }
}

/// TVL bucket (up to 50) plus daily volume/TVL bucket (up to 30) plus a flat 20 for
/// the constant-product 50/50 split. An empty pool scores 0.
pub fn depth_score(tvl_usd: Decimal, volume_24h_usd: Decimal) -> u8 {
    if tvl_usd <= Decimal::ZERO {
        return 0;
    }
    let turnover = volume_24h_usd.checked_div(tvl_usd).unwrap_or(Decimal::ZERO);
    (tvl_points(tvl_usd) + turnover_points(turnover) + BALANCE_CREDIT).min(100)
}
