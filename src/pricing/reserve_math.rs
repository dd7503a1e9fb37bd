//! Constant-product reserve math
//!
//! Pure functions over pool reserves. Raw reserves are normalized to token units
//! before any ratio is taken so pools with different decimals compare directly.

use alloy::primitives::U256;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use crate::utils::{sqrt, u256_to_decimal};

pub const DEFAULT_FEE_BPS: u32 = 30;

/// Upper bound on a two-pool trade, as a share of the buy pool's input reserve.
pub const MAX_POOL_SHARE: Decimal = dec!(0.10);

const BPS_DENOMINATOR: u32 = 10_000;

pub fn normalize_reserve(raw: U256, decimals: u8) -> Decimal {
    u256_to_decimal(raw, decimals)
}

/// Price of the base side expressed in the other side. Zero when either reserve is
/// empty; callers treat zero as "no price".
pub fn price_from_reserves(
    reserve0: U256,
    reserve1: U256,
    decimals0: u8,
    decimals1: u8,
    is_token0_base: bool,
) -> Decimal {
    if reserve0.is_zero() || reserve1.is_zero() {
        return Decimal::ZERO;
    }

    let normalized0 = normalize_reserve(reserve0, decimals0);
    let normalized1 = normalize_reserve(reserve1, decimals1);
    let (base, other) = if is_token0_base {
        (normalized0, normalized1)
    } else {
        (normalized1, normalized0)
    };

    if base.is_zero() {
        return Decimal::ZERO;
    }
    other.checked_div(base).unwrap_or(Decimal::ZERO)
}

/// Output of a constant-product swap with the fee taken from the input.
pub fn amount_out(amount_in: Decimal, reserve_in: Decimal, reserve_out: Decimal, fee_bps: u32) -> Decimal {
    if amount_in <= Decimal::ZERO || reserve_in < Decimal::ZERO || reserve_out <= Decimal::ZERO {
        return Decimal::ZERO;
    }

    let fee_bps = fee_bps.min(BPS_DENOMINATOR);
    let bps = Decimal::from(BPS_DENOMINATOR);

    let result = amount_in
        .checked_mul(Decimal::from(BPS_DENOMINATOR - fee_bps))
        .and_then(|amount_in_net| {
            let denominator = reserve_in.checked_mul(bps)?.checked_add(amount_in_net)?;
            if denominator.is_zero() {
                return Some(Decimal::ZERO);
            }
            amount_in_net.checked_mul(reserve_out)?.checked_div(denominator)
        });

    result.unwrap_or(Decimal::ZERO)
}

/// Closed-form input that maximizes a buy-low/sell-high trade across two pools,
/// clamped to `[0, MAX_POOL_SHARE * reserve_in_buy]`.
///
/// The buy pool takes the quote token in and pays the target token out; the sell pool
/// takes the target token in and pays the quote token out. All reserves are in token
/// units.
pub fn optimal_input(
    reserve_in_buy: Decimal,
    reserve_out_buy: Decimal,
    reserve_in_sell: Decimal,
    reserve_out_sell: Decimal,
) -> Decimal {
    if reserve_in_buy <= Decimal::ZERO
        || reserve_out_buy <= Decimal::ZERO
        || reserve_in_sell <= Decimal::ZERO
        || reserve_out_sell <= Decimal::ZERO
    {
        return Decimal::ZERO;
    }

    let (Some(price_buy), Some(price_sell)) = (
        reserve_in_buy.checked_div(reserve_out_buy),
        reserve_out_sell.checked_div(reserve_in_sell),
    ) else {
        return Decimal::ZERO;
    };
    if price_buy >= price_sell {
        return Decimal::ZERO;
    }

    let cap = reserve_in_buy * MAX_POOL_SHARE;

    // sqrt(kBuy * kSell / (priceBuy * priceSell)), factored per pool to stay in range
    let root = (|| {
        let k_buy = reserve_in_buy.checked_mul(reserve_out_buy)?;
        let k_sell = reserve_in_sell.checked_mul(reserve_out_sell)?;
        let buy_term = sqrt(k_buy.checked_div(price_buy)?)?;
        let sell_term = sqrt(k_sell.checked_div(price_sell)?)?;
        buy_term.checked_mul(sell_term)
    })();

    let optimal = match root {
        Some(root) => root - reserve_in_buy,
        // The product only overflows when it dwarfs any reserve, so the cap binds
        None => cap,
    };

    if optimal <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    optimal.min(cap)
}
