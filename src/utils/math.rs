//! Mathematical utility functions

use alloy::primitives::U256;
use rust_decimal::MathematicalOps;
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;

/// Largest mantissa a `Decimal` can carry (2^96 - 1).
const MAX_MANTISSA: u128 = 79_228_162_514_264_337_593_543_950_335;

/// 10^n, saturating at `Decimal::MAX` for large n and flushing to zero below 1e-28.
pub fn pow10(n: i32) -> Decimal {
    match n {
        0 => dec!(1),
        6 => dec!(1_000_000),
        18 => dec!(1_000_000_000_000_000_000),
        _ => {
            let mut result = dec!(1);
            if n > 0 {
                for _ in 0..n {
                    result = match result.checked_mul(dec!(10)) {
                        Some(value) => value,
                        None => return Decimal::MAX,
                    };
                }
            } else {
                for _ in 0..(-n) {
                    result /= dec!(10);
                }
            }
            result
        }
    }
}

/// Converts a raw on-chain amount into token units. Amounts wider than a `Decimal`
/// mantissa lose their lowest digits rather than overflowing.
pub fn u256_to_decimal(raw: U256, decimals: u8) -> Decimal {
    let max = U256::from(MAX_MANTISSA);
    let ten = U256::from(10u8);
    let mut value = raw;
    let mut scale = i32::from(decimals);

    while value > max {
        value /= ten;
        scale -= 1;
    }

    let mantissa = value.saturating_to::<u128>() as i128;
    if scale >= 0 {
        Decimal::try_from_i128_with_scale(mantissa, scale as u32).unwrap_or(Decimal::MAX)
    } else {
        Decimal::from_i128_with_scale(mantissa, 0)
            .checked_mul(pow10(-scale))
            .unwrap_or(Decimal::MAX)
    }
}

/// Inverse of [`u256_to_decimal`]; truncates below the token's smallest unit.
pub fn decimal_to_u256(amount: Decimal, decimals: u8) -> Option<U256> {
    if amount.is_sign_negative() {
        return None;
    }
    let scaled = amount.checked_mul(pow10(i32::from(decimals)))?.trunc();
    scaled.to_u128().map(U256::from)
}

pub fn sqrt(value: Decimal) -> Option<Decimal> {
    if value.is_sign_negative() {
        return None;
    }
    value.sqrt()
}
