//! Shared fixtures for unit tests

use alloy::primitives::Address;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use crate::{
    arbitrage::{ArbitrageDetector, DetectorSettings},
    pricing::{OracleSettings, PriceOracle},
    repository::{InMemoryStore, MemoryCache},
    types::{BASE_CHAIN_ID, Pool, Token, USDC_MAINNET, WETH_MAINNET},
    utils::decimal_to_u256,
};

pub const TKN: Address = Address::repeat_byte(0x11);
pub const ETH_USD_POOL: Address = Address::repeat_byte(0xe1);

pub fn token(address: Address, symbol: &str, decimals: u8) -> Token {
    Token {
        address,
        symbol: symbol.to_string(),
        decimals,
        chain_id: BASE_CHAIN_ID,
        is_placeholder: false,
    }
}

pub fn weth() -> Token {
    token(WETH_MAINNET, "WETH", 18)
}

pub fn usdc() -> Token {
    token(USDC_MAINNET, "USDC", 6)
}

pub fn tkn() -> Token {
    token(TKN, "TKN", 18)
}

/// Pool holding `amount0` of `token0` and `amount1` of `token1` in token units.
pub fn pool(address: Address, token0: &Token, amount0: Decimal, token1: &Token, amount1: Decimal) -> Pool {
    Pool {
        address,
        factory: Address::repeat_byte(0xfa),
        chain_id: BASE_CHAIN_ID,
        venue: format!("dex-{:02x}", address.0[19]),
        token0: token0.address,
        token1: token1.address,
        reserve0: decimal_to_u256(amount0, token0.decimals).expect("fixture reserve"),
        reserve1: decimal_to_u256(amount1, token1.decimals).expect("fixture reserve"),
        fee_bps: 30,
        volume_24h_usd: Decimal::ZERO,
    }
}

/// WETH, USDC and TKN registered, with a 1,000 WETH / 2,000,000 USDC pool (ETH = $2000).
pub async fn base_store() -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::new());
    for t in [weth(), usdc(), tkn()] {
        store.upsert_token(t).await.expect("fixture token");
    }
    store
        .upsert_pool(pool(ETH_USD_POOL, &weth(), dec!(1000), &usdc(), dec!(2_000_000)))
        .await
        .expect("fixture pool");
    store
}

pub fn oracle(store: &Arc<InMemoryStore>) -> Arc<PriceOracle> {
    Arc::new(PriceOracle::new(
        store.clone(),
        store.clone(),
        store.clone(),
        Arc::new(MemoryCache::new()),
        OracleSettings::default(),
    ))
}

pub fn detector(store: &Arc<InMemoryStore>) -> ArbitrageDetector {
    ArbitrageDetector::new(
        store.clone(),
        store.clone(),
        oracle(store),
        Arc::new(MemoryCache::new()),
        DetectorSettings {
            gas_price_gwei: dec!(0.1),
            ..DetectorSettings::default()
        },
    )
}
