//! Engine configuration settings and environment variable handling

use alloy::primitives::Address;
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use crate::types::{BASE_CHAIN_ID, WETH_MAINNET};

// Scan loop
pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 15;
pub const MIN_SCAN_INTERVAL_SECS: u64 = 1;
pub const MAX_SCAN_INTERVAL_SECS: u64 = 3600;
pub const DEFAULT_SCAN_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SCAN_BACKOFF_SECS: u64 = 5;

// Opportunity thresholds
pub const DEFAULT_MIN_PROFIT_USD: Decimal = dec!(1);
pub const DEFAULT_LARGE_OPPORTUNITY_USD: Decimal = dec!(1000);
pub const DEFAULT_MIN_CONFIDENCE: u8 = 60;
pub const DEFAULT_MAX_CACHED_OPPORTUNITY_HASHES: usize = 1000;
pub const MAX_CACHED_OPPORTUNITY_HASHES: usize = 1_000_000;

// Cache lifetimes
pub const DEFAULT_PRICE_CACHE_TTL_SECS: u64 = 30;
pub const DEFAULT_ARBITRAGE_CACHE_TTL_SECS: u64 = 10;
pub const DEFAULT_POOL_CACHE_TTL_SECS: u64 = 60;

// Gas, Base L2 pricing
pub const DEFAULT_GAS_PRICE_GWEI: Decimal = dec!(0.1);
pub const MAX_GAS_PRICE_GWEI: Decimal = dec!(500);

// Resilience
pub const DEFAULT_MAX_CONSECUTIVE_ERRORS: u32 = 5;
pub const DEFAULT_CIRCUIT_BREAKER_COOLDOWN_SECS: u64 = 60;

// Price change alerts
pub const DEFAULT_PRICE_CHANGE_THRESHOLD_PCT: Decimal = dec!(5);
pub const DEFAULT_PRICE_CHANGE_WINDOW_SECS: u64 = 3600;

#[derive(Debug, Clone)]
pub struct Config {
    pub chain_id: u64,
    pub scan_interval_secs: u64,
    pub scan_timeout_secs: u64,
    pub scan_backoff_secs: u64,
    pub min_profit_usd: Decimal,
    pub large_opportunity_usd: Decimal,
    pub min_confidence: u8,
    pub enable_triangular: bool,
    pub triangular_base_token: Address,
    pub max_cached_opportunity_hashes: usize,
    // Cache lifetimes
    pub price_cache_ttl_secs: u64,
    pub arbitrage_cache_ttl_secs: u64,
    pub pool_cache_ttl_secs: u64,
    pub gas_price_gwei: Decimal,
    // Circuit breaker
    pub max_consecutive_errors: u32,
    pub circuit_breaker_cooldown_secs: u64,
    // Price change alerts
    pub price_change_threshold_pct: Decimal,
    pub price_change_window_secs: u64,
    // Paths
    pub snapshot_path: PathBuf,
    pub output_dir: PathBuf,
}

impl Config {
    pub fn load() -> Self {
        Self::load_with(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source. Unparseable values
    /// fall back to their defaults.
    pub fn load_with<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let decimal = |key: &str| lookup(key).and_then(|s| Decimal::from_str(s.trim()).ok());
        let number = |key: &str| lookup(key).and_then(|s| s.trim().parse::<u64>().ok());
        let flag = |key: &str, default: bool| {
            lookup(key)
                .and_then(|s| s.trim().to_ascii_lowercase().parse::<bool>().ok())
                .unwrap_or(default)
        };

        Self {
            chain_id: number("CHAIN_ID").unwrap_or(BASE_CHAIN_ID),
            scan_interval_secs: number("SCAN_INTERVAL_SECS")
                .unwrap_or(DEFAULT_SCAN_INTERVAL_SECS)
                .clamp(MIN_SCAN_INTERVAL_SECS, MAX_SCAN_INTERVAL_SECS),
            scan_timeout_secs: number("SCAN_TIMEOUT_SECS")
                .unwrap_or(DEFAULT_SCAN_TIMEOUT_SECS)
                .max(1),
            scan_backoff_secs: number("SCAN_BACKOFF_SECS").unwrap_or(DEFAULT_SCAN_BACKOFF_SECS),
            min_profit_usd: decimal("MIN_PROFIT_USD")
                .unwrap_or(DEFAULT_MIN_PROFIT_USD)
                .max(Decimal::ZERO),
            large_opportunity_usd: decimal("LARGE_OPPORTUNITY_USD")
                .unwrap_or(DEFAULT_LARGE_OPPORTUNITY_USD)
                .max(Decimal::ZERO),
            min_confidence: number("MIN_CONFIDENCE")
                .map(|value| value.min(100) as u8)
                .unwrap_or(DEFAULT_MIN_CONFIDENCE),
            enable_triangular: flag("ENABLE_TRIANGULAR", true),
            triangular_base_token: lookup("TRIANGULAR_BASE_TOKEN")
                .and_then(|s| Address::from_str(s.trim()).ok())
                .unwrap_or(WETH_MAINNET),
            max_cached_opportunity_hashes: number("MAX_CACHED_OPPORTUNITY_HASHES")
                .map(|value| value as usize)
                .unwrap_or(DEFAULT_MAX_CACHED_OPPORTUNITY_HASHES)
                .clamp(1, MAX_CACHED_OPPORTUNITY_HASHES),
            price_cache_ttl_secs: number("PRICE_CACHE_TTL_SECS").unwrap_or(DEFAULT_PRICE_CACHE_TTL_SECS),
            arbitrage_cache_ttl_secs: number("ARBITRAGE_CACHE_TTL_SECS").unwrap_or(DEFAULT_ARBITRAGE_CACHE_TTL_SECS),
            pool_cache_ttl_secs: number("POOL_CACHE_TTL_SECS").unwrap_or(DEFAULT_POOL_CACHE_TTL_SECS),
            gas_price_gwei: decimal("GAS_PRICE_GWEI")
                .unwrap_or(DEFAULT_GAS_PRICE_GWEI)
                .max(Decimal::ZERO)
                .min(MAX_GAS_PRICE_GWEI),
            max_consecutive_errors: number("MAX_CONSECUTIVE_ERRORS")
                .map(|value| value.clamp(1, u64::from(u32::MAX)) as u32)
                .unwrap_or(DEFAULT_MAX_CONSECUTIVE_ERRORS),
            circuit_breaker_cooldown_secs: number("CIRCUIT_BREAKER_COOLDOWN_SECS")
                .unwrap_or(DEFAULT_CIRCUIT_BREAKER_COOLDOWN_SECS),
            price_change_threshold_pct: decimal("PRICE_CHANGE_THRESHOLD_PCT")
                .unwrap_or(DEFAULT_PRICE_CHANGE_THRESHOLD_PCT)
                .max(Decimal::ZERO),
            price_change_window_secs: number("PRICE_CHANGE_WINDOW_SECS")
                .unwrap_or(DEFAULT_PRICE_CHANGE_WINDOW_SECS)
                .max(1),
            snapshot_path: lookup("SNAPSHOT_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/snapshot.json")),
            output_dir: lookup("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("output")),
        }
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.output_dir.join("logs")
    }

    pub fn events_dir(&self) -> PathBuf {
        self.output_dir.join("events")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::load_with(|_| None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::load_with(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_match_documented_knobs() {
        let config = Config::default();
        assert_eq!(config.chain_id, 8453);
        assert_eq!(config.scan_interval_secs, 15);
        assert_eq!(config.min_profit_usd, dec!(1));
        assert_eq!(config.large_opportunity_usd, dec!(1000));
        assert_eq!(config.min_confidence, 60);
        assert!(config.enable_triangular);
        assert_eq!(config.triangular_base_token, WETH_MAINNET);
        assert_eq!(config.max_cached_opportunity_hashes, 1000);
        assert_eq!(config.gas_price_gwei, dec!(0.1));
        assert_eq!(config.events_dir(), PathBuf::from("output/events"));
    }

    #[test]
    fn values_are_parsed_and_clamped() {
        let config = from_pairs(&[
            ("SCAN_INTERVAL_SECS", "0"),
            ("MIN_CONFIDENCE", "250"),
            ("GAS_PRICE_GWEI", "-3"),
            ("ENABLE_TRIANGULAR", "FALSE"),
            ("MIN_PROFIT_USD", "2.5"),
            ("MAX_CACHED_OPPORTUNITY_HASHES", "0"),
        ]);
        assert_eq!(config.scan_interval_secs, MIN_SCAN_INTERVAL_SECS);
        assert_eq!(config.min_confidence, 100);
        assert_eq!(config.gas_price_gwei, Decimal::ZERO);
        assert!(!config.enable_triangular);
        assert_eq!(config.min_profit_usd, dec!(2.5));
        assert_eq!(config.max_cached_opportunity_hashes, 1);
    }

    #[test]
    fn garbage_falls_back_to_defaults() {
        let config = from_pairs(&[
            ("CHAIN_ID", "base"),
            ("TRIANGULAR_BASE_TOKEN", "not-an-address"),
            ("PRICE_CHANGE_THRESHOLD_PCT", "lots"),
        ]);
        assert_eq!(config.chain_id, BASE_CHAIN_ID);
        assert_eq!(config.triangular_base_token, WETH_MAINNET);
        assert_eq!(config.price_change_threshold_pct, DEFAULT_PRICE_CHANGE_THRESHOLD_PCT);
    }
}
