//! Price resolution over pool reserves
//!
//! Prices come from the deepest direct pool against the quote token, falling back to a
//! two-hop route through WETH. USD prices use direct stablecoin pairings first and the
//! ETH/USD leg second. Every lookup goes straight to the repositories so no resolution
//! path recurses into another.

use alloy::primitives::Address;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use super::{reserve_math::{normalize_reserve, price_from_reserves}, twap::time_weighted_average};
use crate::{
    errors::{EngineError, EngineResult},
    repository::{Cache, PoolRepository, PriceHistoryRepository, TokenRepository, get_cached, set_cached},
    types::{
        BASE_CHAIN_ID, Pool, PricePoint, QuoteCurrency, SignificantPriceChange, Token, TokenPrice,
        TwapResult, USD_QUOTE_ORDER, WETH_MAINNET, is_stablecoin,
    },
};

pub const DEFAULT_PRICE_TTL_SECS: u64 = 30;
pub const MAX_HISTORY_LIMIT: usize = 1000;

#[derive(Debug, Clone)]
pub struct OracleSettings {
    pub chain_id: u64,
    pub price_ttl: Duration,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            chain_id: BASE_CHAIN_ID,
            price_ttl: Duration::from_secs(DEFAULT_PRICE_TTL_SECS),
        }
    }
}

/// A price read off one pool (or a two-pool route starting at that pool).
#[derive(Debug, Clone, Copy)]
struct PoolQuote {
    price: Decimal,
    pool: Address,
    /// Both sides of the source pool, in quote units.
    liquidity: Decimal,
}

pub struct PriceOracle {
    tokens: Arc<dyn TokenRepository>,
    pools: Arc<dyn PoolRepository>,
    history: Arc<dyn PriceHistoryRepository>,
    cache: Arc<dyn Cache>,
    settings: OracleSettings,
}

impl PriceOracle {
    pub fn new(
        tokens: Arc<dyn TokenRepository>,
        pools: Arc<dyn PoolRepository>,
        history: Arc<dyn PriceHistoryRepository>,
        cache: Arc<dyn Cache>,
        settings: OracleSettings,
    ) -> Self {
        Self {
            tokens,
            pools,
            history,
            cache,
            settings,
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.settings.chain_id
    }

    pub async fn get_token(&self, address: Address) -> EngineResult<Token> {
        self.tokens
            .get_token(address, self.settings.chain_id)
            .await?
            .ok_or(EngineError::TokenNotFound { address })
    }

    pub async fn get_price(&self, token: Address, quote: QuoteCurrency) -> EngineResult<TokenPrice> {
        let cache_key = format!("price:{}:{}:{}", self.settings.chain_id, token, quote);
        if let Some(cached) = get_cached::<TokenPrice>(self.cache.as_ref(), &cache_key).await {
            return Ok(cached);
        }

        let token_info = self.get_token(token).await?;
        let quote_address = quote.address();

        let resolved = if token == quote_address {
            PoolQuote {
                price: Decimal::ONE,
                pool: Address::ZERO,
                liquidity: Decimal::ZERO,
            }
        } else {
            let pools = self.pools.get_pools_by_token(token, self.settings.chain_id).await?;
            if pools.is_empty() {
                return Err(EngineError::NoLiquidity { token });
            }

            match self.direct_quote(&token_info, &pools, quote_address).await? {
                Some(direct) => direct,
                None => match self.route_via_weth(&token_info, &pools, quote_address).await? {
                    Some(routed) => routed,
                    None => {
                        return Err(EngineError::NoPool {
                            token,
                            quote: quote.to_string(),
                        });
                    }
                },
            }
        };

        let price_usd = if quote.is_stable() {
            Some(resolved.price)
        } else {
            match self.get_usd_price(quote_address).await {
                Ok(quote_usd) => resolved.price.checked_mul(quote_usd),
                Err(e) => {
                    debug!("No USD route for quote {}: {}", quote, e);
                    None
                }
            }
        };

        let price = TokenPrice {
            token_address: token,
            quote_token_address: quote_address,
            quote_symbol: quote.symbol().to_string(),
            price: resolved.price,
            price_usd,
            source_pool_address: (token != quote_address).then_some(resolved.pool),
            liquidity: resolved.liquidity,
            timestamp: Utc::now(),
        };

        set_cached(self.cache.as_ref(), &cache_key, &price, self.settings.price_ttl).await;
        Ok(price)
    }

    pub async fn get_usd_price(&self, token: Address) -> EngineResult<Decimal> {
        if is_stablecoin(&token) {
            return Ok(Decimal::ONE);
        }

        let cache_key = format!("price_usd:{}:{}", self.settings.chain_id, token);
        if let Some(cached) = get_cached::<Decimal>(self.cache.as_ref(), &cache_key).await {
            return Ok(cached);
        }

        let token_info = self.get_token(token).await?;
        let pools = self.pools.get_pools_by_token(token, self.settings.chain_id).await?;

        let usd = match self.stable_quote(&token_info, &pools).await? {
            Some(usd) => Some(usd),
            None if token != WETH_MAINNET => match self.direct_quote(&token_info, &pools, WETH_MAINNET).await? {
                Some(eth_leg) => self
                    .weth_usd_direct()
                    .await?
                    .and_then(|eth_usd| eth_leg.price.checked_mul(eth_usd)),
                None => None,
            },
            None => None,
        };

        match usd {
            Some(usd) => {
                set_cached(self.cache.as_ref(), &cache_key, &usd, self.settings.price_ttl).await;
                Ok(usd)
            }
            None => Err(EngineError::UsdPriceUnavailable { token }),
        }
    }

    pub async fn eth_usd_price(&self) -> EngineResult<Decimal> {
        self.get_usd_price(WETH_MAINNET).await
    }

    pub async fn get_twap(
        &self,
        token: Address,
        quote: QuoteCurrency,
        period: ChronoDuration,
    ) -> EngineResult<TwapResult> {
        self.get_twap_at(token, quote, period, Utc::now()).await
    }

    pub async fn get_twap_at(
        &self,
        token: Address,
        quote: QuoteCurrency,
        period: ChronoDuration,
        now: DateTime<Utc>,
    ) -> EngineResult<TwapResult> {
        let window_start = now - period;
        let samples = self
            .history
            .get_for_twap(token, quote.address(), window_start, now)
            .await?;

        let summary = time_weighted_average(&samples, now)?.ok_or(EngineError::NoTwapData {
            token,
            period_secs: period.num_seconds(),
        })?;

        Ok(TwapResult {
            token_address: token,
            quote_symbol: quote.symbol().to_string(),
            twap: summary.twap,
            spot_price: summary.spot_price,
            deviation_percent: summary.deviation_percent,
            data_points: summary.data_points,
            period_secs: period.num_seconds(),
            window_start,
            window_end: now,
        })
    }

    pub async fn get_price_history(
        &self,
        token: Address,
        quote: QuoteCurrency,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: usize,
    ) -> EngineResult<Vec<PricePoint>> {
        self.history
            .get_by_token(token, quote.address(), from, to, limit.min(MAX_HISTORY_LIMIT))
            .await
    }

    /// Compares the oldest sample inside `window` against the current price. `None` when
    /// there is no baseline or the move stays under `threshold_percent`.
    pub async fn detect_price_change(
        &self,
        token: Address,
        quote: QuoteCurrency,
        window: ChronoDuration,
        threshold_percent: Decimal,
    ) -> EngineResult<Option<SignificantPriceChange>> {
        let now = Utc::now();
        let samples = self
            .history
            .get_for_twap(token, quote.address(), now - window, now)
            .await?;

        let Some(baseline) = samples.first() else {
            return Ok(None);
        };
        if baseline.price.is_zero() {
            return Ok(None);
        }

        let current = self.get_price(token, quote).await?;
        let Some(change_percent) = (current.price - baseline.price)
            .checked_div(baseline.price)
            .and_then(|ratio| ratio.checked_mul(dec!(100)))
        else {
            debug!("Move of {} from {} out of range", token, baseline.price);
            return Ok(None);
        };
        if change_percent.abs() < threshold_percent {
            return Ok(None);
        }

        info!(
            token = %token,
            quote = %quote,
            old_price = %baseline.price,
            new_price = %current.price,
            change_percent = %change_percent.round_dp(2),
            "Significant price change"
        );

        Ok(Some(SignificantPriceChange {
            token_address: token,
            quote_symbol: quote.symbol().to_string(),
            old_price: baseline.price,
            new_price: current.price,
            price_change_percent: change_percent,
            time_period_secs: (now - baseline.timestamp).num_seconds(),
            occurred_at: now,
        }))
    }

    /// Deepest pool pairing `token` with `quote`. A pool whose price reads as zero counts
    /// as no pool so the caller can try another route.
    async fn direct_quote(&self, token: &Token, pools: &[Pool], quote: Address) -> EngineResult<Option<PoolQuote>> {
        let Some(pool) = pools
            .iter()
            .filter(|pool| pool.contains(&token.address) && pool.contains(&quote))
            .max_by_key(|pool| pool.total_reserve())
        else {
            return Ok(None);
        };

        let quote_token = self.get_token(quote).await?;
        let resolved = quote_through_pool(pool, token, &quote_token);
        if resolved.price.is_zero() {
            debug!("Pool {} holds no liquidity for {}", pool.address, token.symbol);
            return Ok(None);
        }
        Ok(Some(resolved))
    }

    async fn route_via_weth(&self, token: &Token, pools: &[Pool], quote: Address) -> EngineResult<Option<PoolQuote>> {
        if token.address == WETH_MAINNET || quote == WETH_MAINNET {
            return Ok(None);
        }

        let Some(first) = self.direct_quote(token, pools, WETH_MAINNET).await? else {
            return Ok(None);
        };

        let weth = self.get_token(WETH_MAINNET).await?;
        let weth_pools = self.pools.get_pools_by_token(WETH_MAINNET, self.settings.chain_id).await?;
        let Some(second) = self.direct_quote(&weth, &weth_pools, quote).await? else {
            return Ok(None);
        };

        let Some(price) = first.price.checked_mul(second.price) else {
            debug!("Price of {} through WETH out of range", token.symbol);
            return Ok(None);
        };

        debug!("Routed {} through WETH via {} and {}", token.symbol, first.pool, second.pool);
        Ok(Some(PoolQuote {
            price,
            pool: first.pool,
            liquidity: first.liquidity.saturating_mul(second.price),
        }))
    }

    async fn stable_quote(&self, token: &Token, pools: &[Pool]) -> EngineResult<Option<Decimal>> {
        for quote in USD_QUOTE_ORDER {
            if let Some(direct) = self.direct_quote(token, pools, quote.address()).await? {
                return Ok(Some(direct.price));
            }
        }
        Ok(None)
    }

    async fn weth_usd_direct(&self) -> EngineResult<Option<Decimal>> {
        let weth = self.get_token(WETH_MAINNET).await?;
        let weth_pools = self.pools.get_pools_by_token(WETH_MAINNET, self.settings.chain_id).await?;
        self.stable_quote(&weth, &weth_pools).await
    }
}

fn quote_through_pool(pool: &Pool, base: &Token, quote: &Token) -> PoolQuote {
    let is_token0_base = pool.token0 == base.address;
    let (decimals0, decimals1) = if is_token0_base {
        (base.decimals, quote.decimals)
    } else {
        (quote.decimals, base.decimals)
    };

    let price = price_from_reserves(pool.reserve0, pool.reserve1, decimals0, decimals1, is_token0_base);
    let quote_reserve = pool
        .reserve_of(&quote.address)
        .map(|raw| normalize_reserve(raw, quote.decimals))
        .unwrap_or(Decimal::ZERO);

    PoolQuote {
        price,
        pool: pool.address,
        liquidity: quote_reserve.saturating_mul(dec!(2)),
    }
}
