//! Pairwise arbitrage detection across pools sharing a token pair

use alloy::primitives::Address;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use super::{confidence::confidence_score, gas::gas_cost_usd};
use crate::{
    config::Config,
    errors::{EngineError, EngineResult},
    pricing::{PriceOracle, amount_out, normalize_reserve, optimal_input},
    repository::{Cache, PoolRepository, TokenRepository, get_cached, set_cached},
    types::{
        ArbitrageKind, ArbitrageLeg, ArbitrageOpportunity, BASE_CHAIN_ID, OptimalTrade, Pool, Token, quote_rank,
    },
};

pub const DEFAULT_MIN_SPREAD_PERCENT: Decimal = dec!(0.5);
pub const TRIANGULAR_SIZE_SHARE: Decimal = dec!(0.05);
pub const TRIANGULAR_MIN_PRODUCT: Decimal = dec!(1.005);

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub chain_id: u64,
    pub gas_price_gwei: Decimal,
    pub min_spread_percent: Decimal,
    pub scan_cache_ttl: Duration,
    /// Triangular trade size as a share of the thinnest leg's USD liquidity.
    pub triangular_size_share: Decimal,
    pub triangular_min_product: Decimal,
}

impl DetectorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            chain_id: config.chain_id,
            gas_price_gwei: config.gas_price_gwei,
            scan_cache_ttl: Duration::from_secs(config.arbitrage_cache_ttl_secs),
            ..Self::default()
        }
    }
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            chain_id: BASE_CHAIN_ID,
            gas_price_gwei: dec!(0.1),
            min_spread_percent: DEFAULT_MIN_SPREAD_PERCENT,
            scan_cache_ttl: Duration::from_secs(10),
            triangular_size_share: TRIANGULAR_SIZE_SHARE,
            triangular_min_product: TRIANGULAR_MIN_PRODUCT,
        }
    }
}

/// One pool seen from the quote side of its pair.
#[derive(Debug, Clone, Copy)]
pub(super) struct PoolSide<'a> {
    pub pool: &'a Pool,
    pub quote_reserve: Decimal,
    pub target_reserve: Decimal,
    /// Quote units per target token.
    pub price: Decimal,
}

/// Two pools over the same pair, ordered cheap (buy) to dear (sell).
#[derive(Debug)]
pub(super) struct PairView<'a> {
    pub quote: Token,
    pub target: Token,
    pub buy: PoolSide<'a>,
    pub sell: PoolSide<'a>,
}

impl PairView<'_> {
    /// `None` when the gap between the two prices leaves `Decimal` range.
    pub fn spread_percent(&self) -> Option<Decimal> {
        (self.sell.price - self.buy.price)
            .checked_div(self.buy.price)?
            .checked_mul(dec!(100))
    }

    pub fn optimal_input(&self) -> Decimal {
        optimal_input(
            self.buy.quote_reserve,
            self.buy.target_reserve,
            self.sell.target_reserve,
            self.sell.quote_reserve,
        )
    }

    /// First-order profit in quote units for `input` spent on the buy side.
    pub fn expected_profit(&self, input: Decimal) -> Option<Decimal> {
        (self.sell.price - self.buy.price)
            .checked_div(self.buy.price)?
            .checked_mul(input)
    }
}

/// USD figures for a sized pairwise trade.
struct PairValuation {
    buy_rate: Decimal,
    liquidity_buy_usd: Decimal,
    liquidity_sell_usd: Decimal,
    input_value_usd: Decimal,
    profit_usd: Decimal,
}

impl PairValuation {
    /// `None` when any figure leaves `Decimal` range.
    fn new(view: &PairView<'_>, input: Decimal, profit: Decimal, quote_usd: Decimal) -> Option<Self> {
        Some(Self {
            buy_rate: Decimal::ONE.checked_div(view.buy.price)?,
            liquidity_buy_usd: view.buy.quote_reserve.checked_mul(dec!(2))?.checked_mul(quote_usd)?,
            liquidity_sell_usd: view.sell.quote_reserve.checked_mul(dec!(2))?.checked_mul(quote_usd)?,
            input_value_usd: input.checked_mul(quote_usd)?,
            profit_usd: profit.checked_mul(quote_usd)?,
        })
    }
}

/// Buckets pools by their sorted token pair. Ordered so scans are deterministic.
pub fn group_by_pair(pools: &[Pool]) -> BTreeMap<String, Vec<&Pool>> {
    let mut groups: BTreeMap<String, Vec<&Pool>> = BTreeMap::new();
    for pool in pools {
        groups.entry(pool.pair_key()).or_default().push(pool);
    }
    groups
}

/// The side of a pair prices are quoted in: stablecoins, then WETH, then the higher
/// address.
pub fn quote_side(pool: &Pool) -> Address {
    let rank0 = quote_rank(&pool.token0);
    let rank1 = quote_rank(&pool.token1);
    if rank0 > rank1 || (rank0 == rank1 && pool.token0 > pool.token1) {
        pool.token0
    } else {
        pool.token1
    }
}

pub struct ArbitrageDetector {
    pub(super) pools: Arc<dyn PoolRepository>,
    pub(super) tokens: Arc<dyn TokenRepository>,
    pub(super) oracle: Arc<PriceOracle>,
    pub(super) cache: Arc<dyn Cache>,
    pub(super) settings: DetectorSettings,
}

impl ArbitrageDetector {
    pub fn new(
        pools: Arc<dyn PoolRepository>,
        tokens: Arc<dyn TokenRepository>,
        oracle: Arc<PriceOracle>,
        cache: Arc<dyn Cache>,
        settings: DetectorSettings,
    ) -> Self {
        Self {
            pools,
            tokens,
            oracle,
            cache,
            settings,
        }
    }

    pub fn settings(&self) -> &DetectorSettings {
        &self.settings
    }

    pub fn oracle(&self) -> &Arc<PriceOracle> {
        &self.oracle
    }

    /// Compares every pool against every other pool on the same pair. Opportunities
    /// below `min_profit_usd` net of gas are dropped; the rest come back best first.
    pub async fn scan(&self, min_profit_usd: Decimal) -> EngineResult<Vec<ArbitrageOpportunity>> {
        let cache_key = format!("arbitrage:scan:{}:{}", self.settings.chain_id, min_profit_usd.normalize());
        if let Some(cached) = get_cached::<Vec<ArbitrageOpportunity>>(self.cache.as_ref(), &cache_key).await {
            debug!("Serving {} cached opportunities", cached.len());
            return Ok(cached);
        }

        let pools = self.pools.get_all_by_chain_id(self.settings.chain_id).await?;
        let groups = group_by_pair(&pools);

        let mut opportunities = Vec::new();
        let mut comparisons = 0usize;

        for (pair, group) in groups.iter().filter(|(_, group)| group.len() >= 2) {
            for (i, pool_a) in group.iter().enumerate() {
                for pool_b in &group[i + 1..] {
                    comparisons += 1;
                    match self.analyze_pool_pair(pool_a, pool_b).await {
                        Ok(Some(opportunity)) if opportunity.net_profit_usd() >= min_profit_usd => {
                            opportunities.push(opportunity);
                        }
                        Ok(_) => {}
                        Err(e) => warn!(
                            pair = %pair,
                            code = e.code(),
                            "Skipping {} vs {}: {}", pool_a.address, pool_b.address, e
                        ),
                    }
                }
            }
        }

        opportunities.sort_by(|a, b| b.net_profit_usd().cmp(&a.net_profit_usd()));

        info!(
            pools = pools.len(),
            comparisons,
            found = opportunities.len(),
            "Pairwise scan complete"
        );

        set_cached(self.cache.as_ref(), &cache_key, &opportunities, self.settings.scan_cache_ttl).await;
        Ok(opportunities)
    }

    pub async fn analyze_pool_pair(&self, pool_a: &Pool, pool_b: &Pool) -> EngineResult<Option<ArbitrageOpportunity>> {
        let Some(view) = self.pair_view(pool_a, pool_b).await? else {
            return Ok(None);
        };

        let Some(spread) = view.spread_percent() else {
            debug!(
                "Spread between {} and {} out of range, skipping",
                view.buy.pool.address, view.sell.pool.address
            );
            return Ok(None);
        };
        if spread < self.settings.min_spread_percent {
            return Ok(None);
        }

        let input = view.optimal_input();
        let Some(profit) = view.expected_profit(input) else {
            debug!("Profit for {} out of range, skipping", view.target.symbol);
            return Ok(None);
        };
        if input <= Decimal::ZERO || profit <= Decimal::ZERO {
            return Ok(None);
        }

        let quote_usd = match self.oracle.get_usd_price(view.quote.address).await {
            Ok(usd) => usd,
            Err(e) => {
                debug!("Cannot value {} in USD: {}", view.quote.symbol, e);
                return Ok(None);
            }
        };

        let Some(valued) = PairValuation::new(&view, input, profit, quote_usd) else {
            debug!("USD value of {} trade out of range, skipping", view.target.symbol);
            return Ok(None);
        };
        let gas_cost = self.gas_cost_for_legs(2).await;

        let opportunity = ArbitrageOpportunity {
            id: uuid::Uuid::new_v4().to_string(),
            kind: ArbitrageKind::Direct,
            token_address: view.target.address,
            token_symbol: view.target.symbol.clone(),
            path: vec![
                ArbitrageLeg {
                    pool_address: view.buy.pool.address,
                    venue: view.buy.pool.venue.clone(),
                    token_in: view.quote.address,
                    token_out: view.target.address,
                    rate: valued.buy_rate,
                    liquidity_usd: valued.liquidity_buy_usd,
                },
                ArbitrageLeg {
                    pool_address: view.sell.pool.address,
                    venue: view.sell.pool.venue.clone(),
                    token_in: view.target.address,
                    token_out: view.quote.address,
                    rate: view.sell.price,
                    liquidity_usd: valued.liquidity_sell_usd,
                },
            ],
            buy_price: view.buy.price,
            sell_price: view.sell.price,
            optimal_input_amount: input,
            input_value_usd: valued.input_value_usd,
            expected_profit_usd: valued.profit_usd,
            estimated_gas_cost_usd: gas_cost,
            confidence_score: confidence_score(valued.liquidity_buy_usd, valued.liquidity_sell_usd, spread),
            detected_at: Utc::now(),
        };

        debug!(
            token = %opportunity.token_symbol,
            spread = %spread.round_dp(3),
            net_profit_usd = %opportunity.net_profit_usd().round_dp(2),
            "Pairwise opportunity {} -> {}", view.buy.pool.label(), view.sell.pool.label()
        );

        Ok(Some(opportunity))
    }

    /// USD gas estimate for a two-pool round trip between the named pools.
    pub async fn estimate_gas_cost(&self, pool_a: Address, pool_b: Address) -> EngineResult<Decimal> {
        self.resolve_pool(pool_a).await?;
        self.resolve_pool(pool_b).await?;
        Ok(self.gas_cost_for_legs(2).await)
    }

    /// Sizes the trade between the named pools and simulates it through both curves.
    pub async fn calculate_optimal_amount(&self, pool_a: Address, pool_b: Address) -> EngineResult<OptimalTrade> {
        let a = self.resolve_pool(pool_a).await?;
        let b = self.resolve_pool(pool_b).await?;

        let view = self.pair_view(&a, &b).await?.ok_or_else(|| EngineError::NoLiquidity {
            token: if quote_side(&a) == a.token0 { a.token1 } else { a.token0 },
        })?;

        let input = view.optimal_input();
        let (Some(spread_percent), Some(expected_profit)) = (view.spread_percent(), view.expected_profit(input)) else {
            return Err(EngineError::InvalidArgument {
                message: format!("prices in {} and {} are too far apart to compare", pool_a, pool_b),
            });
        };
        let intermediate = amount_out(input, view.buy.quote_reserve, view.buy.target_reserve, view.buy.pool.fee_bps);
        let output = amount_out(
            intermediate,
            view.sell.target_reserve,
            view.sell.quote_reserve,
            view.sell.pool.fee_bps,
        );

        Ok(OptimalTrade {
            buy_pool: view.buy.pool.address,
            sell_pool: view.sell.pool.address,
            token_address: view.target.address,
            quote_token_address: view.quote.address,
            buy_price: view.buy.price,
            sell_price: view.sell.price,
            spread_percent,
            optimal_input: input,
            expected_intermediate_out: intermediate,
            expected_output: output,
            expected_profit,
            simulated_profit: output - input,
        })
    }

    pub(super) async fn gas_cost_for_legs(&self, legs: usize) -> Decimal {
        let eth_usd = match self.oracle.eth_usd_price().await {
            Ok(price) => Some(price),
            Err(e) => {
                debug!("ETH/USD unavailable for gas estimate: {}", e);
                None
            }
        };
        gas_cost_usd(legs, self.settings.gas_price_gwei, eth_usd)
    }

    pub(super) async fn load_token(&self, address: Address) -> EngineResult<Token> {
        self.tokens
            .get_token(address, self.settings.chain_id)
            .await?
            .ok_or(EngineError::TokenNotFound { address })
    }

    async fn resolve_pool(&self, address: Address) -> EngineResult<Pool> {
        self.pools
            .get_by_address(address, self.settings.chain_id)
            .await?
            .ok_or(EngineError::ArbitragePoolNotFound { address })
    }

    /// `None` when either pool has an empty side.
    async fn pair_view<'a>(&self, pool_a: &'a Pool, pool_b: &'a Pool) -> EngineResult<Option<PairView<'a>>> {
        if pool_a.pair_key() != pool_b.pair_key() {
            return Err(EngineError::InvalidArgument {
                message: format!("{} and {} trade different pairs", pool_a.address, pool_b.address),
            });
        }

        let quote_address = quote_side(pool_a);
        let target_address = if pool_a.token0 == quote_address { pool_a.token1 } else { pool_a.token0 };
        let quote = self.load_token(quote_address).await?;
        let target = self.load_token(target_address).await?;

        let (Some(side_a), Some(side_b)) = (pool_side(pool_a, &quote, &target), pool_side(pool_b, &quote, &target))
        else {
            return Ok(None);
        };

        let (buy, sell) = if side_a.price <= side_b.price {
            (side_a, side_b)
        } else {
            (side_b, side_a)
        };

        Ok(Some(PairView { quote, target, buy, sell }))
    }
}

fn pool_side<'a>(pool: &'a Pool, quote: &Token, target: &Token) -> Option<PoolSide<'a>> {
    let quote_reserve = normalize_reserve(pool.reserve_of(&quote.address)?, quote.decimals);
    let target_reserve = normalize_reserve(pool.reserve_of(&target.address)?, target.decimals);
    if quote_reserve.is_zero() || target_reserve.is_zero() {
        return None;
    }
    Some(PoolSide {
        pool,
        quote_reserve,
        target_reserve,
        price: quote_reserve.checked_div(target_reserve)?,
    })
}
