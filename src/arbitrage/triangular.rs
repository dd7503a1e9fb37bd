//! Three-pool cycles that start and end in a base token

use alloy::primitives::Address;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use tracing::{debug, info};
use super::{confidence::confidence_score, detector::ArbitrageDetector};
use crate::{
    errors::EngineResult,
    pricing::{normalize_reserve, price_from_reserves},
    types::{ArbitrageKind, ArbitrageLeg, ArbitrageOpportunity, Pool, Token},
};

/// A closed route `base -> x -> y -> base`, one pool per hop.
#[derive(Debug, Clone)]
struct Cycle<'a> {
    pools: [&'a Pool; 3],
    tokens: [Address; 4],
    rates: [Decimal; 3],
    product: Decimal,
}

impl Cycle<'_> {
    /// Amount of base returned per unit in; `None` when it leaves `Decimal` range.
    fn product_of(rates: &[Decimal; 3]) -> Option<Decimal> {
        rates.iter().try_fold(Decimal::ONE, |acc, rate| acc.checked_mul(*rate))
    }

    fn pool_set(&self) -> [Address; 3] {
        let mut set = self.pools.map(|pool| pool.address);
        set.sort();
        set
    }
}

/// Lazily filled token and USD price lookups for one scan.
struct Lookups<'d> {
    detector: &'d ArbitrageDetector,
    tokens: HashMap<Address, Option<Token>>,
    usd: HashMap<Address, Decimal>,
}

impl<'d> Lookups<'d> {
    fn new(detector: &'d ArbitrageDetector) -> Self {
        Self {
            detector,
            tokens: HashMap::new(),
            usd: HashMap::new(),
        }
    }

    async fn token(&mut self, address: Address) -> Option<Token> {
        if let Some(cached) = self.tokens.get(&address) {
            return cached.clone();
        }
        let token = match self.detector.load_token(address).await {
            Ok(token) => Some(token),
            Err(e) => {
                debug!("Skipping cycles through {}: {}", address, e);
                None
            }
        };
        self.tokens.insert(address, token.clone());
        token
    }

    /// Zero when the token has no USD route.
    async fn usd_price(&mut self, address: Address) -> Decimal {
        if let Some(price) = self.usd.get(&address) {
            return *price;
        }
        let price = self.detector.oracle.get_usd_price(address).await.unwrap_or(Decimal::ZERO);
        self.usd.insert(address, price);
        price
    }

    /// Spot amount of `token_out` received per `token_in` in `pool`.
    async fn rate(&mut self, pool: &Pool, token_in: Address) -> Option<Decimal> {
        let token_out = pool.other_token(&token_in)?;
        let decimals_in = self.token(token_in).await?.decimals;
        let decimals_out = self.token(token_out).await?.decimals;
        let is_token0_in = pool.token0 == token_in;
        let (decimals0, decimals1) = if is_token0_in {
            (decimals_in, decimals_out)
        } else {
            (decimals_out, decimals_in)
        };
        let rate = price_from_reserves(pool.reserve0, pool.reserve1, decimals0, decimals1, is_token0_in);
        (!rate.is_zero()).then_some(rate)
    }

    /// `None` when the pool's USD value leaves `Decimal` range.
    async fn pool_liquidity_usd(&mut self, pool: &Pool) -> Option<Decimal> {
        let mut total = Decimal::ZERO;
        for (token, raw) in [(pool.token0, pool.reserve0), (pool.token1, pool.reserve1)] {
            let Some(info) = self.token(token).await else {
                continue;
            };
            let usd = self.usd_price(token).await;
            total = total.checked_add(normalize_reserve(raw, info.decimals).checked_mul(usd)?)?;
        }
        Some(total)
    }
}

impl ArbitrageDetector {
    /// Finds profitable `base -> x -> y -> base` cycles. Each set of three pools is
    /// reported at most once, in its most profitable direction.
    pub async fn scan_triangular(&self, base: Address) -> EngineResult<Vec<ArbitrageOpportunity>> {
        let base_token = self.load_token(base).await?;
        let pools = self.pools.get_all_by_chain_id(self.settings.chain_id).await?;
        let mut lookups = Lookups::new(self);

        let base_usd = lookups.usd_price(base).await;
        if base_usd.is_zero() {
            debug!("No USD price for {}, skipping triangular scan", base_token.symbol);
            return Ok(Vec::new());
        }

        let mut best: HashMap<[Address; 3], Cycle> = HashMap::new();

        for first in pools.iter().filter(|pool| pool.contains(&base)) {
            let Some(x) = first.other_token(&base) else { continue };
            let Some(rate1) = lookups.rate(first, base).await else { continue };

            for second in pools.iter().filter(|pool| pool.contains(&x) && pool.address != first.address) {
                let Some(y) = second.other_token(&x) else { continue };
                if y == base {
                    continue;
                }
                let Some(rate2) = lookups.rate(second, x).await else { continue };

                for third in pools.iter().filter(|pool| {
                    pool.contains(&y) && pool.contains(&base) && pool.address != first.address && pool.address != second.address
                }) {
                    let Some(rate3) = lookups.rate(third, y).await else { continue };

                    let rates = [rate1, rate2, rate3];
                    let Some(product) = Cycle::product_of(&rates) else {
                        debug!(
                            "Cycle {} -> {} -> {} out of range, skipping",
                            first.address, second.address, third.address
                        );
                        continue;
                    };
                    let cycle = Cycle {
                        pools: [first, second, third],
                        tokens: [base, x, y, base],
                        rates,
                        product,
                    };
                    let key = cycle.pool_set();
                    let better = best.get(&key).is_none_or(|existing| cycle.product > existing.product);
                    if better {
                        best.insert(key, cycle);
                    }
                }
            }
        }

        let mut opportunities = Vec::new();
        for cycle in best.values() {
            if cycle.product <= self.settings.triangular_min_product {
                continue;
            }
            match self.price_cycle(cycle, &base_token, base_usd, &mut lookups).await {
                Some(opportunity) => opportunities.push(opportunity),
                None => debug!("Cycle through {:?} has no representable size, skipping", cycle.pool_set()),
            }
        }

        opportunities.sort_by(|a, b| b.net_profit_usd().cmp(&a.net_profit_usd()));

        info!(
            base = %base_token.symbol,
            cycles = best.len(),
            found = opportunities.len(),
            "Triangular scan complete"
        );

        Ok(opportunities)
    }

    async fn price_cycle(
        &self,
        cycle: &Cycle<'_>,
        base: &Token,
        base_usd: Decimal,
        lookups: &mut Lookups<'_>,
    ) -> Option<ArbitrageOpportunity> {
        let mut path = Vec::with_capacity(3);
        let mut min_liquidity: Option<Decimal> = None;

        for (i, pool) in cycle.pools.iter().enumerate() {
            let liquidity_usd = lookups.pool_liquidity_usd(pool).await?;
            min_liquidity = Some(min_liquidity.map_or(liquidity_usd, |current| current.min(liquidity_usd)));
            path.push(ArbitrageLeg {
                pool_address: pool.address,
                venue: pool.venue.clone(),
                token_in: cycle.tokens[i],
                token_out: cycle.tokens[i + 1],
                rate: cycle.rates[i],
                liquidity_usd,
            });
        }

        let min_liquidity = min_liquidity?;
        let size_usd = min_liquidity.checked_mul(self.settings.triangular_size_share)?;
        if size_usd <= Decimal::ZERO {
            return None;
        }

        let gross_return = cycle.product - Decimal::ONE;
        let optimal_input_amount = size_usd.checked_div(base_usd)?;
        let expected_profit_usd = size_usd.checked_mul(gross_return)?;
        let gross_return_percent = gross_return.checked_mul(dec!(100))?;
        let gas_cost = self.gas_cost_for_legs(3).await;

        Some(ArbitrageOpportunity {
            id: uuid::Uuid::new_v4().to_string(),
            kind: ArbitrageKind::Triangular,
            token_address: base.address,
            token_symbol: base.symbol.clone(),
            path,
            buy_price: Decimal::ONE,
            sell_price: cycle.product,
            optimal_input_amount,
            input_value_usd: size_usd,
            expected_profit_usd,
            estimated_gas_cost_usd: gas_cost,
            confidence_score: confidence_score(min_liquidity, min_liquidity, gross_return_percent),
            detected_at: Utc::now(),
        })
    }
}
