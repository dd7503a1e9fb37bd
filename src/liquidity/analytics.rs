//! Pool metrics, impermanent loss and concentration over repository state

use alloy::primitives::Address;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tracing::{debug, warn};
use super::{concentration::market_shares, depth::depth_score, impermanent_loss::impermanent_loss};
use crate::{
    errors::{EngineError, EngineResult},
    pricing::{PriceOracle, normalize_reserve, price_from_reserves},
    repository::{PoolRepository, TokenRepository},
    types::{
        ConcentrationLevel, ImpermanentLossResult, LiquidityConcentration, LiquidityMetrics, Pool,
        PoolLiquiditySummary, Token, TokenLiquiditySummary,
    },
};

const DAYS_PER_YEAR: Decimal = dec!(365);

pub struct LiquidityAnalytics {
    pools: Arc<dyn PoolRepository>,
    tokens: Arc<dyn TokenRepository>,
    oracle: Arc<PriceOracle>,
}

impl LiquidityAnalytics {
    pub fn new(pools: Arc<dyn PoolRepository>, tokens: Arc<dyn TokenRepository>, oracle: Arc<PriceOracle>) -> Self {
        Self { pools, tokens, oracle }
    }

    pub async fn pool_metrics(&self, pool_address: Address) -> EngineResult<LiquidityMetrics> {
        let pool = self.resolve_pool(pool_address).await?;
        self.metrics_for_pool(&pool).await
    }

    /// A side whose USD price cannot be resolved counts as zero. A pool whose USD value
    /// leaves `Decimal` range is rejected with `Validation.InvalidArgument`.
    pub async fn metrics_for_pool(&self, pool: &Pool) -> EngineResult<LiquidityMetrics> {
        let token0 = self.load_token(pool.token0).await?;
        let token1 = self.load_token(pool.token1).await?;
        let out_of_range = || EngineError::InvalidArgument {
            message: format!("value of pool {} is out of range", pool.address),
        };

        let reserve0 = normalize_reserve(pool.reserve0, token0.decimals);
        let reserve1 = normalize_reserve(pool.reserve1, token1.decimals);
        let reserve0_usd = reserve0
            .checked_mul(self.usd_or_zero(&token0).await)
            .ok_or_else(out_of_range)?;
        let reserve1_usd = reserve1
            .checked_mul(self.usd_or_zero(&token1).await)
            .ok_or_else(out_of_range)?;
        let tvl_usd = reserve0_usd.checked_add(reserve1_usd).ok_or_else(out_of_range)?;

        let fee_percent = Decimal::from(pool.fee_bps) / dec!(100);
        let fees_24h_usd = pool
            .volume_24h_usd
            .checked_mul(fee_percent)
            .ok_or_else(out_of_range)?
            / dec!(100);
        let apr_percent = if tvl_usd.is_zero() {
            Decimal::ZERO
        } else {
            fees_24h_usd
                .checked_mul(DAYS_PER_YEAR)
                .and_then(|yearly| yearly.checked_div(tvl_usd))
                .and_then(|apr| apr.checked_mul(dec!(100)))
                .ok_or_else(out_of_range)?
        };

        Ok(LiquidityMetrics {
            pool_address: pool.address,
            token0: pool.token0,
            token1: pool.token1,
            reserve0,
            reserve1,
            reserve0_usd,
            reserve1_usd,
            tvl_usd,
            volume_24h_usd: pool.volume_24h_usd,
            fee_percent,
            fees_24h_usd,
            apr_percent,
            depth_score: depth_score(tvl_usd, pool.volume_24h_usd),
        })
    }

    /// Loss versus holding for a position entered at `entry_price_ratio` (token0 priced
    /// in token1).
    pub async fn impermanent_loss(
        &self,
        pool_address: Address,
        entry_price_ratio: Decimal,
        initial_investment_usd: Decimal,
    ) -> EngineResult<ImpermanentLossResult> {
        let pool = self.resolve_pool(pool_address).await?;
        let token0 = self.load_token(pool.token0).await?;
        let token1 = self.load_token(pool.token1).await?;

        let current = price_from_reserves(pool.reserve0, pool.reserve1, token0.decimals, token1.decimals, true);
        if current.is_zero() {
            return Err(EngineError::NoLiquidity { token: pool.token0 });
        }

        impermanent_loss(entry_price_ratio, current, initial_investment_usd)
    }

    pub async fn token_liquidity_summary(&self, token: Address) -> EngineResult<TokenLiquiditySummary> {
        let token_info = self.load_token(token).await?;
        let pools = self.pools.get_pools_by_token(token, self.oracle.chain_id()).await?;

        let mut metrics = Vec::with_capacity(pools.len());
        for pool in &pools {
            match self.metrics_for_pool(pool).await {
                Ok(pool_metrics) => metrics.push((pool, pool_metrics)),
                Err(e) => warn!(code = e.code(), "Leaving pool {} out of {} summary: {}", pool.address, token_info.symbol, e),
            }
        }

        let tvls: Vec<Decimal> = metrics.iter().map(|(_, m)| m.tvl_usd).collect();
        let shares = market_shares(&tvls);
        let hhi: Decimal = shares.iter().map(|share| share * share).sum();
        let total_liquidity_usd = tvls.iter().fold(Decimal::ZERO, |sum, tvl| sum.saturating_add(*tvl));

        let mut summaries: Vec<PoolLiquiditySummary> = metrics
            .iter()
            .enumerate()
            .map(|(i, (pool, m))| PoolLiquiditySummary {
                pool_address: pool.address,
                venue: pool.venue.clone(),
                paired_token: pool.other_token(&token).unwrap_or(Address::ZERO),
                tvl_usd: m.tvl_usd,
                volume_24h_usd: m.volume_24h_usd,
                depth_score: m.depth_score,
                share_percent: shares.get(i).copied().unwrap_or(Decimal::ZERO) * dec!(100),
            })
            .collect();
        summaries.sort_by(|a, b| b.tvl_usd.cmp(&a.tvl_usd));

        let concentration = ConcentrationLevel::from_hhi(hhi, summaries.len());
        debug!(
            token = %token_info.symbol,
            pools = summaries.len(),
            hhi = %hhi.round_dp(4),
            level = %concentration,
            "Liquidity concentration"
        );

        Ok(TokenLiquiditySummary {
            token_address: token,
            token_symbol: token_info.symbol,
            pool_count: summaries.len(),
            total_liquidity_usd,
            total_volume_24h_usd: metrics
                .iter()
                .fold(Decimal::ZERO, |sum, (_, m)| sum.saturating_add(m.volume_24h_usd)),
            hhi,
            concentration,
            pools: summaries,
        })
    }

    pub async fn liquidity_concentration(&self, token: Address) -> EngineResult<LiquidityConcentration> {
        let summary = self.token_liquidity_summary(token).await?;
        Ok(LiquidityConcentration::from(&summary))
    }

    async fn usd_or_zero(&self, token: &Token) -> Decimal {
        match self.oracle.get_usd_price(token.address).await {
            Ok(price) => price,
            Err(e) => {
                debug!("Valuing {} at zero: {}", token.symbol, e);
                Decimal::ZERO
            }
        }
    }

    async fn resolve_pool(&self, address: Address) -> EngineResult<Pool> {
        self.pools
            .get_by_address(address, self.oracle.chain_id())
            .await?
            .ok_or(EngineError::PoolNotFound { address })
    }

    async fn load_token(&self, address: Address) -> EngineResult<Token> {
        self.tokens
            .get_token(address, self.oracle.chain_id())
            .await?
            .ok_or(EngineError::TokenNotFound { address })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ETH_USD_POOL, TKN, base_store, oracle, pool, tkn, token, usdc, weth};
    use crate::repository::InMemoryStore;
    use crate::types::WETH_MAINNET;

    fn analytics(store: &Arc<InMemoryStore>) -> LiquidityAnalytics {
        LiquidityAnalytics::new(store.clone(), store.clone(), oracle(store))
    }

    #[tokio::test]
    async fn metrics_value_both_sides_in_usd() {
        let store = base_store().await;
        let mut busy = pool(ETH_USD_POOL, &weth(), dec!(1000), &usdc(), dec!(2_000_000));
        busy.volume_24h_usd = dec!(400_000);
        store.upsert_pool(busy).await.unwrap();

        let metrics = analytics(&store).pool_metrics(ETH_USD_POOL).await.unwrap();
        assert_eq!(metrics.reserve0_usd, dec!(2_000_000));
        assert_eq!(metrics.reserve1_usd, dec!(2_000_000));
        assert_eq!(metrics.tvl_usd, dec!(4_000_000));
        assert_eq!(metrics.fee_percent, dec!(0.3));
        assert_eq!(metrics.fees_24h_usd, dec!(1200));
        assert_eq!(metrics.apr_percent, dec!(10.95));
        assert_eq!(metrics.depth_score, 80);
    }

    #[tokio::test]
    async fn unpriced_side_is_valued_at_zero() {
        let store = base_store().await;
        let other = token(Address::repeat_byte(0x22), "OTH", 18);
        store.upsert_token(other.clone()).await.unwrap();
        let address = Address::repeat_byte(0xa2);
        store.upsert_pool(pool(address, &tkn(), dec!(10), &other, dec!(10))).await.unwrap();

        let metrics = analytics(&store).pool_metrics(address).await.unwrap();
        assert_eq!(metrics.tvl_usd, Decimal::ZERO);
        assert_eq!(metrics.apr_percent, Decimal::ZERO);
        assert_eq!(metrics.depth_score, 0);
    }

    #[tokio::test]
    async fn pool_worth_more_than_decimal_range_is_rejected() {
        let store = base_store().await;
        // 1 wei of TKN against 1e9 USDC prices TKN at 1e27 USD
        store
            .upsert_pool(pool(Address::repeat_byte(0xa1), &tkn(), dec!(0.000000000000000001), &usdc(), dec!(1_000_000_000)))
            .await
            .unwrap();
        let tkn_weth = Address::repeat_byte(0xa2);
        store.upsert_pool(pool(tkn_weth, &tkn(), dec!(1000), &weth(), dec!(1))).await.unwrap();
        let analytics = analytics(&store);

        let err = analytics.pool_metrics(tkn_weth).await.unwrap_err();
        assert_eq!(err.code(), "Validation.InvalidArgument");

        let summary = analytics.token_liquidity_summary(TKN).await.unwrap();
        assert_eq!(summary.pool_count, 1);
        assert_eq!(summary.pools[0].pool_address, Address::repeat_byte(0xa1));
    }

    #[tokio::test]
    async fn impermanent_loss_reads_current_ratio_from_reserves() {
        let store = base_store().await;
        let analytics = analytics(&store);

        // pool prices WETH at 2000 USDC; entered at 500
        let result = analytics.impermanent_loss(ETH_USD_POOL, dec!(500), dec!(1000)).await.unwrap();
        assert_eq!(result.current_price_ratio, dec!(2000));
        assert_eq!(result.impermanent_loss_percent, dec!(-20));

        let err = analytics
            .impermanent_loss(Address::repeat_byte(0x77), dec!(1), dec!(1000))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "Pool.NotFound");
    }

    #[tokio::test]
    async fn dry_pool_has_no_loss_figure() {
        let store = base_store().await;
        let address = Address::repeat_byte(0xa1);
        store.upsert_pool(pool(address, &tkn(), Decimal::ZERO, &weth(), dec!(1))).await.unwrap();

        let err = analytics(&store).impermanent_loss(address, dec!(1), dec!(1000)).await.unwrap_err();
        assert_eq!(err.code(), "Price.NoLiquidity");
    }

    #[tokio::test]
    async fn concentration_over_token_pools() {
        let store = base_store().await;
        // 4,000,000 in the main pool vs 40,000 in a second WETH/USDC pool
        store
            .upsert_pool(pool(Address::repeat_byte(0xe2), &weth(), dec!(10), &usdc(), dec!(20_000)))
            .await
            .unwrap();

        let analytics = analytics(&store);
        let summary = analytics.token_liquidity_summary(WETH_MAINNET).await.unwrap();
        assert_eq!(summary.pool_count, 2);
        assert_eq!(summary.total_liquidity_usd, dec!(4_040_000));
        assert_eq!(summary.pools[0].pool_address, ETH_USD_POOL);
        assert_eq!(summary.concentration, ConcentrationLevel::High);

        let shares: Decimal = summary.pools.iter().map(|p| p.share_percent).sum();
        assert!((shares - dec!(100)).abs() < dec!(0.0000001));
    }

    #[tokio::test]
    async fn token_without_pools_has_no_liquidity() {
        let store = base_store().await;
        let concentration = analytics(&store).liquidity_concentration(TKN).await.unwrap();
        assert_eq!(concentration.pool_count, 0);
        assert_eq!(concentration.hhi, Decimal::ZERO);
        assert_eq!(concentration.concentration, ConcentrationLevel::NoLiquidity);
    }
}
