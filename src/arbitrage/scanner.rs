//! One scan cycle: detect, deduplicate, alert and publish
//!
//! A cycle checks the shutdown flag between phases and publishes its events in a
//! single batch at the very end. Opportunities are marked as seen only after that
//! batch is accepted, so a cancelled or failed cycle leaves nothing half-announced.

use alloy::primitives::Address;
use chrono::Duration as ChronoDuration;
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use super::{dedup::OpportunityDeduplicator, detector::ArbitrageDetector};
use crate::{
    config::Config,
    errors::{EngineError, EngineResult},
    storage::EventSink,
    types::{
        ArbitrageOpportunity, ArbitrageOpportunityDetected, DomainEvent, LargeArbitrageAlert, QuoteCurrency,
        WETH_MAINNET, is_stablecoin,
    },
};

#[derive(Debug, Clone)]
pub struct ScannerSettings {
    pub min_profit_usd: Decimal,
    pub large_opportunity_usd: Decimal,
    pub min_confidence: u8,
    pub enable_triangular: bool,
    pub triangular_base_token: Address,
    pub price_change_threshold_pct: Decimal,
    pub price_change_window: ChronoDuration,
}

impl ScannerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            min_profit_usd: config.min_profit_usd,
            large_opportunity_usd: config.large_opportunity_usd,
            min_confidence: config.min_confidence,
            enable_triangular: config.enable_triangular,
            triangular_base_token: config.triangular_base_token,
            price_change_threshold_pct: config.price_change_threshold_pct,
            price_change_window: ChronoDuration::seconds(config.price_change_window_secs as i64),
        }
    }
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub pairwise_found: usize,
    pub triangular_found: usize,
    pub suppressed: usize,
    pub alerts: usize,
    pub price_changes: usize,
    /// Opportunities announced this cycle, best first.
    pub published: Vec<ArbitrageOpportunity>,
    pub duration: Duration,
}

impl CycleReport {
    pub fn events_published(&self) -> usize {
        self.published.len() + self.alerts + self.price_changes
    }

    pub fn best_net_profit_usd(&self) -> Option<Decimal> {
        self.published.iter().map(|opp| opp.net_profit_usd()).max()
    }
}

pub struct ArbitrageScanner {
    detector: Arc<ArbitrageDetector>,
    dedup: OpportunityDeduplicator,
    sink: Arc<dyn EventSink>,
    settings: ScannerSettings,
}

fn ensure_running(shutdown: &watch::Receiver<bool>) -> EngineResult<()> {
    if *shutdown.borrow() {
        return Err(EngineError::Cancelled);
    }
    Ok(())
}

impl ArbitrageScanner {
    pub fn new(
        detector: Arc<ArbitrageDetector>,
        dedup: OpportunityDeduplicator,
        sink: Arc<dyn EventSink>,
        settings: ScannerSettings,
    ) -> Self {
        Self {
            detector,
            dedup,
            sink,
            settings,
        }
    }

    pub fn dedup(&self) -> &OpportunityDeduplicator {
        &self.dedup
    }

    pub async fn run_cycle(&self, shutdown: &watch::Receiver<bool>) -> EngineResult<CycleReport> {
        let started = Instant::now();
        let mut report = CycleReport::default();

        ensure_running(shutdown)?;
        let mut candidates = self.detector.scan(self.settings.min_profit_usd).await?;
        report.pairwise_found = candidates.len();

        ensure_running(shutdown)?;
        if self.settings.enable_triangular {
            match self.detector.scan_triangular(self.settings.triangular_base_token).await {
                Ok(cycles) => {
                    let profitable: Vec<ArbitrageOpportunity> = cycles
                        .into_iter()
                        .filter(|opp| opp.net_profit_usd() >= self.settings.min_profit_usd)
                        .collect();
                    report.triangular_found = profitable.len();
                    candidates.extend(profitable);
                }
                Err(e) => warn!(code = e.code(), "Triangular scan skipped: {}", e),
            }
        }
        candidates.sort_by(|a, b| b.net_profit_usd().cmp(&a.net_profit_usd()));

        let total = candidates.len();
        let fresh = self.dedup.filter_new(candidates).await;
        report.suppressed = total - fresh.len();

        let mut events = Vec::with_capacity(fresh.len());
        for opportunity in &fresh {
            events.push(DomainEvent::ArbitrageOpportunityDetected(ArbitrageOpportunityDetected::from(
                opportunity,
            )));
            if self.is_large(opportunity) {
                report.alerts += 1;
                events.push(DomainEvent::LargeArbitrageAlert(LargeArbitrageAlert::from(opportunity)));
            }
        }

        ensure_running(shutdown)?;
        for token in self.price_watch_tokens(&fresh) {
            match self
                .detector
                .oracle()
                .detect_price_change(
                    token,
                    QuoteCurrency::Usdc,
                    self.settings.price_change_window,
                    self.settings.price_change_threshold_pct,
                )
                .await
            {
                Ok(Some(change)) => {
                    report.price_changes += 1;
                    events.push(DomainEvent::SignificantPriceChange(change));
                }
                Ok(None) => {}
                Err(e) => debug!("Price change check skipped for {}: {}", token, e),
            }
        }

        ensure_running(shutdown)?;
        if !events.is_empty() {
            self.sink.publish(&events).await?;
        }
        self.dedup.commit(&fresh).await;

        report.published = fresh;
        report.duration = started.elapsed();

        info!(
            pairwise = report.pairwise_found,
            triangular = report.triangular_found,
            published = report.published.len(),
            suppressed = report.suppressed,
            alerts = report.alerts,
            price_changes = report.price_changes,
            elapsed_ms = report.duration.as_millis() as u64,
            "Scan cycle complete"
        );

        Ok(report)
    }

    fn is_large(&self, opportunity: &ArbitrageOpportunity) -> bool {
        opportunity.net_profit_usd() >= self.settings.large_opportunity_usd
            && opportunity.confidence_score >= self.settings.min_confidence
    }

    /// The triangular base plus every token in a published opportunity, stablecoins
    /// excluded since they are quoted against themselves.
    fn price_watch_tokens(&self, fresh: &[ArbitrageOpportunity]) -> BTreeSet<Address> {
        let base = if self.settings.enable_triangular {
            self.settings.triangular_base_token
        } else {
            WETH_MAINNET
        };
        std::iter::once(base)
            .chain(fresh.iter().map(|opp| opp.token_address))
            .filter(|token| !is_stablecoin(token))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryEventSink;
    use crate::testing::{base_store, detector, pool, tkn, weth};
    use rust_decimal_macros::dec;

    async fn scanner(settings: ScannerSettings) -> (ArbitrageScanner, Arc<MemoryEventSink>) {
        let store = base_store().await;
        store
            .upsert_pool(pool(Address::repeat_byte(0xa1), &tkn(), dec!(1000), &weth(), dec!(1)))
            .await
            .unwrap();
        store
            .upsert_pool(pool(Address::repeat_byte(0xa2), &tkn(), dec!(1000), &weth(), dec!(1.01)))
            .await
            .unwrap();

        let sink = Arc::new(MemoryEventSink::new());
        let scanner = ArbitrageScanner::new(
            Arc::new(detector(&store)),
            OpportunityDeduplicator::default(),
            sink.clone(),
            settings,
        );
        (scanner, sink)
    }

    #[tokio::test]
    async fn publishes_detection_once_across_cycles() {
        let (scanner, sink) = scanner(ScannerSettings::default()).await;
        let (_tx, rx) = watch::channel(false);

        let first = scanner.run_cycle(&rx).await.unwrap();
        assert_eq!(first.published.len(), 1);
        assert_eq!(first.alerts, 0);

        let second = scanner.run_cycle(&rx).await.unwrap();
        assert!(second.published.is_empty());
        assert_eq!(second.suppressed, 1);

        assert_eq!(sink.count("ArbitrageOpportunityDetected").await, 1);
    }

    #[tokio::test]
    async fn large_alert_needs_profit_and_confidence() {
        let settings = ScannerSettings {
            large_opportunity_usd: dec!(1),
            min_confidence: 0,
            ..ScannerSettings::default()
        };
        let (scanner, sink) = scanner(settings).await;
        let (_tx, rx) = watch::channel(false);

        let report = scanner.run_cycle(&rx).await.unwrap();
        assert_eq!(report.alerts, 1);
        assert_eq!(sink.count("LargeArbitrageAlert").await, 1);
    }

    #[tokio::test]
    async fn cancelled_cycle_publishes_nothing() {
        let (scanner, sink) = scanner(ScannerSettings::default()).await;
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let err = scanner.run_cycle(&rx).await.unwrap_err();
        assert_eq!(err.code(), "Scan.Cancelled");
        assert!(sink.events().await.is_empty());
        assert!(scanner.dedup().is_empty().await);
    }

    #[tokio::test]
    async fn failed_publish_leaves_opportunity_unseen() {
        let (scanner, sink) = scanner(ScannerSettings::default()).await;
        let (_tx, rx) = watch::channel(false);

        sink.fail_next();
        assert!(scanner.run_cycle(&rx).await.is_err());
        assert!(scanner.dedup().is_empty().await);

        let retried = scanner.run_cycle(&rx).await.unwrap();
        assert_eq!(retried.published.len(), 1);
    }
}
