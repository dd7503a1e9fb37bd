//! Display and printing utilities

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{info, warn};
use crate::{
    arbitrage::CycleReport,
    errors::CircuitBreaker,
    types::{ArbitrageKind, ArbitrageOpportunity},
};

/// Running totals for the scan loop.
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    pub cycles: u64,
    pub failed_cycles: u64,
    pub opportunities_published: u64,
    pub opportunities_suppressed: u64,
    pub alerts: u64,
    pub price_changes: u64,
    pub total_net_profit_usd: Decimal,
    pub best_net_profit_usd: Option<Decimal>,
    pub error_counts: HashMap<String, u32>,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cycle(&mut self, report: &CycleReport) {
        self.cycles += 1;
        self.opportunities_published += report.published.len() as u64;
        self.opportunities_suppressed += report.suppressed as u64;
        self.alerts += report.alerts as u64;
        self.price_changes += report.price_changes as u64;
        for opportunity in &report.published {
            self.total_net_profit_usd = self.total_net_profit_usd.saturating_add(opportunity.net_profit_usd());
        }
        if let Some(best) = report.best_net_profit_usd() {
            self.best_net_profit_usd = Some(self.best_net_profit_usd.map_or(best, |current| current.max(best)));
        }
    }

    pub fn record_failure(&mut self, code: &str) {
        self.cycles += 1;
        self.failed_cycles += 1;
        *self.error_counts.entry(code.to_string()).or_insert(0) += 1;
    }
}

pub fn print_opportunity(opportunity: &ArbitrageOpportunity) {
    let kind = match opportunity.kind {
        ArbitrageKind::Direct => "DIRECT",
        ArbitrageKind::Triangular => "TRIANGULAR",
    };
    warn!("\n🎯 {} ARBITRAGE #{}", kind, opportunity.id);
    warn!("🪙 Token: {} ({})", opportunity.token_symbol, opportunity.token_address);
    for (i, leg) in opportunity.path.iter().enumerate() {
        warn!(
            "   Leg {}: {} via {} | rate {:.6} | liquidity ${:.0}",
            i + 1,
            leg.pool_address,
            leg.venue,
            leg.rate,
            leg.liquidity_usd
        );
    }
    warn!("💰 Profit Analysis:");
    warn!("   Spread: {:.3}%", opportunity.spread_percent());
    warn!("   Input: {:.6} (${:.2})", opportunity.optimal_input_amount, opportunity.input_value_usd);
    warn!("   Expected Profit: ${:.2}", opportunity.expected_profit_usd);
    warn!("   Gas: ${:.4}", opportunity.estimated_gas_cost_usd);
    warn!("   Net Profit: ${:.2}", opportunity.net_profit_usd());
    warn!("   ROI: {:.3}%", opportunity.roi_percent());
    warn!("📊 Confidence: {}/100", opportunity.confidence_score);
}

pub fn print_cycle_report(report: &CycleReport) {
    info!(
        "🔍 Cycle: {} pairwise, {} triangular, {} new, {} repeat, {} alerts, {} price moves ({} ms)",
        report.pairwise_found,
        report.triangular_found,
        report.published.len(),
        report.suppressed,
        report.alerts,
        report.price_changes,
        report.duration.as_millis()
    );
}

pub async fn print_session_stats(start_time: Instant, stats: &SessionStats, circuit_breaker: &CircuitBreaker) {
    let runtime = start_time.elapsed().as_secs() / 60;

    info!("\n📊 Session Statistics ({} minutes)", runtime);
    info!("   📈 SCANNING:");
    info!("     Cycles: {} ({} failed)", stats.cycles, stats.failed_cycles);
    info!("     Opportunities published: {}", stats.opportunities_published);
    info!("     Repeats suppressed: {}", stats.opportunities_suppressed);
    info!("     Large alerts: {}", stats.alerts);
    info!("     Significant price moves: {}", stats.price_changes);
    info!("     Total net profit seen: ${:.2}", stats.total_net_profit_usd);
    if let Some(best) = stats.best_net_profit_usd {
        info!("     Best opportunity: ${:.2}", best);
    }

    info!("   ⚙️  SYSTEM:");
    info!(
        "     Circuit breaker: {}",
        if circuit_breaker.is_open().await { "OPEN" } else { "CLOSED" }
    );

    if !stats.error_counts.is_empty() {
        info!("     Error summary:");
        for (error_type, count) in stats.error_counts.iter() {
            info!("       {}: {}", error_type, count);
        }
    }

    info!("");
}
