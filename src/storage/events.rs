//! Outbound event sinks

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::info;
use crate::{
    errors::{EngineError, EngineResult},
    types::DomainEvent,
};

/// Receives each cycle's events in one batch; a failed publish leaves the batch
/// unacknowledged.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, events: &[DomainEvent]) -> EngineResult<()>;
}

/// Appends events as JSON lines to `<dir>/events_<date>.jsonl`.
pub struct JsonlEventSink {
    dir: PathBuf,
}

impl JsonlEventSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write_batch(&self, events: &[DomainEvent]) -> anyhow::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        let filename = self.dir.join(format!("events_{}.jsonl", Utc::now().format("%Y-%m-%d")));

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&filename)
            .with_context(|| format!("Failed to open {}", filename.display()))?;

        let mut buffer = String::new();
        for event in events {
            buffer.push_str(&serde_json::to_string(event)?);
            buffer.push('\n');
        }
        file.write_all(buffer.as_bytes())?;
        Ok(filename)
    }
}

#[async_trait]
impl EventSink for JsonlEventSink {
    async fn publish(&self, events: &[DomainEvent]) -> EngineResult<()> {
        if events.is_empty() {
            return Ok(());
        }

        let filename = self
            .write_batch(events)
            .map_err(|e| EngineError::repository("Failed to append events", e))?;

        for event in events {
            match event {
                DomainEvent::ArbitrageOpportunityDetected(detected) => info!(
                    event = event.name(),
                    opportunity_id = %detected.opportunity_id,
                    token = %detected.token_symbol,
                    net_profit_usd = %detected.net_profit_usd.round_dp(2),
                    "Published event"
                ),
                DomainEvent::LargeArbitrageAlert(alert) => info!(
                    event = event.name(),
                    opportunity_id = %alert.opportunity_id,
                    token = %alert.token_symbol,
                    net_profit_usd = %alert.net_profit_usd.round_dp(2),
                    confidence = alert.confidence_score,
                    "Published event"
                ),
                DomainEvent::SignificantPriceChange(change) => info!(
                    event = event.name(),
                    token = %change.token_address,
                    change_percent = %change.price_change_percent.round_dp(2),
                    "Published event"
                ),
            }
        }

        info!(count = events.len(), file = %filename.display(), "Saved event batch");
        Ok(())
    }
}

/// Collects events in memory.
#[derive(Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<DomainEvent>>,
    fail_next: AtomicBool,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().await.clone()
    }

    pub async fn count(&self, name: &str) -> usize {
        self.events.lock().await.iter().filter(|event| event.name() == name).count()
    }

    /// Makes the next publish fail with a repository error.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl EventSink for MemoryEventSink {
    async fn publish(&self, events: &[DomainEvent]) -> EngineResult<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(EngineError::Repository {
                message: "event sink unavailable".to_string(),
                source: None,
            });
        }
        self.events.lock().await.extend_from_slice(events);
        Ok(())
    }
}
