//! Retry logic with exponential backoff

use std::future::Future;
use std::time::Duration;
use tracing::warn;
use crate::errors::{EngineError, EngineResult};

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub exponential_base: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 100,
            max_delay_ms: 5000,
            exponential_base: 2.0,
        }
    }
}

/// Next delay: grown by the exponential base, capped, then jittered by up to ±5%.
fn next_delay(delay_ms: u64, config: &RetryConfig) -> u64 {
    let grown = ((delay_ms as f64 * config.exponential_base) as u64).min(config.max_delay_ms);
    let jitter = grown as f64 * 0.1 * (rand::random::<f64>() - 0.5);
    (grown as f64 + jitter).max(0.0) as u64
}

/// Re-runs `operation` while it fails with a transient error. Permanent errors are
/// returned as-is on the first attempt.
pub async fn retry_with_backoff<F, Fut, T>(operation: F, config: &RetryConfig, context: &str) -> EngineResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = EngineResult<T>>,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay_ms;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if !e.is_transient() => return Err(e),
            Err(e) if attempt >= config.max_attempts.max(1) => {
                return Err(EngineError::RetriesExhausted {
                    operation: context.to_string(),
                    attempts: attempt,
                    message: e.to_string(),
                });
            }
            Err(e) => {
                warn!(
                    "Attempt {}/{} failed for {}: {}. Retrying in {}ms...",
                    attempt, config.max_attempts, context, e, delay
                );

                tokio::time::sleep(Duration::from_millis(delay)).await;
                delay = next_delay(delay, config);
            }
        }
    }
}
