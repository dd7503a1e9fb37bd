//! Circuit breaker guarding the scan loop

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{error, info};

pub struct CircuitBreaker {
    pub consecutive_errors: Arc<RwLock<u32>>,
    pub is_open: Arc<RwLock<bool>>,
    pub last_error_time: Arc<RwLock<Option<Instant>>>,
    pub max_consecutive_errors: u32,
    pub cooldown_duration: Duration,
}

impl CircuitBreaker {
    pub fn new(max_consecutive_errors: u32, cooldown: Duration) -> Self {
        Self {
            consecutive_errors: Arc::new(RwLock::new(0)),
            is_open: Arc::new(RwLock::new(false)),
            last_error_time: Arc::new(RwLock::new(None)),
            max_consecutive_errors: max_consecutive_errors.max(1),
            cooldown_duration: cooldown,
        }
    }

    pub async fn record_success(&self) {
        *self.consecutive_errors.write().await = 0;
        *self.is_open.write().await = false;
    }

    /// Returns true when this error opened the breaker.
    pub async fn record_error(&self) -> bool {
        let mut errors = self.consecutive_errors.write().await;
        *errors += 1;

        if *errors >= self.max_consecutive_errors {
            let mut is_open = self.is_open.write().await;
            let newly_opened = !*is_open;
            *is_open = true;
            *self.last_error_time.write().await = Some(Instant::now());
            if newly_opened {
                error!("Circuit breaker OPEN after {} consecutive errors", *errors);
            }
            return newly_opened;
        }
        false
    }

    pub async fn can_proceed(&self) -> bool {
        let is_open = *self.is_open.read().await;
        if !is_open {
            return true;
        }

        if let Some(last_error) = *self.last_error_time.read().await {
            if last_error.elapsed() > self.cooldown_duration {
                info!("Circuit breaker cooldown complete, resetting");
                *self.is_open.write().await = false;
                *self.consecutive_errors.write().await = 0;
                return true;
            }
        }
        false
    }

    pub async fn is_open(&self) -> bool {
        *self.is_open.read().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_after_threshold_and_resets_on_success() {
        let breaker = CircuitBreaker::new(2, Duration::from_secs(60));
        assert!(!breaker.record_error().await);
        assert!(breaker.can_proceed().await);
        assert!(breaker.record_error().await);
        assert!(!breaker.can_proceed().await);

        breaker.record_success().await;
        assert!(breaker.can_proceed().await);
        assert_eq!(*breaker.consecutive_errors.read().await, 0);
    }

    #[tokio::test]
    async fn closes_after_cooldown() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(10));
        assert!(breaker.record_error().await);
        assert!(!breaker.can_proceed().await);
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert!(breaker.can_proceed().await);
        assert!(!breaker.is_open().await);
    }
}
