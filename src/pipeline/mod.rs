//! Ordered middleware chain around scan operations
//!
//! Layers are plain functions from handler to handler, composed once at startup. The
//! first layer added is the outermost: `logging -> timeout -> retry -> handler` logs
//! the whole call, bounds all attempts together, and retries the inner handler.
//! `isolate` goes outside all of them so a panic anywhere in the chain stays in its task.

pub mod retry;

pub use retry::*;

use futures::future::{BoxFuture, FutureExt};
use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};
use crate::errors::{EngineError, EngineResult};

pub type BoxHandler<T> = Arc<dyn Fn() -> BoxFuture<'static, EngineResult<T>> + Send + Sync>;
pub type Middleware<T> = Box<dyn Fn(BoxHandler<T>) -> BoxHandler<T> + Send + Sync>;

pub fn handler<T, F, Fut>(operation: F) -> BoxHandler<T>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = EngineResult<T>> + Send + 'static,
{
    Arc::new(move || operation().boxed())
}

pub struct Pipeline<T> {
    layers: Vec<Middleware<T>>,
}

impl<T: Send + 'static> Pipeline<T> {
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    pub fn layer(mut self, middleware: Middleware<T>) -> Self {
        self.layers.push(middleware);
        self
    }

    pub fn build(self, handler: BoxHandler<T>) -> BoxHandler<T> {
        self.layers.into_iter().rev().fold(handler, |inner, layer| layer(inner))
    }
}

impl<T: Send + 'static> Default for Pipeline<T> {
    fn default() -> Self {
        Self::new()
    }
}

pub fn logging<T: Send + 'static>(operation: &'static str) -> Middleware<T> {
    Box::new(move |inner: BoxHandler<T>| {
        handler(move || {
            let inner = inner.clone();
            async move {
                let started = Instant::now();
                debug!("{} started", operation);
                let result = inner().await;
                match &result {
                    Ok(_) => debug!(elapsed_ms = started.elapsed().as_millis() as u64, "{} finished", operation),
                    Err(e) => warn!(
                        code = e.code(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "{} failed: {}", operation, e
                    ),
                }
                result
            }
        })
    })
}

pub fn timeout<T: Send + 'static>(operation: &'static str, limit: Duration) -> Middleware<T> {
    Box::new(move |inner: BoxHandler<T>| {
        handler(move || {
            let inner = inner.clone();
            async move { with_timeout(operation, limit, inner()).await }
        })
    })
}

pub fn retry<T: Send + 'static>(operation: &'static str, config: RetryConfig) -> Middleware<T> {
    Box::new(move |inner: BoxHandler<T>| {
        let config = config.clone();
        handler(move || {
            let inner = inner.clone();
            let config = config.clone();
            async move { retry_with_backoff(|| inner(), &config, operation).await }
        })
    })
}

/// Runs each call on its own task. A panic comes back as `EngineError::Panicked`;
/// dropping the call aborts the task.
pub fn isolate<T: Send + 'static>(operation: &'static str) -> Middleware<T> {
    Box::new(move |inner: BoxHandler<T>| {
        handler(move || {
            let inner = inner.clone();
            async move { join_isolated(operation, AbortOnDrop(tokio::spawn(inner()))).await }
        })
    })
}

struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn join_isolated<T>(operation: &'static str, mut task: AbortOnDrop<EngineResult<T>>) -> EngineResult<T> {
    match (&mut task.0).await {
        Ok(result) => result,
        Err(e) if e.is_panic() => {
            let message = panic_message(e.into_panic());
            error!(operation, "{} panicked: {}", operation, message);
            Err(EngineError::Panicked {
                operation: operation.to_string(),
                message,
            })
        }
        Err(_) => Err(EngineError::Cancelled),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => payload
            .downcast_ref::<&str>()
            .map(|message| message.to_string())
            .unwrap_or_else(|| "non-string panic payload".to_string()),
    }
}

pub async fn with_timeout<T, Fut>(operation: &str, limit: Duration, future: Fut) -> EngineResult<T>
where
    Fut: Future<Output = EngineResult<T>>,
{
    tokio::time::timeout(limit, future)
        .await
        .map_err(|_| EngineError::Timeout {
            operation: operation.to_string(),
            elapsed: limit,
        })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn recording(name: &'static str, trace: Arc<Mutex<Vec<&'static str>>>) -> Middleware<u32> {
        Box::new(move |inner: BoxHandler<u32>| {
            let trace = trace.clone();
            handler(move || {
                let inner = inner.clone();
                let trace = trace.clone();
                async move {
                    trace.lock().unwrap().push(name);
                    inner().await
                }
            })
        })
    }

    #[tokio::test]
    async fn first_layer_runs_outermost() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let chain = Pipeline::new()
            .layer(recording("outer", trace.clone()))
            .layer(recording("inner", trace.clone()))
            .build(handler(|| async { Ok(7) }));

        assert_eq!(chain().await.unwrap(), 7);
        assert_eq!(*trace.lock().unwrap(), vec!["outer", "inner"]);
    }

    #[tokio::test]
    async fn timeout_becomes_engine_error() {
        let chain = Pipeline::new()
            .layer(timeout("slow scan", Duration::from_millis(10)))
            .build(handler(|| async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(1u32)
            }));

        let err = chain().await.unwrap_err();
        assert_eq!(err.code(), "Operation.Timeout");
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn panic_in_handler_becomes_failed_call() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let chain = Pipeline::new()
            .layer(isolate("scan"))
            .layer(logging("scan"))
            .build(handler(move || {
                let first = counter.fetch_add(1, Ordering::SeqCst) == 0;
                async move {
                    if first {
                        panic!("attempt to multiply with overflow");
                    }
                    Ok(3u32)
                }
            }));

        let err = chain().await.unwrap_err();
        assert_eq!(err.code(), "Operation.Panicked");
        assert!(err.to_string().contains("attempt to multiply with overflow"));

        // the next call runs normally
        assert_eq!(chain().await.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn dropping_isolated_call_aborts_task() {
        let finished = Arc::new(AtomicU32::new(0));
        let flag = finished.clone();
        let chain = Pipeline::new().layer(isolate("scan")).build(handler(move || {
            let flag = flag.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                flag.store(1, Ordering::SeqCst);
                Ok(1u32)
            }
        }));

        assert!(tokio::time::timeout(Duration::from_millis(10), chain()).await.is_err());
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn retry_layer_reruns_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let config = RetryConfig {
            max_attempts: 3,
            initial_delay_ms: 1,
            max_delay_ms: 2,
            exponential_base: 2.0,
        };

        let chain = Pipeline::new()
            .layer(logging("scan"))
            .layer(retry("scan", config))
            .build(handler(move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(EngineError::Repository {
                            message: "flaky".to_string(),
                            source: None,
                        })
                    } else {
                        Ok(5u32)
                    }
                }
            }));

        assert_eq!(chain().await.unwrap(), 5);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
