//! Batch fan-out with per-item results
//!
//! [`gather`] runs one future per key, at most `max_concurrent` at a time, and
//! collects every result in input order. A failing item is recorded and never
//! cancels its siblings.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::Result;

/// Default number of requests in flight for one batch
pub const DEFAULT_MAX_CONCURRENT: usize = 10;

/// Semaphore-based limiter for concurrent API requests
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
}

impl ConcurrencyLimiter {
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    /// Wait for a permit; released when dropped. `None` only if the limiter was closed.
    pub async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        if self.semaphore.available_permits() == 0 {
            log::debug!(
                "Concurrency limiter: waiting for permit ({} in use)",
                self.max_concurrent
            );
        }
        self.semaphore.clone().acquire_owned().await.ok()
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }
}

impl Default for ConcurrencyLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT)
    }
}

/// Result of one batch item
#[derive(Debug)]
pub struct BatchOutcome<K, T> {
    pub key: K,
    pub result: Result<T>,
}

impl<K, T> BatchOutcome<K, T> {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Run `task` for every key and collect each outcome
pub async fn gather<K, T, F, Fut>(
    keys: impl IntoIterator<Item = K>,
    limiter: &ConcurrencyLimiter,
    task: F,
) -> Vec<BatchOutcome<K, T>>
where
    K: Clone,
    F: Fn(K) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let futures = keys.into_iter().map(|key| {
        let work = task(key.clone());
        async move {
            let _permit = limiter.acquire().await;
            BatchOutcome {
                key,
                result: work.await,
            }
        }
    });

    futures::future::join_all(futures).await
}

/// Log every outcome and return `(succeeded, failed)`
pub fn log_outcomes<K: Display, T>(action: &str, outcomes: &[BatchOutcome<K, T>]) -> (usize, usize) {
    let mut succeeded = 0;
    for outcome in outcomes {
        match &outcome.result {
            Ok(_) => {
                succeeded += 1;
                log::info!("Successfully {} {}", action, outcome.key);
            }
            Err(e) => log::error!("Failed to {} {}: {}", action, outcome.key, e),
        }
    }
    (succeeded, outcomes.len() - succeeded)
}
