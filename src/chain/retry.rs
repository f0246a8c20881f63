//! Bounded retry for chain reads.
//!
//! Only `ChainError::is_transient` failures are retried. Signed sends never go
//! through here: resubmitting with a stale nonce is unsafe.

use crate::error::ChainError;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Default attempts for a read (first try included)
pub const DEFAULT_READ_ATTEMPTS: usize = 3;

/// Delay before the second attempt; doubles each time
pub const DEFAULT_READ_BACKOFF: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: usize,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_READ_ATTEMPTS,
            initial_delay: DEFAULT_READ_BACKOFF,
        }
    }
}

/// Retry a read with exponential backoff.
pub async fn retry_read<F, Fut, T>(label: &str, policy: RetryPolicy, mut op: F) -> Result<T, ChainError>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, ChainError>>,
{
    let mut delay = policy.initial_delay;
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_transient() && attempt < policy.attempts => {
                debug!("{} failed (attempt {}/{}): {} - retrying in {:?}", label, attempt, policy.attempts, e, delay);
                sleep(delay).await;
                delay = delay.saturating_mul(2);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast() -> RetryPolicy {
        RetryPolicy {
            attempts: 4,
            initial_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let counter = AtomicUsize::new(0);
        let res = retry_read("balance", fast(), |_| {
            let current = counter.fetch_add(1, Ordering::Relaxed);
            async move {
                if current < 2 {
                    Err(ChainError::Rpc("connection reset".into()))
                } else {
                    Ok(7u64)
                }
            }
        })
        .await;

        assert_eq!(res.unwrap(), 7);
        assert_eq!(counter.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_bounded_attempts() {
        let counter = AtomicUsize::new(0);
        let res: Result<u64, _> = retry_read("nonce", fast(), |_| {
            counter.fetch_add(1, Ordering::Relaxed);
            async { Err(ChainError::Rpc("timeout".into())) }
        })
        .await;

        assert!(res.is_err());
        assert_eq!(counter.load(Ordering::Relaxed), 4);
    }

    #[tokio::test]
    async fn test_non_transient_errors_are_not_retried() {
        let counter = AtomicUsize::new(0);
        let res: Result<u64, _> = retry_read("estimate", fast(), |_| {
            counter.fetch_add(1, Ordering::Relaxed);
            async { Err(ChainError::GasEstimation("execution reverted".into())) }
        })
        .await;

        assert_eq!(res, Err(ChainError::GasEstimation("execution reverted".into())));
        assert_eq!(counter.load(Ordering::Relaxed), 1);
    }
}
