//! Cycle scheduling.
//!
//! One cycle runs to completion, then exactly one continuation is scheduled
//! for the next wallet after a random delay. Time comes from a `Clock` so
//! tests can run many cycles without waiting.

use super::planner::Sampler;
use alloy::primitives::Address;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Return once `at` has passed
    async fn sleep_until(&self, at: DateTime<Utc>);
}

/// Wall clock backed by `tokio::time`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep_until(&self, at: DateTime<Utc>) {
        if let Ok(remaining) = (at - Utc::now()).to_std() {
            tokio::time::sleep(remaining).await;
        }
    }
}

#[async_trait]
impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }

    async fn sleep_until(&self, at: DateTime<Utc>) {
        (**self).sleep_until(at).await
    }
}

/// The single outstanding continuation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledCycle {
    pub wallet: Address,
    pub derivation_index: u32,
    pub trigger_at: DateTime<Utc>,
    pub delay: Duration,
}

impl fmt::Display for ScheduledCycle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "wallet #{} {:?} at {} (in {}s)",
            self.derivation_index,
            self.wallet,
            self.trigger_at.format("%Y-%m-%d %H:%M:%S UTC"),
            self.delay.as_secs()
        )
    }
}

/// Delay window in seconds, inclusive on both ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayWindow {
    pub min_secs: u64,
    pub max_secs: u64,
}

impl DelayWindow {
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self { min_secs, max_secs }
    }

    pub fn sample(&self, sampler: &mut dyn Sampler) -> Duration {
        Duration::from_secs(sampler.uniform_u64(self.min_secs, self.max_secs))
    }

    /// Pick a delay and pin the trigger time for `wallet`.
    pub fn schedule(
        &self,
        clock: &dyn Clock,
        sampler: &mut dyn Sampler,
        wallet: Address,
        derivation_index: u32,
    ) -> ScheduledCycle {
        let delay = self.sample(sampler);
        // Out-of-range delays clamp to the far future instead of firing now
        let trigger_at = chrono::Duration::from_std(delay)
            .ok()
            .and_then(|offset| clock.now().checked_add_signed(offset))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        ScheduledCycle {
            wallet,
            derivation_index,
            trigger_at,
            delay,
        }
    }
}
