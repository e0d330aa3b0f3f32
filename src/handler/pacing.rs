//! Pacing strategies applied before every agent dispatch
//!
//! Pacing keeps the request rate towards the hosted model under its ceiling.
//! It is a capability of the handler, so a smarter limiter can replace the
//! fixed sleep without touching the retry logic.

use crate::config::{PacingConfig, PacingStrategy};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Waits, if needed, before a dispatch
#[async_trait]
pub trait Pacer: Send + Sync {
    /// Suspends the caller until it may dispatch
    async fn pace(&self);
}

/// Dispatches immediately
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPacing;

#[async_trait]
impl Pacer for NoPacing {
    async fn pace(&self) {}
}

/// Sleeps a constant delay before every dispatch, regardless of history
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

#[async_trait]
impl Pacer for FixedDelay {
    async fn pace(&self) {
        if !self.0.is_zero() {
            tokio::time::sleep(self.0).await;
        }
    }
}

/// Spaces dispatches at least `interval` apart, process-wide
///
/// Each caller reserves the next free slot under a short lock and then
/// sleeps outside of it, so waiting callers queue in arrival order.
#[derive(Debug)]
pub struct MinInterval {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl MinInterval {
    /// Create a limiter with the given minimum gap
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Pacer for MinInterval {
    async fn pace(&self) {
        let start = {
            let mut next_slot = self.next_slot.lock().await;
            let now = Instant::now();
            let start = match *next_slot {
                Some(slot) if slot > now => slot,
                _ => now,
            };
            *next_slot = Some(start + self.interval);
            start
        };
        tokio::time::sleep_until(start).await;
    }
}

/// Builds the configured pacer
pub fn from_config(config: &PacingConfig) -> Arc<dyn Pacer> {
    let delay = Duration::from_millis(config.delay_ms);
    match config.strategy {
        PacingStrategy::None => Arc::new(NoPacing),
        PacingStrategy::Fixed => Arc::new(FixedDelay(delay)),
        PacingStrategy::MinInterval => Arc::new(MinInterval::new(delay)),
    }
}
