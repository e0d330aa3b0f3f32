//! Failure classification and retry backoff

use crate::config::RetryConfig;
use crate::error::RentaldeskError;
use rand::Rng;
use std::time::Duration;

/// How the handler treats a failed turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Upstream throttling; worth another attempt after a backoff
    Retryable,
    /// Anything else; surfaced immediately
    Terminal,
}

const THROTTLING_MARKERS: [&str; 2] = ["Too Many Requests", "RESOURCE_EXHAUSTED"];

/// Classifies a failed turn
///
/// Providers report throttling as [`RentaldeskError::RateLimited`]; any other
/// [`RentaldeskError`] in the chain is terminal. Only untyped errors fall back
/// to their text (`429 Too Many Requests`, `RESOURCE_EXHAUSTED`, "rate limit").
pub fn classify(error: &anyhow::Error) -> FailureClass {
    let typed: Vec<&RentaldeskError> = error
        .chain()
        .filter_map(|cause| cause.downcast_ref::<RentaldeskError>())
        .collect();
    if typed
        .iter()
        .any(|e| matches!(e, RentaldeskError::RateLimited(_)))
    {
        return FailureClass::Retryable;
    }
    if !typed.is_empty() {
        return FailureClass::Terminal;
    }

    let text = format!("{:#}", error);
    if THROTTLING_MARKERS.iter().any(|m| text.contains(m))
        || text.to_ascii_lowercase().contains("rate limit")
    {
        FailureClass::Retryable
    } else {
        FailureClass::Terminal
    }
}

/// Bounded exponential backoff
///
/// `max_attempts` counts every attempt including the first. The delay before
/// retry `n` (1-based) is `base_delay * 2^(n-1)`, capped at `max_delay`,
/// plus up to `jitter` of random noise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter: Duration,
}

impl RetryPolicy {
    /// Create a policy without a delay cap or jitter
    ///
    /// # Examples
    ///
    /// ```
    /// use rentaldesk::handler::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::new(3, Duration::from_secs(5));
    /// assert_eq!(policy.backoff(1), Duration::from_secs(5));
    /// assert_eq!(policy.backoff(2), Duration::from_secs(10));
    /// ```
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: Duration::MAX,
            jitter: Duration::ZERO,
        }
    }

    /// Builds the configured policy
    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, Duration::from_millis(config.base_delay_ms))
            .with_max_delay(Duration::from_millis(config.max_delay_ms))
            .with_jitter(Duration::from_millis(config.jitter_ms))
    }

    /// Caps a single backoff delay
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Adds up to `jitter` of random delay to every backoff
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Total attempts including the first
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether another attempt may follow attempt number `attempt`
    pub fn allows_retry_after(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Deterministic part of the delay before retry number `retry`
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2_u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Delay before retry number `retry`, jitter included
    pub fn delay_for(&self, retry: u32) -> Duration {
        let backoff = self.backoff(retry);
        if self.jitter.is_zero() {
            return backoff;
        }
        let jitter_ms = rand::rng().random_range(0..=self.jitter.as_millis() as u64);
        backoff.saturating_add(Duration::from_millis(jitter_ms))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
