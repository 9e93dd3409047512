//! Retry decisions for processing outcomes.

use std::time::Duration;

use crate::config::RetryConfig;
use crate::processor::Outcome;

/// What to do after an attempt that did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again after the given delay.
    Retry { delay: Duration },
    /// Stop and treat the task as failed.
    GiveUp,
}

/// Exponential backoff with a cap.
///
/// `PermanentFailure` never retries. `TransientFailure` retries while the
/// attempt counter is below `max_attempts`; the delay for retry `n`
/// (1-indexed) is `min(base * 2^(n-1), cap)`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Decide the follow-up for `outcome` given how many retries have
    /// already been made.
    ///
    /// `Success` is never passed here by the orchestrator; it maps to
    /// `GiveUp` so the policy stays total.
    pub fn decide(&self, outcome: &Outcome, attempts: u32) -> RetryDecision {
        match outcome {
            Outcome::TransientFailure(_) if attempts < self.max_attempts => RetryDecision::Retry {
                delay: self.delay_for(attempts + 1),
            },
            _ => RetryDecision::GiveUp,
        }
    }

    /// Backoff delay before retry number `attempt` (1-indexed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let factor = 1u32 << exponent;
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
