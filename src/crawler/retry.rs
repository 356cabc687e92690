//! Retry bookkeeping for a single fetch
//!
//! The attempt counter is an immutable value threaded through the fetch loop;
//! nothing here is shared between concurrent fetches.
//!
//! # Backoff
//!
//! | Failed attempts | Delay before next try (defaults) |
//! |-----------------|----------------------------------|
//! | 1 | 1000 ms |
//! | 2 | 2000 ms |
//! | 3 | 4000 ms |
//! | 4+ | 8000 ms (ceiling) |

use crate::config::CrawlerConfig;
use std::time::Duration;

/// Default number of attempts per URL
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base backoff delay
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);

/// Default backoff ceiling
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(8000);

/// Attempt limit and backoff curve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first try included
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
        }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )
    }

    /// Same backoff curve with a different attempt limit
    pub fn with_max_retries(self, max_retries: u32) -> Self {
        Self {
            max_retries,
            ..self
        }
    }

    /// Whether the policy allows any attempt at all
    pub fn allows_attempts(&self) -> bool {
        self.max_retries > 0
    }

    /// `min(base_delay * 2^attempt, max_delay)`, saturating on overflow
    pub fn delay_for(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY)
    }
}

/// Failed attempts so far
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryState {
    attempts: u32,
}

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStep {
    /// Sleep for `delay`, then try again with `next`
    Retry { delay: Duration, next: RetryState },

    /// No attempts left
    Exhausted { attempts: u32 },
}

impl RetryState {
    pub fn start() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Records one failed attempt and decides the next step
    pub fn record_failure(self, policy: &RetryPolicy) -> RetryStep {
        let attempts = self.attempts + 1;
        if attempts >= policy.max_retries {
            RetryStep::Exhausted { attempts }
        } else {
            RetryStep::Retry {
                delay: policy.delay_for(attempts),
                next: RetryState { attempts },
            }
        }
    }
}
