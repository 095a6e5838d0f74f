//! Retry timing for resumable transfers.
//!
//! Every transient failure is retried; what varies is how long to wait.
//! [`RetryPolicy`] computes exponential delays and [`RetryPolicy::decide`]
//! turns an attempt count into a [`RetryDecision`]. The wait itself goes
//! through a [`Sleeper`] so tests can record delays instead of sleeping.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use iwara_core::download::{RetryDecision, RetryPolicy};
//!
//! let policy = RetryPolicy::default();
//! assert_eq!(
//!     policy.decide(1, 5),
//!     RetryDecision::Retry { delay: Duration::from_secs(1), attempt: 2 }
//! );
//! assert!(matches!(policy.decide(5, 5), RetryDecision::DoNotRetry { .. }));
//! ```

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument};

/// Default base delay for exponential backoff (1 second).
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default backoff multiplier (doubles each attempt).
const DEFAULT_BACKOFF_MULTIPLIER: u32 = 2;

/// Decision on whether to retry a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt number comes next (1-indexed).
        attempt: u32,
    },

    /// Do not retry.
    DoNotRetry {
        /// Human-readable reason.
        reason: String,
    },
}

/// Exponential backoff without jitter.
///
/// ```text
/// delay = min(base_delay * multiplier^attempt_index, max_delay)
/// ```
///
/// With defaults the delays after attempts 1..=4 are 1s, 2s, 4s, 8s, and
/// they keep doubling: the default policy has no cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    base_delay: Duration,
    max_delay: Option<Duration>,
    backoff_multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: None,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with custom timing. `max_delay` of `None` leaves the
    /// delays uncapped.
    #[must_use]
    pub fn new(
        base_delay: Duration,
        max_delay: Option<Duration>,
        backoff_multiplier: u32,
    ) -> Self {
        Self {
            base_delay,
            max_delay,
            backoff_multiplier: backoff_multiplier.max(1),
        }
    }

    /// Delay after the attempt with zero-based index `attempt_index`.
    #[must_use]
    pub fn delay_for(&self, attempt_index: u32) -> Duration {
        let factor = self
            .backoff_multiplier
            .checked_pow(attempt_index)
            .unwrap_or(u32::MAX);
        let delay = self.base_delay.checked_mul(factor).unwrap_or(Duration::MAX);
        match self.max_delay {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }

    /// Decides what follows a failed attempt.
    ///
    /// `attempt` is the 1-indexed attempt that just failed. No delay is
    /// returned once `max_attempts` is reached.
    #[instrument(level = "debug", skip(self))]
    pub fn decide(&self, attempt: u32, max_attempts: u32) -> RetryDecision {
        if attempt >= max_attempts {
            debug!(attempt, max = max_attempts, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({max_attempts}) exhausted"),
            };
        }

        let delay = self.delay_for(attempt.saturating_sub(1));
        debug!(
            attempt,
            next_attempt = attempt + 1,
            delay_ms = delay.as_millis(),
            "will retry"
        );
        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }
}

/// Waits between attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Suspends the current task for `delay`.
    async fn sleep(&self, delay: Duration);
}

/// [`Sleeper`] backed by `tokio::time::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}
