//! Retry policy as an explicit state machine
//!
//! Each request moves through:
//!
//! ```text
//! Pending -> Succeeded
//!         -> Retrying(1) -> ... -> Retrying(max_retries) -> Succeeded
//!         -> FailedPermanent                             -> FailedExhausted
//! ```
//!
//! `RetryState::next` is pure so the policy is testable without sleeping;
//! `retry_with_policy` is the async driver used by the HTTP fetcher.

use crate::config::{BackoffKind, FetcherConfig};
use crate::crawler::fetcher::{ErrorClass, FetchError};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Backoff schedule between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every retry
    Fixed(Duration),
    /// `base * 2^(retry - 1)`, capped at `max`
    Exponential { base: Duration, max: Duration },
}

impl Backoff {
    /// Delay before the given retry (1-based)
    pub fn delay(&self, retry: u32) -> Duration {
        match *self {
            Self::Fixed(delay) => delay,
            Self::Exponential { base, max } => {
                let factor = 2u32.saturating_pow(retry.saturating_sub(1));
                base.saturating_mul(factor).min(max)
            }
        }
    }
}

/// Retry budget and backoff for one fetcher
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt
    pub max_retries: u32,
    pub backoff: Backoff,
    /// Backoff multiplier applied to HTTP 429 responses
    pub rate_limit_multiplier: u32,
    /// Upper bound on any single delay
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Builds the policy from the `[fetcher]` config section
    pub fn from_config(config: &FetcherConfig) -> Self {
        let base = Duration::from_millis(config.backoff_base_ms);
        let max = Duration::from_millis(config.backoff_max_ms);
        let backoff = match config.backoff {
            BackoffKind::Fixed => Backoff::Fixed(base),
            BackoffKind::Exponential => Backoff::Exponential { base, max },
        };

        Self {
            max_retries: config.max_retries,
            backoff,
            rate_limit_multiplier: config.rate_limit_multiplier,
            max_delay: max,
        }
    }

    /// A policy that never retries
    pub fn no_retries() -> Self {
        Self {
            max_retries: 0,
            backoff: Backoff::Fixed(Duration::ZERO),
            rate_limit_multiplier: 1,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before `retry`, extended for rate-limited responses
    pub fn delay_for(&self, retry: u32, class: ErrorClass) -> Duration {
        let delay = self.backoff.delay(retry);
        match class {
            ErrorClass::RateLimited => delay
                .saturating_mul(self.rate_limit_multiplier.max(1))
                .min(self.max_delay.max(delay)),
            _ => delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&FetcherConfig::default())
    }
}

/// Where a single request is in its retry lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// First attempt not yet resolved
    Pending,
    /// Waiting for, or running, the given retry (1-based)
    Retrying { attempt: u32 },
    Succeeded,
    /// Non-retryable failure
    FailedPermanent,
    /// Retry budget used up
    FailedExhausted,
}

/// Outcome of one attempt, as seen by the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    Failure(ErrorClass),
}

impl RetryState {
    /// Returns true once no further attempt will be made
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::FailedPermanent | Self::FailedExhausted
        )
    }

    /// Retries already spent to reach this state
    fn retries_used(&self) -> u32 {
        match self {
            Self::Retrying { attempt } => *attempt,
            _ => 0,
        }
    }

    /// Advances the state after an attempt
    ///
    /// Returns the next state and, when another attempt follows, the delay to
    /// wait before it. Terminal states absorb every outcome.
    pub fn next(self, outcome: AttemptOutcome, policy: &RetryPolicy) -> (Self, Option<Duration>) {
        if self.is_terminal() {
            return (self, None);
        }

        match outcome {
            AttemptOutcome::Success => (Self::Succeeded, None),
            AttemptOutcome::Failure(ErrorClass::Permanent | ErrorClass::Cancelled) => {
                (Self::FailedPermanent, None)
            }
            AttemptOutcome::Failure(class) => {
                let used = self.retries_used();
                if used >= policy.max_retries {
                    (Self::FailedExhausted, None)
                } else {
                    let attempt = used + 1;
                    (
                        Self::Retrying { attempt },
                        Some(policy.delay_for(attempt, class)),
                    )
                }
            }
        }
    }
}

/// Runs `attempt` until it succeeds or the policy gives up
///
/// Backoff sleeps end early on cancellation, returning
/// [`FetchError::Cancelled`]. The last attempt's error is returned when
/// retries are exhausted.
pub async fn retry_with_policy<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    url: &str,
    mut attempt: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut state = RetryState::Pending;

    loop {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        let error = match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        let (next, delay) = state.next(AttemptOutcome::Failure(error.class()), policy);
        state = next;

        let Some(delay) = delay else {
            if state == RetryState::FailedExhausted {
                tracing::debug!(
                    "Giving up on {} after {} retries: {}",
                    url,
                    policy.max_retries,
                    error
                );
            }
            return Err(error);
        };

        tracing::debug!(
            "Retrying {} in {:?} after error: {} ({:?})",
            url,
            delay,
            error,
            state
        );

        tokio::select! {
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
