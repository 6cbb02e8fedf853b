//! Bounded retry policy with exponential backoff.
//!
//! A pure decision function: given how many attempts have been made and
//! what the last one produced, either finish the event or name the delay
//! before the next try. It owns no state and performs no I/O; the
//! orchestration layer branches on the returned value.

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};

use crate::client::AttemptOutcome;

/// Retry policy configuration.
///
/// Explicitly injected wherever decisions are made so policies are
/// testable in isolation; never read from process-wide mutable state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of delivery attempts, including the first.
    pub max_retries: u32,

    /// Backoff base. The delay before retry N is
    /// `base_delay * 2^(N - 1)`, anchored at the first retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 3, base_delay: Duration::from_secs(60) }
    }
}

/// Why an event reached terminal failure.
///
/// Observability only; all reasons produce the same `failed` status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// The receiver rejected the payload with a 4xx. Retrying cannot
    /// change the answer.
    ClientError,
    /// The retry budget ran out against server or network errors.
    MaxRetriesExceeded,
    /// The destination was inactive when the cycle ran.
    DestinationInactive,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientError => write!(f, "client_error"),
            Self::MaxRetriesExceeded => write!(f, "max_retries_exceeded"),
            Self::DestinationInactive => write!(f, "destination_inactive"),
        }
    }
}

/// Result of a retry decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// The attempt succeeded; finish the event as delivered.
    FinishSuccess,
    /// Stop retrying; finish the event as failed.
    FinishFailed(FailureReason),
    /// Schedule another cycle after the given delay.
    Retry {
        /// How long to wait before the next attempt.
        delay: Duration,
    },
}

impl RetryPolicy {
    /// Decides what happens after an attempt.
    ///
    /// 2xx finishes successfully. 4xx finishes failed immediately — the
    /// receiver has explicitly rejected the payload and retrying will not
    /// change that. Everything else (5xx, the `0` transport sentinel, and
    /// any other status) is retryable until the attempt budget is spent.
    pub fn decide(&self, attempts_so_far: u32, outcome: &AttemptOutcome) -> RetryDecision {
        if outcome.is_success() {
            return RetryDecision::FinishSuccess;
        }

        if outcome.is_client_rejection() {
            return RetryDecision::FinishFailed(FailureReason::ClientError);
        }

        if attempts_so_far < self.max_retries {
            RetryDecision::Retry { delay: self.delay_for(attempts_so_far) }
        } else {
            RetryDecision::FinishFailed(FailureReason::MaxRetriesExceeded)
        }
    }

    /// Backoff delay after the Nth attempt (1-based).
    fn delay_for(&self, attempts_so_far: u32) -> Duration {
        // Exponent capped so the multiplication cannot overflow.
        let exponent = attempts_so_far.saturating_sub(1).min(20);
        self.base_delay * 2u32.saturating_pow(exponent)
    }
}
