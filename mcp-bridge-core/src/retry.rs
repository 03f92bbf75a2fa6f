//! Retry with exponential backoff for network-class failures.
//!
//! One message is retried until it is delivered or fails in a way that is not
//! worth retrying. There is no attempt ceiling: a long-lived local bridge
//! favours eventual delivery over failing fast. The loop is iterative so an
//! outage of any length costs constant stack.
//!
//! Ordering: [`RetryController::deliver`] only returns once the message's
//! retry loop has terminated, and the bridge awaits it before popping the next
//! message, so at most one message is ever in flight.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::transport::RemoteTransport;

/// Default delay before the first retry.
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 500;

/// Default upper bound for the delay between retries.
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 30_000;

// ─────────────────────────────────────────────────────────────────────────────
// Backoff Schedule
// ─────────────────────────────────────────────────────────────────────────────

/// Exponential backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub initial: Duration,
    /// Cap applied after every doubling.
    pub max: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(DEFAULT_INITIAL_BACKOFF_MS),
            max: Duration::from_millis(DEFAULT_MAX_BACKOFF_MS),
        }
    }
}

/// Per-message retry state: how many attempts were made and how long to wait
/// before the next one.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    attempts: u32,
    next_delay: Duration,
}

impl Backoff {
    /// Fresh state for a new message.
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
            next_delay: policy.initial.min(policy.max),
        }
    }

    /// Number of attempts recorded so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Record that an attempt is being made.
    pub fn record_attempt(&mut self) {
        self.attempts = self.attempts.saturating_add(1);
    }

    /// Delay to wait now, advancing the schedule (doubling, capped).
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next_delay;
        self.next_delay = delay.saturating_mul(2).min(self.policy.max);
        delay
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Retry Controller
// ─────────────────────────────────────────────────────────────────────────────

/// Final result of delivering one message.
#[derive(Debug)]
pub enum Delivery {
    /// The remote answered; `messages` are the outbound messages in order.
    Delivered {
        /// Outbound messages produced by the response (possibly none).
        messages: Vec<String>,
        /// Attempts it took, including the successful one.
        attempts: u32,
    },
    /// A non-retryable failure ended the loop.
    Failed {
        /// The failure that ended the loop.
        error: TransportError,
        /// Attempts made, including the failing one.
        attempts: u32,
    },
    /// Shutdown was requested while the message was waiting to be retried.
    Abandoned {
        /// The last network failure observed.
        last_error: TransportError,
        /// Attempts made before giving up.
        attempts: u32,
    },
}

/// Wraps a [`RemoteTransport`] with the retry loop.
#[derive(Debug, Clone)]
pub struct RetryController<T> {
    transport: T,
    policy: BackoffPolicy,
}

impl<T: RemoteTransport> RetryController<T> {
    /// Create a controller around `transport`.
    pub fn new(transport: T, policy: BackoffPolicy) -> Self {
        Self { transport, policy }
    }

    /// The wrapped transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send `payload` until it is delivered or fails non-retryably.
    ///
    /// `shutdown` is only observed after a backoff delay has elapsed: neither
    /// an in-flight attempt nor a running backoff sleep is interrupted, but no
    /// new attempt starts once shutdown was requested.
    pub async fn deliver(&self, payload: &str, shutdown: &CancellationToken) -> Delivery {
        let mut backoff = Backoff::new(self.policy);

        loop {
            backoff.record_attempt();
            let error = match self.transport.send(payload).await {
                Ok(messages) => {
                    debug!(
                        attempts = backoff.attempts(),
                        outputs = messages.len(),
                        "message delivered"
                    );
                    return Delivery::Delivered {
                        messages,
                        attempts: backoff.attempts(),
                    };
                }
                Err(e) if e.is_retryable() => e,
                Err(error) => {
                    return Delivery::Failed {
                        error,
                        attempts: backoff.attempts(),
                    };
                }
            };

            let delay = backoff.next_delay();
            warn!(
                attempt = backoff.attempts(),
                delay_ms = delay.as_millis() as u64,
                error_kind = error.kind(),
                error = %error,
                "network failure, retrying after backoff"
            );
            tokio::time::sleep(delay).await;

            if shutdown.is_cancelled() {
                return Delivery::Abandoned {
                    last_error: error,
                    attempts: backoff.attempts(),
                };
            }
        }
    }
}
