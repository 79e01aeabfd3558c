use std::time::{Duration, Instant};
use tower_fortify_core::events::PolicyEvent;
use tower_fortify_core::ClassifiedError;

/// Events emitted by the retry policy.
#[derive(Debug, Clone)]
pub enum RetryEvent {
    /// A handled failure occurred and another attempt will follow after `delay`.
    Retry {
        policy_name: String,
        timestamp: Instant,
        /// 1 for the first retry, 2 for the second, and so on.
        attempt: usize,
        delay: Duration,
        error: ClassifiedError,
    },
    /// The operation succeeded, on the first attempt or after retries.
    Success {
        policy_name: String,
        timestamp: Instant,
        attempts: usize,
    },
    /// Every attempt failed with a handled kind; the last failure is returned.
    Exhausted {
        policy_name: String,
        timestamp: Instant,
        attempts: usize,
        error: ClassifiedError,
    },
    /// A failure outside the handled kinds was passed through without retrying.
    IgnoredError {
        policy_name: String,
        timestamp: Instant,
        error: ClassifiedError,
    },
}

impl PolicyEvent for RetryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RetryEvent::Retry { .. } => "retry",
            RetryEvent::Success { .. } => "success",
            RetryEvent::Exhausted { .. } => "exhausted",
            RetryEvent::IgnoredError { .. } => "ignored_error",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RetryEvent::Retry { timestamp, .. }
            | RetryEvent::Success { timestamp, .. }
            | RetryEvent::Exhausted { timestamp, .. }
            | RetryEvent::IgnoredError { timestamp, .. } => *timestamp,
        }
    }

    fn policy_name(&self) -> &str {
        match self {
            RetryEvent::Retry { policy_name, .. }
            | RetryEvent::Success { policy_name, .. }
            | RetryEvent::Exhausted { policy_name, .. }
            | RetryEvent::IgnoredError { policy_name, .. } => policy_name,
        }
    }
}
