use std::time::Instant;
use tower_fortify_core::events::PolicyEvent;
use tower_fortify_core::ClassifiedError;

/// Events emitted by the cache policy.
#[derive(Debug, Clone)]
pub enum CacheEvent {
    /// A fresh entry was served; the operation was not invoked.
    Hit {
        policy_name: String,
        timestamp: Instant,
        key: String,
    },
    /// No fresh entry; the operation will be invoked.
    Miss {
        policy_name: String,
        timestamp: Instant,
        key: String,
    },
    /// A successful result was stored.
    Added {
        policy_name: String,
        timestamp: Instant,
        key: String,
    },
    /// The call failed and nothing was stored. `key` is `None` when the
    /// context did not carry one.
    Error {
        policy_name: String,
        timestamp: Instant,
        key: Option<String>,
        error: ClassifiedError,
    },
}

impl PolicyEvent for CacheEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CacheEvent::Hit { .. } => "hit",
            CacheEvent::Miss { .. } => "miss",
            CacheEvent::Added { .. } => "added",
            CacheEvent::Error { .. } => "error",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CacheEvent::Hit { timestamp, .. }
            | CacheEvent::Miss { timestamp, .. }
            | CacheEvent::Added { timestamp, .. }
            | CacheEvent::Error { timestamp, .. } => *timestamp,
        }
    }

    fn policy_name(&self) -> &str {
        match self {
            CacheEvent::Hit { policy_name, .. }
            | CacheEvent::Miss { policy_name, .. }
            | CacheEvent::Added { policy_name, .. }
            | CacheEvent::Error { policy_name, .. } => policy_name,
        }
    }
}
