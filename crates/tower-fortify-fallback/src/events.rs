//! Events emitted by the fallback service.

use std::time::Instant;
use tower_fortify_core::events::PolicyEvent;
use tower_fortify_core::ClassifiedError;

/// Events emitted by the fallback service.
#[derive(Debug, Clone)]
pub enum FallbackEvent {
    /// The inner service succeeded; no fallback was needed.
    Success {
        /// Name of the fallback instance.
        policy_name: String,
        /// When the event occurred.
        timestamp: Instant,
    },

    /// A handled failure was absorbed and replaced by the fallback value.
    Applied {
        /// Name of the fallback instance.
        policy_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// The failure that was absorbed.
        error: ClassifiedError,
    },

    /// The failure kind is not handled; propagated as-is.
    Skipped {
        /// Name of the fallback instance.
        policy_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// The failure that was passed through.
        error: ClassifiedError,
    },
}

impl PolicyEvent for FallbackEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::Applied { .. } => "applied",
            Self::Skipped { .. } => "skipped",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            Self::Success { timestamp, .. }
            | Self::Applied { timestamp, .. }
            | Self::Skipped { timestamp, .. } => *timestamp,
        }
    }

    fn policy_name(&self) -> &str {
        match self {
            Self::Success { policy_name, .. }
            | Self::Applied { policy_name, .. }
            | Self::Skipped { policy_name, .. } => policy_name,
        }
    }
}
