//! Event types for the echo service.

use std::time::{Duration, Instant};
use tower_fortify_core::events::PolicyEvent;
use tower_fortify_core::ClassifiedError;

/// Events emitted by [`EchoService`](crate::EchoService).
#[derive(Debug, Clone)]
pub enum EchoEvent {
    /// The call was delayed before running.
    Delayed {
        /// Name of the service instance
        policy_name: String,
        /// When the event occurred
        timestamp: Instant,
        /// Amount of delay applied
        delay: Duration,
    },
    /// A fault was injected; the call fails with `error`.
    FaultInjected {
        /// Name of the service instance
        policy_name: String,
        /// When the event occurred
        timestamp: Instant,
        /// 1-based execution number
        execution: u64,
        /// The failure returned to the caller
        error: ClassifiedError,
    },
    /// The message was echoed back.
    Echoed {
        /// Name of the service instance
        policy_name: String,
        /// When the event occurred
        timestamp: Instant,
        /// 1-based execution number
        execution: u64,
    },
}

impl PolicyEvent for EchoEvent {
    fn event_type(&self) -> &'static str {
        match self {
            EchoEvent::Delayed { .. } => "delayed",
            EchoEvent::FaultInjected { .. } => "fault_injected",
            EchoEvent::Echoed { .. } => "echoed",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            EchoEvent::Delayed { timestamp, .. }
            | EchoEvent::FaultInjected { timestamp, .. }
            | EchoEvent::Echoed { timestamp, .. } => *timestamp,
        }
    }

    fn policy_name(&self) -> &str {
        match self {
            EchoEvent::Delayed { policy_name, .. }
            | EchoEvent::FaultInjected { policy_name, .. }
            | EchoEvent::Echoed { policy_name, .. } => policy_name,
        }
    }
}
