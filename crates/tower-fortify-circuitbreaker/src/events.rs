use crate::circuit::CircuitState;
use std::time::{Duration, Instant};
use tower_fortify_core::events::PolicyEvent;
use tower_fortify_core::ClassifiedError;

/// Events emitted by the circuit breaker.
#[derive(Debug, Clone)]
pub enum CircuitBreakerEvent {
    /// The circuit moved between states.
    StateTransition {
        policy_name: String,
        timestamp: Instant,
        from_state: CircuitState,
        to_state: CircuitState,
    },
    /// A handled failure opened the circuit. Follows the matching `StateTransition`.
    Broken {
        policy_name: String,
        timestamp: Instant,
        error: ClassifiedError,
        break_duration: Duration,
    },
    /// A call was let through to the operation.
    CallPermitted {
        policy_name: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// A call was refused without invoking the operation.
    CallRejected {
        policy_name: String,
        timestamp: Instant,
        remaining: Duration,
    },
    /// A permitted call succeeded.
    SuccessRecorded {
        policy_name: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// A permitted call failed with a handled kind.
    FailureRecorded {
        policy_name: String,
        timestamp: Instant,
        state: CircuitState,
        error: ClassifiedError,
    },
}

impl PolicyEvent for CircuitBreakerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CircuitBreakerEvent::StateTransition { .. } => "state_transition",
            CircuitBreakerEvent::Broken { .. } => "broken",
            CircuitBreakerEvent::CallPermitted { .. } => "call_permitted",
            CircuitBreakerEvent::CallRejected { .. } => "call_rejected",
            CircuitBreakerEvent::SuccessRecorded { .. } => "success_recorded",
            CircuitBreakerEvent::FailureRecorded { .. } => "failure_recorded",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CircuitBreakerEvent::StateTransition { timestamp, .. }
            | CircuitBreakerEvent::Broken { timestamp, .. }
            | CircuitBreakerEvent::CallPermitted { timestamp, .. }
            | CircuitBreakerEvent::CallRejected { timestamp, .. }
            | CircuitBreakerEvent::SuccessRecorded { timestamp, .. }
            | CircuitBreakerEvent::FailureRecorded { timestamp, .. } => *timestamp,
        }
    }

    fn policy_name(&self) -> &str {
        match self {
            CircuitBreakerEvent::StateTransition { policy_name, .. }
            | CircuitBreakerEvent::Broken { policy_name, .. }
            | CircuitBreakerEvent::CallPermitted { policy_name, .. }
            | CircuitBreakerEvent::CallRejected { policy_name, .. }
            | CircuitBreakerEvent::SuccessRecorded { policy_name, .. }
            | CircuitBreakerEvent::FailureRecorded { policy_name, .. } => policy_name,
        }
    }
}
