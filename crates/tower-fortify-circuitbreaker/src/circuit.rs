use crate::config::CircuitBreakerConfig;
use crate::events::CircuitBreakerEvent;
#[cfg(feature = "metrics")]
use metrics::{counter, gauge};
use std::time::Duration;
use tower_fortify_core::{ClassifiedError, Instant};

/// Represents the state of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum CircuitState {
    /// Calls flow to the operation; consecutive handled failures are counted.
    Closed = 0,
    /// Calls are refused until the break duration has elapsed.
    Open = 1,
    /// One trial call is allowed through to probe the operation.
    HalfOpen = 2,
}

impl CircuitState {
    /// Stable label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "Closed",
            CircuitState::Open => "Open",
            CircuitState::HalfOpen => "HalfOpen",
        }
    }
}

/// Point-in-time snapshot of a circuit breaker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitMetrics {
    /// Current state, as stored. See [`CircuitBreakerLayer::state`](crate::CircuitBreakerLayer::state)
    /// for the state a caller would observe.
    pub state: CircuitState,
    /// Handled failures in a row while closed.
    pub consecutive_failures: usize,
    /// Time since the last state transition.
    pub time_in_state: Duration,
    /// Whether a half-open trial call is outstanding.
    pub trial_in_flight: bool,
    /// Whether the circuit was forced open and waits for a manual reset.
    pub isolated: bool,
}

/// Outcome of asking the circuit for permission to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Permit {
    /// The call may proceed. `trial` is set for the single half-open probe.
    Granted { trial: bool },
    /// The call must fail fast.
    Rejected { remaining: Duration },
}

pub(crate) struct Circuit {
    state: CircuitState,
    consecutive_failures: usize,
    opened_at: Option<Instant>,
    last_state_change: Instant,
    trial_in_flight: bool,
    isolated: bool,
}

/// Events produced while the lock is held, emitted after it is released.
pub(crate) type Pending = Vec<CircuitBreakerEvent>;

impl Circuit {
    pub(crate) fn new(now: Instant) -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            last_state_change: now,
            trial_in_flight: false,
            isolated: false,
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> CircuitState {
        self.state
    }

    /// The state a new call would observe right now.
    pub(crate) fn observed_state(&self, config: &CircuitBreakerConfig, now: Instant) -> CircuitState {
        if self.state == CircuitState::Open && !self.isolated && self.break_elapsed(config, now) {
            CircuitState::HalfOpen
        } else {
            self.state
        }
    }

    pub(crate) fn metrics(&self, now: Instant) -> CircuitMetrics {
        CircuitMetrics {
            state: self.state,
            consecutive_failures: self.consecutive_failures,
            time_in_state: now.saturating_duration_since(self.last_state_change),
            trial_in_flight: self.trial_in_flight,
            isolated: self.isolated,
        }
    }

    fn break_elapsed(&self, config: &CircuitBreakerConfig, now: Instant) -> bool {
        match self.opened_at {
            Some(opened_at) => now.saturating_duration_since(opened_at) >= config.break_duration,
            None => true,
        }
    }

    fn remaining(&self, config: &CircuitBreakerConfig, now: Instant) -> Duration {
        if self.isolated {
            return config.break_duration;
        }
        match self.opened_at {
            Some(opened_at) => config
                .break_duration
                .saturating_sub(now.saturating_duration_since(opened_at)),
            None => Duration::ZERO,
        }
    }

    /// Checks whether a call may proceed, moving Open to HalfOpen once the
    /// break has elapsed. Check and transition happen under one lock.
    pub(crate) fn try_acquire(
        &mut self,
        config: &CircuitBreakerConfig,
        now: Instant,
        pending: &mut Pending,
    ) -> Permit {
        if self.state == CircuitState::Open && !self.isolated && self.break_elapsed(config, now) {
            self.transition_to(CircuitState::HalfOpen, config, now, pending);
        }

        let permit = match self.state {
            CircuitState::Closed => Permit::Granted { trial: false },
            CircuitState::HalfOpen if !self.trial_in_flight => {
                self.trial_in_flight = true;
                Permit::Granted { trial: true }
            }
            CircuitState::HalfOpen => Permit::Rejected {
                remaining: Duration::ZERO,
            },
            CircuitState::Open => Permit::Rejected {
                remaining: self.remaining(config, now),
            },
        };

        match permit {
            Permit::Granted { .. } => pending.push(CircuitBreakerEvent::CallPermitted {
                policy_name: config.name.clone(),
                timestamp: std::time::Instant::now(),
                state: self.state,
            }),
            Permit::Rejected { remaining } => {
                #[cfg(feature = "metrics")]
                counter!("circuitbreaker_calls_total", "circuitbreaker" => config.name.clone(), "outcome" => "rejected")
                    .increment(1);

                pending.push(CircuitBreakerEvent::CallRejected {
                    policy_name: config.name.clone(),
                    timestamp: std::time::Instant::now(),
                    remaining,
                });
            }
        }

        permit
    }

    pub(crate) fn record_success(
        &mut self,
        config: &CircuitBreakerConfig,
        now: Instant,
        trial: bool,
        pending: &mut Pending,
    ) {
        #[cfg(feature = "metrics")]
        counter!("circuitbreaker_calls_total", "circuitbreaker" => config.name.clone(), "outcome" => "success")
            .increment(1);

        pending.push(CircuitBreakerEvent::SuccessRecorded {
            policy_name: config.name.clone(),
            timestamp: std::time::Instant::now(),
            state: self.state,
        });

        match self.state {
            CircuitState::Closed => self.consecutive_failures = 0,
            CircuitState::HalfOpen if trial => {
                self.trial_in_flight = false;
                self.transition_to(CircuitState::Closed, config, now, pending);
            }
            // Calls admitted before the circuit opened do not move it.
            CircuitState::HalfOpen | CircuitState::Open => {}
        }
    }

    pub(crate) fn record_failure(
        &mut self,
        config: &CircuitBreakerConfig,
        error: &ClassifiedError,
        now: Instant,
        trial: bool,
        pending: &mut Pending,
    ) {
        #[cfg(feature = "metrics")]
        counter!("circuitbreaker_calls_total", "circuitbreaker" => config.name.clone(), "outcome" => "failure")
            .increment(1);

        pending.push(CircuitBreakerEvent::FailureRecorded {
            policy_name: config.name.clone(),
            timestamp: std::time::Instant::now(),
            state: self.state,
            error: error.clone(),
        });

        match self.state {
            CircuitState::Closed => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= config.failure_threshold {
                    self.break_circuit(config, error, now, pending);
                }
            }
            CircuitState::HalfOpen if trial => {
                self.trial_in_flight = false;
                self.break_circuit(config, error, now, pending);
            }
            CircuitState::HalfOpen | CircuitState::Open => {}
        }
    }

    /// A failure of an unhandled kind: no counting, only the trial slot is freed.
    pub(crate) fn record_ignored(&mut self, _config: &CircuitBreakerConfig, trial: bool) {
        #[cfg(feature = "metrics")]
        counter!("circuitbreaker_calls_total", "circuitbreaker" => _config.name.clone(), "outcome" => "ignored")
            .increment(1);

        if trial {
            self.release_trial();
        }
    }

    /// Frees the half-open slot without recording an outcome.
    pub(crate) fn release_trial(&mut self) {
        if self.state == CircuitState::HalfOpen {
            self.trial_in_flight = false;
        }
    }

    pub(crate) fn force_open(&mut self, config: &CircuitBreakerConfig, now: Instant, pending: &mut Pending) {
        self.isolated = true;
        self.transition_to(CircuitState::Open, config, now, pending);
        self.opened_at = Some(now);
    }

    pub(crate) fn reset(&mut self, config: &CircuitBreakerConfig, now: Instant, pending: &mut Pending) {
        self.isolated = false;
        self.transition_to(CircuitState::Closed, config, now, pending);
        // A closed circuit skips the transition but still drops its streak.
        self.consecutive_failures = 0;
        self.opened_at = None;
        self.trial_in_flight = false;
    }

    fn break_circuit(
        &mut self,
        config: &CircuitBreakerConfig,
        error: &ClassifiedError,
        now: Instant,
        pending: &mut Pending,
    ) {
        self.transition_to(CircuitState::Open, config, now, pending);
        self.opened_at = Some(now);
        pending.push(CircuitBreakerEvent::Broken {
            policy_name: config.name.clone(),
            timestamp: std::time::Instant::now(),
            error: error.clone(),
            break_duration: config.break_duration,
        });
    }

    fn transition_to(
        &mut self,
        state: CircuitState,
        config: &CircuitBreakerConfig,
        now: Instant,
        pending: &mut Pending,
    ) {
        if self.state == state {
            return;
        }

        let from_state = self.state;

        #[cfg(feature = "tracing")]
        tracing::info!(
            breaker = %config.name,
            from = from_state.as_str(),
            to = state.as_str(),
            "circuit state transition"
        );

        #[cfg(feature = "metrics")]
        {
            counter!(
                "circuitbreaker_transitions_total",
                "circuitbreaker" => config.name.clone(),
                "from" => from_state.as_str(),
                "to" => state.as_str()
            )
            .increment(1);
            gauge!("circuitbreaker_state", "circuitbreaker" => config.name.clone())
                .set(state as u8 as f64);
        }

        pending.push(CircuitBreakerEvent::StateTransition {
            policy_name: config.name.clone(),
            timestamp: std::time::Instant::now(),
            from_state,
            to_state: state,
        });

        self.state = state;
        self.last_state_change = now;
        match state {
            CircuitState::Closed => {
                self.consecutive_failures = 0;
                self.opened_at = None;
                self.trial_in_flight = false;
            }
            CircuitState::HalfOpen => self.trial_in_flight = false,
            CircuitState::Open => {}
        }
    }
}
