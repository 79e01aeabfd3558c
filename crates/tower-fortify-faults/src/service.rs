//! Echo service implementation.

use crate::config::{EchoConfig, EchoConfigBuilder};
use crate::events::EchoEvent;
use futures::future::BoxFuture;
use rand::rngs::StdRng;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use std::time::Instant;
use tower::Service;
use tower_fortify_core::{ClassifiedError, Context as PolicyContext, Instant as ClockInstant};

struct State {
    executions: u64,
    first_invocation: Option<ClockInstant>,
    rng: StdRng,
}

struct Shared {
    config: EchoConfig,
    state: Mutex<State>,
    always_fail: AtomicBool,
}

/// An unreliable operation that echoes its input.
///
/// Responds with the context's `message` item, or its operation key when
/// there is no such item. Faults are injected according to the builder
/// settings. Clones share counters, timers and the always-fail switch.
#[derive(Clone)]
pub struct EchoService {
    shared: Arc<Shared>,
}

impl EchoService {
    pub(crate) fn new(config: EchoConfig, rng: StdRng, always_fail: bool) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(State {
                    executions: 0,
                    first_invocation: None,
                    rng,
                }),
                always_fail: AtomicBool::new(always_fail),
            }),
        }
    }

    /// Starts a builder with every fault disabled.
    pub fn builder() -> EchoConfigBuilder {
        EchoConfigBuilder::new()
    }

    /// The resolved configuration.
    pub fn config(&self) -> &EchoConfig {
        &self.shared.config
    }

    /// Number of calls that got past the delay so far.
    pub fn executions(&self) -> u64 {
        self.shared.lock().executions
    }

    /// Current value of the always-fail switch.
    pub fn always_fail(&self) -> bool {
        self.shared.always_fail.load(Ordering::SeqCst)
    }

    /// Flips the always-fail switch for this service and all its clones.
    pub fn set_always_fail(&self, enabled: bool) {
        self.shared.always_fail.store(enabled, Ordering::SeqCst);
    }
}

impl Shared {
    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Counts the execution and runs the fault checks in order.
    fn execute(&self) -> (u64, Option<ClassifiedError>) {
        let config = &self.config;
        let now = config.clock.now();
        let mut state = self.lock();

        state.executions += 1;
        let execution = state.executions;
        let started = *state.first_invocation.get_or_insert(now);
        let elapsed = now.saturating_duration_since(started);

        if self.always_fail.load(Ordering::SeqCst) {
            return (execution, Some(ClassifiedError::always_fails("always failing")));
        }

        if config.fail_after > 0 && execution % config.fail_after == 0 {
            return (
                execution,
                Some(ClassifiedError::transient(format!(
                    "failing every {} executions",
                    config.fail_after
                ))),
            );
        }

        if !config.fail_for.is_zero() && elapsed < config.fail_for {
            return (
                execution,
                Some(ClassifiedError::transient(format!(
                    "{:?} elapsed, failing for {:?}",
                    elapsed, config.fail_for
                ))),
            );
        }

        if config.system_down_after > 0 && execution >= config.system_down_after {
            return (
                execution,
                Some(ClassifiedError::permanent_unavailable(format!(
                    "system down after {} executions",
                    config.system_down_after
                ))),
            );
        }

        if !config.system_down_for.is_zero() && elapsed < config.system_down_for {
            return (
                execution,
                Some(ClassifiedError::permanent_unavailable(format!(
                    "system down for {:?}",
                    config.system_down_for
                ))),
            );
        }

        if config.failure_probability > 0.0 {
            let draw: f64 = state.rng.random();
            if draw <= config.failure_probability {
                return (
                    execution,
                    Some(ClassifiedError::transient(format!(
                        "draw {:.4} within failure probability {}",
                        draw, config.failure_probability
                    ))),
                );
            }
        }

        (execution, None)
    }
}

impl Service<PolicyContext> for EchoService {
    type Response = String;
    type Error = ClassifiedError;
    type Future = BoxFuture<'static, Result<String, ClassifiedError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, ctx: PolicyContext) -> Self::Future {
        let shared = Arc::clone(&self.shared);

        Box::pin(async move {
            let config = &shared.config;
            let delay = {
                let mut state = shared.lock();
                config.delay.sample(&mut state.rng)
            };

            if !delay.is_zero() {
                config.event_listeners.emit(&EchoEvent::Delayed {
                    policy_name: config.name.clone(),
                    timestamp: Instant::now(),
                    delay,
                });
                config.sleeper.sleep(delay).await;
            }

            let (execution, fault) = shared.execute();

            if let Some(error) = fault {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    service = %config.name,
                    execution,
                    error = %error,
                    "fault injected"
                );
                #[cfg(feature = "metrics")]
                metrics::counter!(
                    "faults_injected_total",
                    "service" => config.name.clone(),
                    "kind" => error.kind().as_str()
                )
                .increment(1);

                config.event_listeners.emit(&EchoEvent::FaultInjected {
                    policy_name: config.name.clone(),
                    timestamp: Instant::now(),
                    execution,
                    error: error.clone(),
                });
                return Err(error);
            }

            config.event_listeners.emit(&EchoEvent::Echoed {
                policy_name: config.name.clone(),
                timestamp: Instant::now(),
                execution,
            });

            Ok(ctx
                .get("message")
                .or(ctx.operation_key())
                .unwrap_or_default()
                .to_string())
        })
    }
}

impl std::fmt::Debug for EchoService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EchoService")
            .field("name", &self.shared.config.name)
            .field("executions", &self.executions())
            .field("always_fail", &self.always_fail())
            .finish()
    }
}
