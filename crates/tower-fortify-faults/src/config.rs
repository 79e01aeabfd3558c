//! Configuration for the echo service.

use crate::events::EchoEvent;
use crate::EchoService;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tower_fortify_core::events::{EventListeners, FnListener};
use tower_fortify_core::{
    ClassifiedError, Clock, ConfigError, SharedClock, SharedSleeper, Sleeper, TokioClock,
    TokioSleeper,
};

/// An inclusive range of durations. A fixed duration is a range of one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DelayRange {
    lower: Duration,
    upper: Duration,
}

impl DelayRange {
    /// Always the same duration.
    pub fn fixed(duration: Duration) -> Self {
        Self {
            lower: duration,
            upper: duration,
        }
    }

    /// Uniformly drawn from `lower..=upper`.
    pub fn between(
        field: &'static str,
        lower: Duration,
        upper: Duration,
    ) -> Result<Self, ConfigError> {
        if lower > upper {
            return Err(ConfigError::InvertedBounds {
                field,
                lower,
                upper,
            });
        }
        Ok(Self { lower, upper })
    }

    /// Lower bound.
    pub fn lower(&self) -> Duration {
        self.lower
    }

    /// Upper bound.
    pub fn upper(&self) -> Duration {
        self.upper
    }

    /// Draws a duration. Fixed ranges do not touch the generator.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.lower == self.upper {
            self.lower
        } else {
            rng.random_range(self.lower..=self.upper)
        }
    }
}

/// Resolved configuration of an [`EchoService`].
pub struct EchoConfig {
    pub(crate) delay: DelayRange,
    pub(crate) fail_after: u64,
    pub(crate) fail_for: Duration,
    pub(crate) system_down_after: u64,
    pub(crate) system_down_for: Duration,
    pub(crate) failure_probability: f64,
    pub(crate) clock: SharedClock,
    pub(crate) sleeper: SharedSleeper,
    pub(crate) event_listeners: EventListeners<EchoEvent>,
    pub(crate) name: String,
}

impl EchoConfig {
    /// Latency applied before every call.
    pub fn delay(&self) -> DelayRange {
        self.delay
    }

    /// Every n-th execution fails; 0 when disabled.
    pub fn fail_after(&self) -> u64 {
        self.fail_after
    }

    /// Length of the transient failure window, drawn once when built.
    pub fn fail_for(&self) -> Duration {
        self.fail_for
    }

    /// Executions from this one on are down; 0 when disabled.
    pub fn system_down_after(&self) -> u64 {
        self.system_down_after
    }

    /// Length of the outage window.
    pub fn system_down_for(&self) -> Duration {
        self.system_down_for
    }

    /// Probability that a call fails transiently.
    pub fn failure_probability(&self) -> f64 {
        self.failure_probability
    }

    /// Instance name used in events and logs.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Builder for [`EchoService`].
///
/// Every fault is off by default; the service then echoes after no delay.
pub struct EchoConfigBuilder {
    delay: (Duration, Duration),
    fail_after: u64,
    fail_for: (Duration, Duration),
    system_down_after: u64,
    system_down_for: Duration,
    failure_probability: f64,
    always_fail: bool,
    seed: Option<u64>,
    clock: Option<SharedClock>,
    sleeper: Option<SharedSleeper>,
    event_listeners: EventListeners<EchoEvent>,
    name: String,
}

impl EchoConfigBuilder {
    /// Creates a builder with every fault disabled.
    pub fn new() -> Self {
        #[cfg(feature = "metrics")]
        {
            static METRICS_INIT: std::sync::Once = std::sync::Once::new();
            METRICS_INIT.call_once(|| {
                metrics::describe_counter!(
                    "faults_injected_total",
                    "Total number of faults injected by the echo service, by kind"
                );
            });
        }

        Self {
            delay: (Duration::ZERO, Duration::ZERO),
            fail_after: 0,
            fail_for: (Duration::ZERO, Duration::ZERO),
            system_down_after: 0,
            system_down_for: Duration::ZERO,
            failure_probability: 0.0,
            always_fail: false,
            seed: None,
            clock: None,
            sleeper: None,
            event_listeners: EventListeners::new(),
            name: "echo".to_string(),
        }
    }

    /// Delays every call by `delay`.
    pub fn fixed_delay(mut self, delay: Duration) -> Self {
        self.delay = (delay, delay);
        self
    }

    /// Delays every call by a duration drawn from `lower..=upper`, redrawn per call.
    pub fn random_delay(mut self, lower: Duration, upper: Duration) -> Self {
        self.delay = (lower, upper);
        self
    }

    /// Every `n`-th execution fails with a transient error. 0 disables.
    pub fn fail_after(mut self, n: u64) -> Self {
        self.fail_after = n;
        self
    }

    /// Fails transiently until `window` has passed since the first invocation.
    pub fn fail_for(mut self, window: Duration) -> Self {
        self.fail_for = (window, window);
        self
    }

    /// Like [`fail_for`](Self::fail_for) with a window drawn once from `lower..=upper`.
    pub fn fail_for_random(mut self, lower: Duration, upper: Duration) -> Self {
        self.fail_for = (lower, upper);
        self
    }

    /// The `n`-th execution and every one after it fail as unavailable. 0 disables.
    pub fn system_down_after(mut self, n: u64) -> Self {
        self.system_down_after = n;
        self
    }

    /// Fails as unavailable until `window` has passed since the first invocation.
    pub fn system_down_for(mut self, window: Duration) -> Self {
        self.system_down_for = window;
        self
    }

    /// Fails transiently when a uniform draw in `[0, 1)` is at most `p`.
    /// Must be within `[0.0, 1.0]`; 0 disables.
    pub fn fail_with_probability(mut self, p: f64) -> Self {
        self.failure_probability = p;
        self
    }

    /// Initial value of the always-fail switch.
    pub fn always_fail(mut self, enabled: bool) -> Self {
        self.always_fail = enabled;
        self
    }

    /// Seeds the random source so draws repeat across runs.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Replaces the clock used for the failure windows.
    pub fn clock<C>(mut self, clock: C) -> Self
    where
        C: Clock + 'static,
    {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Replaces the sleeper used for latency.
    pub fn sleeper<S>(mut self, sleeper: S) -> Self
    where
        S: Sleeper + 'static,
    {
        self.sleeper = Some(Arc::new(sleeper));
        self
    }

    /// Sets the name of this instance.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback invoked with every injected fault.
    pub fn on_fault<F>(mut self, f: F) -> Self
    where
        F: Fn(&ClassifiedError, u64) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let EchoEvent::FaultInjected {
                error, execution, ..
            } = event
            {
                f(error, *execution);
            }
        }));
        self
    }

    /// Validates the configuration and builds the service.
    pub fn build(self) -> Result<EchoService, ConfigError> {
        let delay = DelayRange::between("delay", self.delay.0, self.delay.1)?;
        let fail_for = DelayRange::between("fail_for", self.fail_for.0, self.fail_for.1)?;
        let p = self.failure_probability;
        if !(0.0..=1.0).contains(&p) {
            return Err(ConfigError::InvalidProbability {
                field: "failure_probability",
                value: p,
            });
        }

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let fail_for = fail_for.sample(&mut rng);

        let config = EchoConfig {
            delay,
            fail_after: self.fail_after,
            fail_for,
            system_down_after: self.system_down_after,
            system_down_for: self.system_down_for,
            failure_probability: p,
            clock: self.clock.unwrap_or_else(|| Arc::new(TokioClock)),
            sleeper: self.sleeper.unwrap_or_else(|| Arc::new(TokioSleeper)),
            event_listeners: self.event_listeners,
            name: self.name,
        };

        Ok(EchoService::new(config, rng, self.always_fail))
    }
}

impl Default for EchoConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
