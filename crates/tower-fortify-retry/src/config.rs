use crate::backoff::{ExponentialBackoff, FixedInterval, IntervalFunction, ZeroInterval};
use crate::events::RetryEvent;
use crate::RetryLayer;
use std::sync::Arc;
use std::time::Duration;
use tower_fortify_core::events::{EventListeners, FnListener};
use tower_fortify_core::{
    ClassifiedError, ConfigError, ErrorKind, HandledKinds, SharedSleeper, Sleeper, TokioSleeper,
};

#[cfg(feature = "metrics")]
static METRICS_INIT: std::sync::Once = std::sync::Once::new();

/// Configuration for the retry policy.
pub struct RetryConfig {
    pub(crate) handled: HandledKinds,
    pub(crate) max_attempts: usize,
    pub(crate) interval_fn: Arc<dyn IntervalFunction>,
    pub(crate) sleeper: SharedSleeper,
    pub(crate) event_listeners: EventListeners<RetryEvent>,
    pub(crate) name: String,
}

impl RetryConfig {
    /// Kinds this policy retries.
    pub fn handled(&self) -> HandledKinds {
        self.handled
    }

    /// Total attempts, including the first.
    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Delay before the retry with the given 0-based index.
    pub fn delay_for(&self, attempt: usize) -> Duration {
        self.interval_fn.next_interval(attempt)
    }

    /// Instance name used in events, logs and metrics.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Builder for [`RetryLayer`].
pub struct RetryConfigBuilder {
    handled: HandledKinds,
    max_attempts: usize,
    interval_fn: Option<Arc<dyn IntervalFunction>>,
    sleeper: Option<SharedSleeper>,
    event_listeners: EventListeners<RetryEvent>,
    name: String,
}

impl RetryConfigBuilder {
    /// Creates a builder retrying failures of `kind`.
    ///
    /// Defaults:
    /// - max_attempts: 3 (the first attempt plus two retries)
    /// - backoff: none, retries run immediately
    /// - name: `"<unnamed>"`
    pub fn new(kind: ErrorKind) -> Self {
        #[cfg(feature = "metrics")]
        METRICS_INIT.call_once(|| {
            metrics::describe_counter!(
                "retry_calls_total",
                "Calls through the retry policy by final result"
            );
            metrics::describe_counter!(
                "retry_attempts_total",
                "Retries performed after a handled failure"
            );
        });

        Self {
            handled: HandledKinds::handle(kind),
            max_attempts: 3,
            interval_fn: None,
            sleeper: None,
            event_listeners: EventListeners::new(),
            name: "<unnamed>".to_string(),
        }
    }

    /// Also retries failures of `kind`.
    pub fn or(mut self, kind: ErrorKind) -> Self {
        self.handled = self.handled.or(kind);
        self
    }

    /// Sets the total number of attempts, including the first.
    ///
    /// `1` disables retrying. `0` is rejected by [`build`](Self::build).
    pub fn max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Waits `duration` before every retry.
    pub fn fixed_backoff(mut self, duration: Duration) -> Self {
        self.interval_fn = Some(Arc::new(FixedInterval::new(duration)));
        self
    }

    /// Doubles the wait on every retry, starting at `initial_interval`.
    pub fn exponential_backoff(mut self, initial_interval: Duration) -> Self {
        self.interval_fn = Some(Arc::new(ExponentialBackoff::new(initial_interval)));
        self
    }

    /// Uses a custom interval function.
    pub fn backoff<I>(mut self, interval_fn: I) -> Self
    where
        I: IntervalFunction + 'static,
    {
        self.interval_fn = Some(Arc::new(interval_fn));
        self
    }

    /// Replaces the sleeper used to wait between attempts.
    pub fn sleeper<T>(mut self, sleeper: T) -> Self
    where
        T: Sleeper + 'static,
    {
        self.sleeper = Some(Arc::new(sleeper));
        self
    }

    /// Sets the name for this retry instance (used in events).
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback invoked before waiting for each retry.
    ///
    /// Receives the failure that triggered the retry, the retry number (1 for
    /// the first retry) and the upcoming delay. The callback may perform
    /// recovery side effects, such as restoring a dependency, before the next
    /// attempt runs.
    ///
    /// ```rust
    /// use tower_fortify_core::ErrorKind;
    /// use tower_fortify_retry::RetryLayer;
    /// use std::time::Duration;
    ///
    /// let layer = RetryLayer::handle(ErrorKind::Transient)
    ///     .max_attempts(5)
    ///     .exponential_backoff(Duration::from_millis(100))
    ///     .on_retry(|err, attempt, delay| {
    ///         println!("retry {attempt} in {delay:?} after {err}");
    ///     })
    ///     .build()
    ///     .unwrap();
    /// ```
    pub fn on_retry<F>(mut self, f: F) -> Self
    where
        F: Fn(&ClassifiedError, usize, Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Retry {
                error,
                attempt,
                delay,
                ..
            } = event
            {
                f(error, *attempt, *delay);
            }
        }));
        self
    }

    /// Registers a callback invoked on success with the total number of attempts.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Success { attempts, .. } = event {
                f(*attempts);
            }
        }));
        self
    }

    /// Registers a callback invoked when every attempt failed with a handled kind.
    pub fn on_exhausted<F>(mut self, f: F) -> Self
    where
        F: Fn(&ClassifiedError, usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Exhausted {
                error, attempts, ..
            } = event
            {
                f(error, *attempts);
            }
        }));
        self
    }

    /// Registers a callback invoked when a failure of an unhandled kind passes through.
    pub fn on_ignored<F>(mut self, f: F) -> Self
    where
        F: Fn(&ClassifiedError) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::IgnoredError { error, .. } = event {
                f(error);
            }
        }));
        self
    }

    /// Validates the configuration and builds the layer.
    pub fn build(self) -> Result<RetryLayer, ConfigError> {
        let max_attempts = ConfigError::require_nonzero("max_attempts", self.max_attempts)?;

        let config = RetryConfig {
            handled: self.handled,
            max_attempts,
            interval_fn: self.interval_fn.unwrap_or_else(|| Arc::new(ZeroInterval)),
            sleeper: self.sleeper.unwrap_or_else(|| Arc::new(TokioSleeper)),
            event_listeners: self.event_listeners,
            name: self.name,
        };

        Ok(RetryLayer::new(config))
    }
}
