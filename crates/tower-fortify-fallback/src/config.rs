//! Configuration for the fallback service.

use crate::{FallbackEvent, FallbackLayer};
use std::sync::Arc;
use tower_fortify_core::events::{EventListeners, FnListener};
use tower_fortify_core::{ClassifiedError, ConfigError, ErrorKind, HandledKinds};

#[cfg(feature = "metrics")]
static METRICS_INIT: std::sync::Once = std::sync::Once::new();

/// How the substitute response is produced.
pub(crate) enum FallbackStrategy<T> {
    /// Produces a fresh value on every fallback.
    Supplier(Arc<dyn Fn() -> T + Send + Sync>),
    /// Computes the value from the absorbed failure.
    FromError(Arc<dyn Fn(&ClassifiedError) -> T + Send + Sync>),
}

impl<T> FallbackStrategy<T> {
    pub(crate) fn apply(&self, error: &ClassifiedError) -> T {
        match self {
            FallbackStrategy::Supplier(f) => f(),
            FallbackStrategy::FromError(f) => f(error),
        }
    }

    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            FallbackStrategy::Supplier(_) => "supplier",
            FallbackStrategy::FromError(_) => "from_error",
        }
    }
}

/// Configuration for the fallback service.
pub struct FallbackConfig<T> {
    pub(crate) handled: HandledKinds,
    pub(crate) strategy: FallbackStrategy<T>,
    pub(crate) event_listeners: EventListeners<FallbackEvent>,
    pub(crate) name: String,
}

impl<T> FallbackConfig<T> {
    /// Kinds that are replaced by the fallback value.
    pub fn handled(&self) -> HandledKinds {
        self.handled
    }

    /// Instance name used in events, logs and metrics.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Builder for constructing a [`FallbackLayer`].
pub struct FallbackConfigBuilder<T> {
    handled: HandledKinds,
    strategy: Option<FallbackStrategy<T>>,
    event_listeners: EventListeners<FallbackEvent>,
    name: String,
}

impl<T> FallbackConfigBuilder<T> {
    /// Creates a builder absorbing failures of `kind`.
    pub fn new(kind: ErrorKind) -> Self {
        #[cfg(feature = "metrics")]
        METRICS_INIT.call_once(|| {
            metrics::describe_counter!(
                "fallback_calls_total",
                "Total number of calls through the fallback, by result"
            );
        });

        Self {
            handled: HandledKinds::handle(kind),
            strategy: None,
            event_listeners: EventListeners::new(),
            name: "<unnamed>".to_string(),
        }
    }

    /// Also absorbs failures of `kind`.
    pub fn or(mut self, kind: ErrorKind) -> Self {
        self.handled = self.handled.or(kind);
        self
    }

    /// Sets a static fallback value, cloned for every fallback.
    pub fn value(mut self, value: T) -> Self
    where
        T: Clone + Send + Sync + 'static,
    {
        self.strategy = Some(FallbackStrategy::Supplier(Arc::new(move || value.clone())));
        self
    }

    /// Sets a zero-argument supplier of the fallback value.
    pub fn supplier<F>(mut self, f: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.strategy = Some(FallbackStrategy::Supplier(Arc::new(f)));
        self
    }

    /// Sets a function computing the fallback value from the failure.
    pub fn from_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&ClassifiedError) -> T + Send + Sync + 'static,
    {
        self.strategy = Some(FallbackStrategy::FromError(Arc::new(f)));
        self
    }

    /// Sets the name for this fallback instance (used in metrics and events).
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback invoked with each failure the fallback absorbs.
    pub fn on_fallback<F>(mut self, f: F) -> Self
    where
        F: Fn(&ClassifiedError) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let FallbackEvent::Applied { error, .. } = event {
                f(error);
            }
        }));
        self
    }

    /// Builds the fallback layer.
    ///
    /// Fails with [`ConfigError::Missing`] when no value, supplier or
    /// error function was configured.
    pub fn build(self) -> Result<FallbackLayer<T>, ConfigError> {
        let strategy = self
            .strategy
            .ok_or(ConfigError::Missing { field: "supplier" })?;

        Ok(FallbackLayer::new(FallbackConfig {
            handled: self.handled,
            strategy,
            event_listeners: self.event_listeners,
            name: self.name,
        }))
    }
}
