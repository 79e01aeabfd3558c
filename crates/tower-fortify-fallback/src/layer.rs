//! Tower layer for fallback.

use crate::config::{FallbackConfig, FallbackConfigBuilder};
use crate::Fallback;
use std::sync::Arc;
use tower::Layer;
use tower_fortify_core::{ErrorKind, PolicyExt};

/// A Tower layer that replaces handled failures with a fallback value.
///
/// See the [module-level documentation](crate) for usage examples.
pub struct FallbackLayer<T> {
    config: Arc<FallbackConfig<T>>,
}

impl<T> FallbackLayer<T> {
    pub(crate) fn new(config: FallbackConfig<T>) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Starts a builder absorbing failures of `kind`.
    ///
    /// ```rust
    /// use tower_fortify_core::ErrorKind;
    /// use tower_fortify_fallback::FallbackLayer;
    ///
    /// let layer = FallbackLayer::handle(ErrorKind::AlwaysFails)
    ///     .supplier(|| Vec::<u8>::new())
    ///     .build()
    ///     .unwrap();
    /// ```
    pub fn handle(kind: ErrorKind) -> FallbackConfigBuilder<T> {
        FallbackConfigBuilder::new(kind)
    }

    /// The validated configuration.
    pub fn config(&self) -> &FallbackConfig<T> {
        &self.config
    }
}

impl<T> Clone for FallbackLayer<T> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
        }
    }
}

impl<S, T> Layer<S> for FallbackLayer<T> {
    type Service = Fallback<S, T>;

    fn layer(&self, service: S) -> Self::Service {
        Fallback::new(service, Arc::clone(&self.config))
    }
}

impl<T> PolicyExt for FallbackLayer<T> {}

impl<T> std::fmt::Debug for FallbackLayer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackLayer")
            .field("name", &self.config.name)
            .field("handled", &self.config.handled)
            .field("strategy", &self.config.strategy.as_str())
            .finish()
    }
}
