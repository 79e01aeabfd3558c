use crate::{Retry, RetryConfig, RetryConfigBuilder};
use std::sync::Arc;
use tower::Layer;
use tower_fortify_core::{ErrorKind, PolicyExt};

/// A Tower [`Layer`] that retries failures of the handled kinds.
///
/// # Examples
///
/// ```
/// use tower_fortify_core::{ClassifiedError, Context, ErrorKind, PolicyExt};
/// use tower_fortify_retry::RetryLayer;
/// use std::time::Duration;
///
/// # async fn example() {
/// let retry = RetryLayer::handle(ErrorKind::Transient)
///     .max_attempts(3)
///     .fixed_backoff(Duration::from_millis(50))
///     .build()
///     .unwrap();
///
/// let out = retry
///     .execute(Context::new("ping"), |_ctx: Context| async {
///         Ok::<_, ClassifiedError>("pong")
///     })
///     .await;
/// assert_eq!(out.unwrap(), "pong");
/// # }
/// ```
#[derive(Clone)]
pub struct RetryLayer {
    config: Arc<RetryConfig>,
}

impl RetryLayer {
    pub(crate) fn new(config: RetryConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Starts a builder retrying failures of `kind`.
    pub fn handle(kind: ErrorKind) -> RetryConfigBuilder {
        RetryConfigBuilder::new(kind)
    }

    /// The validated configuration.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}

impl<S> Layer<S> for RetryLayer {
    type Service = Retry<S>;

    fn layer(&self, service: S) -> Self::Service {
        Retry::new(service, Arc::clone(&self.config))
    }
}

impl PolicyExt for RetryLayer {}

impl std::fmt::Debug for RetryLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryLayer")
            .field("name", &self.config.name)
            .field("handled", &self.config.handled)
            .field("max_attempts", &self.config.max_attempts)
            .finish()
    }
}
