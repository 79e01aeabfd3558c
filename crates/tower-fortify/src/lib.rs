//! Composable fault-tolerance policies for Tower services.
//!
//! `tower-fortify` wraps an unreliable operation in policies that decide, per
//! call and from the history of earlier calls, whether to try again, refuse
//! the call, substitute a default, or serve a cached result. Each policy is a
//! [`tower::Layer`], lives in its own crate, and is re-exported here behind a
//! cargo feature.
//!
//! # Policies
//!
//! - **Retry** (`retry` feature): re-invokes the operation on handled
//!   failures, with fixed or exponential backoff
//! - **Circuit breaker** (`circuitbreaker` feature): stops calling a
//!   dependency after consecutive failures and probes it with a single trial
//! - **Fallback** (`fallback` feature): replaces handled failures with a
//!   default value
//! - **Cache** (`cache` feature): serves fresh results keyed by the call's
//!   [`Context`]
//! - **Faults** (`faults` feature): an echo service that injects latency and
//!   failures, for exercising the policies
//!
//! Enable what you need, or everything:
//!
//! ```toml
//! [dependencies]
//! tower-fortify = { version = "0.1", features = ["full"] }
//! ```
//!
//! # Failure kinds
//!
//! Operations fail with a [`ClassifiedError`]. Each policy is built with the
//! [`ErrorKind`]s it handles and lets every other kind pass through untouched.
//!
//! # Example
//!
//! ```rust
//! # #[cfg(all(feature = "retry", feature = "circuitbreaker", feature = "fallback"))]
//! # {
//! use std::time::Duration;
//! use tower_fortify::prelude::*;
//!
//! # async fn example() {
//! let retry = RetryLayer::handle(ErrorKind::Transient)
//!     .max_attempts(3)
//!     .exponential_backoff(Duration::from_millis(100))
//!     .build()
//!     .unwrap();
//! let breaker = CircuitBreakerLayer::handle(ErrorKind::Transient)
//!     .failure_threshold(2)
//!     .break_duration(Duration::from_secs(30))
//!     .build()
//!     .unwrap();
//! let fallback = FallbackLayer::handle(ErrorKind::Transient)
//!     .or(ErrorKind::CircuitOpen)
//!     .value("unavailable".to_string())
//!     .build()
//!     .unwrap();
//!
//! // fallback -> breaker -> retry -> operation
//! let policy = retry.wrap(breaker).wrap(fallback);
//!
//! let out = policy
//!     .execute(Context::new("lookup"), |_ctx: Context| async {
//!         Err::<String, _>(ClassifiedError::transient("connection reset"))
//!     })
//!     .await;
//! assert_eq!(out.unwrap(), "unavailable");
//! # }
//! # }
//! ```
//!
//! See [`composition`] for how wrapping order changes behavior.

pub mod composition;

// Re-export core (always available)
pub use tower_fortify_core as core;
pub use tower_fortify_core::{
    wrap, ClassifiedError, ConfigError, Context, ErrorKind, HandledKinds, Outcome, PolicyExt,
    PolicyWrap,
};

// Re-export policies based on features
#[cfg(feature = "cache")]
pub use tower_fortify_cache as cache;

#[cfg(feature = "circuitbreaker")]
pub use tower_fortify_circuitbreaker as circuitbreaker;

#[cfg(feature = "fallback")]
pub use tower_fortify_fallback as fallback;

#[cfg(feature = "faults")]
pub use tower_fortify_faults as faults;

#[cfg(feature = "retry")]
pub use tower_fortify_retry as retry;

/// The types most programs need, in one import.
pub mod prelude {
    pub use tower_fortify_core::{
        wrap, ClassifiedError, ConfigError, Context, ErrorKind, HandledKinds, Outcome, PolicyExt,
        PolicyWrap,
    };

    #[cfg(feature = "cache")]
    pub use tower_fortify_cache::{CacheLayer, CacheStore, MemoryStore};

    #[cfg(feature = "circuitbreaker")]
    pub use tower_fortify_circuitbreaker::{CircuitBreakerLayer, CircuitState};

    #[cfg(feature = "fallback")]
    pub use tower_fortify_fallback::FallbackLayer;

    #[cfg(feature = "faults")]
    pub use tower_fortify_faults::EchoService;

    #[cfg(feature = "retry")]
    pub use tower_fortify_retry::{ExponentialBackoff, FixedInterval, RetryLayer};
}
