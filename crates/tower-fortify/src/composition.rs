//! # Composition Guide
//!
//! Policies nest: each one wraps the next, and the outermost sees the call
//! first and the outcome last.
//!
//! ## Wrapping order
//!
//! [`PolicyExt::wrap`](crate::PolicyExt::wrap) makes the receiver the *inner*
//! policy of its argument, so chains read from the operation outwards:
//!
//! ```text
//! retry.wrap(breaker).wrap(fallback)
//!
//! Request → [Fallback] → [CircuitBreaker] → [Retry] → operation
//!                                                        ↓
//! Outcome ← [Fallback] ← [CircuitBreaker] ← [Retry] ← outcome
//! ```
//!
//! The last policy wrapped runs first. The free function
//! [`wrap(outer, inner)`](crate::wrap) builds the same pair with the outer
//! policy named first:
//!
//! ```rust
//! use tower::layer::util::Identity;
//! use tower_fortify::wrap;
//!
//! let a = Identity::new();
//! let b = Identity::new();
//! let _same = wrap(b, a); // == a.wrap(b)
//! ```
//!
//! A chain is itself a [`tower::Layer`], so it can also go into a
//! `ServiceBuilder`. `ServiceBuilder` is the other way round: the first
//! `.layer()` call is the outermost.
//!
//! ```text
//! ServiceBuilder::new()
//!     .layer(fallback)   // outermost, sees the request first
//!     .layer(breaker)
//!     .layer(retry)      // innermost, closest to the operation
//!     .service(op)
//! ```
//!
//! ## Breaker around retry, or retry around breaker
//!
//! Both orders are valid and behave differently.
//!
//! **Breaker wraps retry** (`retry.wrap(breaker)`): the breaker sees one
//! outcome per retry burst. With `max_attempts(3)` and `failure_threshold(1)`,
//! an operation that always fails is invoked three times, then the breaker
//! counts one failure and opens. Later calls are refused without reaching the
//! retry.
//!
//! ```rust
//! # #[cfg(all(feature = "retry", feature = "circuitbreaker"))]
//! # {
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tower_fortify::prelude::*;
//!
//! # async fn example() {
//! let retry = RetryLayer::handle(ErrorKind::PermanentUnavailable)
//!     .max_attempts(3)
//!     .build()
//!     .unwrap();
//! let breaker = CircuitBreakerLayer::handle(ErrorKind::PermanentUnavailable)
//!     .failure_threshold(1)
//!     .break_duration(Duration::from_secs(10))
//!     .build()
//!     .unwrap();
//! let policy = retry.wrap(breaker.clone());
//!
//! let calls = Arc::new(AtomicUsize::new(0));
//! let op = {
//!     let calls = Arc::clone(&calls);
//!     move |_ctx: Context| {
//!         calls.fetch_add(1, Ordering::SeqCst);
//!         async { Err::<(), _>(ClassifiedError::permanent_unavailable("down")) }
//!     }
//! };
//!
//! let first = policy.execute(Context::new("op"), op.clone()).await;
//! assert_eq!(first.unwrap_err().kind(), ErrorKind::PermanentUnavailable);
//! assert_eq!(calls.load(Ordering::SeqCst), 3);
//! assert_eq!(breaker.state(), CircuitState::Open);
//!
//! let second = policy.execute(Context::new("op"), op).await;
//! assert!(second.unwrap_err().is_circuit_open());
//! assert_eq!(calls.load(Ordering::SeqCst), 3);
//! # }
//! # }
//! ```
//!
//! **Retry wraps breaker** (`breaker.wrap(retry)`): every attempt goes through
//! the breaker, so it counts raw failures. Once it opens, the remaining
//! attempts see [`ErrorKind::CircuitOpen`](crate::ErrorKind::CircuitOpen).
//! Those are only retried if the retry policy also handles `CircuitOpen`,
//! which usually wants a backoff at least as long as the break duration.
//!
//! ## Fallback goes outside
//!
//! A fallback absorbs the failures it handles, so nothing outside it sees
//! them. Put it outermost to catch the final outcome, and add
//! `.or(ErrorKind::CircuitOpen)` when the chain contains a breaker.
//!
//! ## Cache placement
//!
//! A cache outside the retry serves hits without touching the operation or
//! the other policies. A cache inside the retry only saves work for attempts
//! after a success was stored, which is rarely useful.
//!
//! ## Shared state
//!
//! Circuit and cache state belong to the layer. Everything built from the
//! same layer value (clones included) shares it:
//!
//! - Reuse one chain for every call to the same dependency.
//! - Build separate layers for dependencies that should fail independently.
//!
//! ## Unhandled kinds
//!
//! A failure whose kind a policy does not handle passes through it
//! unchanged: no retry, no breaker count, no fallback. Use
//! [`ErrorKind::Unclassified`](crate::ErrorKind::Unclassified) for failures
//! no policy should act on.
