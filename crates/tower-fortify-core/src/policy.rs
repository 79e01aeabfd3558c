//! Policy composition.
//!
//! A policy is a [`Layer`]. Two policies compose into a [`PolicyWrap`], which
//! is itself a policy, so chains of any length are built pairwise.
//!
//! At call time the outer policy runs first and treats the inner policy
//! (plus the operation beneath it) as its operation. Order matters: a circuit
//! breaker wrapped around a retry counts one failure per exhausted retry
//! burst, while a retry wrapped around a breaker sees each fast-fail as one
//! retryable attempt.

use crate::{Context, Outcome};
use std::future::Future;
use tower::util::{Oneshot, ServiceExt, ServiceFn};
use tower::{service_fn, Layer, Service};

/// Two policies composed into one.
///
/// Layering `PolicyWrap { inner, outer }` over a service `S` yields
/// `outer.layer(inner.layer(S))`.
#[derive(Debug, Clone)]
pub struct PolicyWrap<Inner, Outer> {
    inner: Inner,
    outer: Outer,
}

impl<Inner, Outer> PolicyWrap<Inner, Outer> {
    /// Composes `outer` around `inner`.
    pub fn new(inner: Inner, outer: Outer) -> Self {
        Self { inner, outer }
    }

    /// The policy closest to the operation.
    pub fn inner(&self) -> &Inner {
        &self.inner
    }

    /// The policy that runs first.
    pub fn outer(&self) -> &Outer {
        &self.outer
    }
}

impl<S, Inner, Outer> Layer<S> for PolicyWrap<Inner, Outer>
where
    Inner: Layer<S>,
    Outer: Layer<Inner::Service>,
{
    type Service = Outer::Service;

    fn layer(&self, service: S) -> Self::Service {
        self.outer.layer(self.inner.layer(service))
    }
}

/// Composes `outer` around `inner`. Equivalent to `inner.wrap(outer)`.
pub fn wrap<Outer, Inner>(outer: Outer, inner: Inner) -> PolicyWrap<Inner, Outer> {
    PolicyWrap::new(inner, outer)
}

/// Composition and one-shot execution for policies.
///
/// ```rust
/// use tower_fortify_core::{ClassifiedError, Context, PolicyExt, PolicyWrap};
/// use tower::layer::util::Identity;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let policy = PolicyWrap::new(Identity::new(), Identity::new());
/// let out = policy
///     .execute(Context::new("greet"), |ctx: Context| async move {
///         Ok::<_, ClassifiedError>(format!("hello from {}", ctx.operation_key().unwrap_or("?")))
///     })
///     .await;
/// assert_eq!(out.unwrap(), "hello from greet");
/// # }
/// ```
pub trait PolicyExt: Sized {
    /// Makes `self` the inner policy of `outer`.
    ///
    /// Chains read inside-out: `a.wrap(b).wrap(c)` runs `c`, then `b`, then
    /// `a`, then the operation.
    fn wrap<Outer>(self, outer: Outer) -> PolicyWrap<Self, Outer> {
        PolicyWrap::new(self, outer)
    }

    /// Runs `operation` once under this policy with the given context.
    ///
    /// The operation may be invoked zero or more times; exactly one outcome is
    /// returned.
    fn execute<F, Fut, T>(
        &self,
        context: Context,
        operation: F,
    ) -> Oneshot<<Self as Layer<ServiceFn<F>>>::Service, Context>
    where
        Self: Layer<ServiceFn<F>>,
        <Self as Layer<ServiceFn<F>>>::Service:
            Service<Context, Response = T, Error = crate::ClassifiedError>,
        F: FnMut(Context) -> Fut,
        Fut: Future<Output = Outcome<T>>,
    {
        self.layer(service_fn(operation)).oneshot(context)
    }
}

impl<Inner, Outer> PolicyExt for PolicyWrap<Inner, Outer> {}

impl PolicyExt for tower::layer::util::Identity {}
