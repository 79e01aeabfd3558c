//! Event plumbing shared by all policies.
//!
//! Each policy defines its own event enum and implements [`PolicyEvent`] for
//! it. Builders collect `on_*` callbacks into an [`EventListeners`] list which
//! the policy fires synchronously on the calling task.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// An event emitted by a policy instance.
pub trait PolicyEvent: Send + Sync + fmt::Debug {
    /// Short, stable identifier of the event (e.g. `"retry"`, `"cache_hit"`).
    fn event_type(&self) -> &'static str;

    /// When the event occurred.
    fn timestamp(&self) -> Instant;

    /// Name of the policy instance that emitted the event.
    fn policy_name(&self) -> &str;
}

/// Receives policy events.
pub trait EventListener<E: PolicyEvent>: Send + Sync {
    /// Called for each emitted event.
    fn on_event(&self, event: &E);
}

/// Shared listener handle.
pub type BoxedEventListener<E> = Arc<dyn EventListener<E>>;

/// Ordered list of listeners for one policy instance.
#[derive(Clone)]
pub struct EventListeners<E: PolicyEvent> {
    listeners: Vec<BoxedEventListener<E>>,
}

impl<E: PolicyEvent> EventListeners<E> {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Appends a listener. Listeners run in registration order.
    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Delivers `event` to every listener.
    ///
    /// A panicking listener is isolated: the panic is swallowed and the
    /// remaining listeners still run. Callbacks must not be able to change the
    /// outcome of the call that triggered them.
    pub fn emit(&self, event: &E) {
        for listener in &self.listeners {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener.on_event(event);
            }));

            if result.is_err() {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    policy = event.policy_name(),
                    event = event.event_type(),
                    "event listener panicked"
                );
            }
        }
    }

    /// Returns `true` if no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }
}

impl<E: PolicyEvent> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: PolicyEvent> fmt::Debug for EventListeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventListeners")
            .field("len", &self.listeners.len())
            .finish()
    }
}

/// Adapts a closure into an [`EventListener`].
pub struct FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    f: F,
    _phantom: std::marker::PhantomData<fn(&E)>,
}

impl<E, F> FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    /// Wraps `f`.
    pub fn new(f: F) -> Self {
        Self {
            f,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<E, F> EventListener<E> for FnListener<E, F>
where
    E: PolicyEvent,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        (self.f)(event)
    }
}
