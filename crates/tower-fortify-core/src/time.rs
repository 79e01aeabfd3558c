//! Time sources and sleepers used by timing-sensitive policies.
//!
//! Policies never call `Instant::now()` or `tokio::time::sleep` directly. They
//! read time through a [`Clock`] and wait through a [`Sleeper`], so tests can
//! substitute a [`ManualClock`] or a [`RecordingSleeper`] and assert exact
//! durations.
//!
//! The defaults are backed by tokio's timer, which means
//! `#[tokio::test(start_paused = true)]` also controls them.

use futures::future::BoxFuture;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

pub use tokio::time::Instant;

/// A monotonic time source.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> Instant;
}

/// Shared, type-erased clock.
pub type SharedClock = Arc<dyn Clock>;

/// Clock backed by [`tokio::time::Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same time.
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    /// Creates a clock frozen at the current instant.
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ManualClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualClock").finish_non_exhaustive()
    }
}

/// Waits for a duration on behalf of a policy.
pub trait Sleeper: Send + Sync {
    /// Returns a future that completes after `duration`.
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;
}

/// Shared, type-erased sleeper.
pub type SharedSleeper = Arc<dyn Sleeper>;

/// Sleeper backed by [`tokio::time::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            if !duration.is_zero() {
                tokio::time::sleep(duration).await;
            }
        })
    }
}

/// A sleeper that returns immediately and remembers every requested duration.
///
/// Clones share the same record. If built with [`with_clock`](RecordingSleeper::with_clock),
/// each sleep also advances that clock, so clock-driven policies observe the
/// elapsed time without real waiting.
#[derive(Clone, Default)]
pub struct RecordingSleeper {
    calls: Arc<Mutex<Vec<Duration>>>,
    clock: Option<ManualClock>,
}

impl RecordingSleeper {
    /// Creates an empty recording sleeper.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a recording sleeper that advances `clock` on every sleep.
    pub fn with_clock(clock: ManualClock) -> Self {
        Self {
            calls: Arc::default(),
            clock: Some(clock),
        }
    }

    /// All durations requested so far, in order.
    pub fn calls(&self) -> Vec<Duration> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Sum of all requested durations.
    pub fn total(&self) -> Duration {
        self.calls().into_iter().sum()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(duration);
        if let Some(clock) = &self.clock {
            clock.advance(duration);
        }
        Box::pin(futures::future::ready(()))
    }
}

impl fmt::Debug for RecordingSleeper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingSleeper")
            .field("calls", &self.calls())
            .finish()
    }
}
