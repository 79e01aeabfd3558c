use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Computes the wait before a retry.
///
/// `attempt` is the 0-based index of the retry: the wait before the first
/// retry is `next_interval(0)`.
pub trait IntervalFunction: Send + Sync {
    /// Delay before retry number `attempt` (0-indexed).
    fn next_interval(&self, attempt: usize) -> Duration;
}

/// Retries immediately. This is the default.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroInterval;

impl IntervalFunction for ZeroInterval {
    fn next_interval(&self, _attempt: usize) -> Duration {
        Duration::ZERO
    }
}

/// Waits the same duration before every retry.
#[derive(Debug, Clone)]
pub struct FixedInterval {
    duration: Duration,
}

impl FixedInterval {
    /// Creates a fixed interval.
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

impl IntervalFunction for FixedInterval {
    fn next_interval(&self, _attempt: usize) -> Duration {
        self.duration
    }
}

/// `initial * multiplier^attempt`, optionally capped.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial_interval: Duration,
    multiplier: f64,
    max_interval: Option<Duration>,
}

impl ExponentialBackoff {
    /// Creates an exponential backoff doubling from `initial_interval`.
    pub fn new(initial_interval: Duration) -> Self {
        Self {
            initial_interval,
            multiplier: 2.0,
            max_interval: None,
        }
    }

    /// Sets the growth factor. Values below 1.0 are treated as 1.0.
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier.max(1.0);
        self
    }

    /// Caps every interval at `max_interval`.
    pub fn max_interval(mut self, max_interval: Duration) -> Self {
        self.max_interval = Some(max_interval);
        self
    }

    fn base(&self, attempt: usize) -> Duration {
        let exponent = attempt.min(i32::MAX as usize) as i32;
        let factor = self.multiplier.powi(exponent);
        let secs = self.initial_interval.as_secs_f64() * factor;
        let interval = Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX);
        match self.max_interval {
            Some(max) => interval.min(max),
            None => interval,
        }
    }
}

impl IntervalFunction for ExponentialBackoff {
    fn next_interval(&self, attempt: usize) -> Duration {
        self.base(attempt)
    }
}

/// Exponential backoff with each interval spread uniformly over
/// `[base * (1 - factor), base * (1 + factor)]`.
///
/// Seed it with [`seed`](ExponentialRandomBackoff::seed) for reproducible
/// delays.
#[derive(Debug)]
pub struct ExponentialRandomBackoff {
    exponential: ExponentialBackoff,
    randomization_factor: f64,
    rng: Mutex<StdRng>,
}

impl ExponentialRandomBackoff {
    /// Creates a randomized backoff. `randomization_factor` is clamped to `[0.0, 1.0]`.
    pub fn new(initial_interval: Duration, randomization_factor: f64) -> Self {
        Self {
            exponential: ExponentialBackoff::new(initial_interval),
            randomization_factor: randomization_factor.clamp(0.0, 1.0),
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Sets the growth factor.
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.exponential = self.exponential.multiplier(multiplier);
        self
    }

    /// Caps the interval before randomization.
    pub fn max_interval(mut self, max_interval: Duration) -> Self {
        self.exponential = self.exponential.max_interval(max_interval);
        self
    }

    /// Makes the random draws deterministic.
    pub fn seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }
}

impl IntervalFunction for ExponentialRandomBackoff {
    fn next_interval(&self, attempt: usize) -> Duration {
        let base = self.exponential.base(attempt).as_secs_f64();
        let delta = base * self.randomization_factor;
        if delta == 0.0 || !delta.is_finite() {
            return self.exponential.base(attempt);
        }
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let randomized = rng.random_range((base - delta)..=(base + delta));
        Duration::try_from_secs_f64(randomized.max(0.0)).unwrap_or(Duration::MAX)
    }
}

/// Delay computed by a closure.
pub struct FnInterval<F> {
    f: F,
}

impl<F> FnInterval<F>
where
    F: Fn(usize) -> Duration + Send + Sync,
{
    /// Wraps `f`.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> IntervalFunction for FnInterval<F>
where
    F: Fn(usize) -> Duration + Send + Sync,
{
    fn next_interval(&self, attempt: usize) -> Duration {
        (self.f)(attempt)
    }
}
