//! Failure taxonomy shared by every tower-fortify policy.
//!
//! Every operation wrapped by a policy reports failure as a [`ClassifiedError`]:
//! a human-readable message tagged with one [`ErrorKind`] from a closed set.
//! Policies decide what to do with a failure by matching on its kind through
//! [`HandledKinds`]; the message is never inspected.
//!
//! ```rust
//! use tower_fortify_core::{ClassifiedError, ErrorKind, HandledKinds};
//!
//! let handled = HandledKinds::handle(ErrorKind::Transient).or(ErrorKind::AlwaysFails);
//!
//! assert!(handled.matches(&ClassifiedError::transient("connection reset")));
//! assert!(!handled.matches(&ClassifiedError::permanent_unavailable("maintenance")));
//! ```

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// The outcome of a single attempt: the produced value or a classified failure.
pub type Outcome<T> = Result<T, ClassifiedError>;

/// The closed set of failure kinds understood by the policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ErrorKind {
    /// Expected to resolve on its own; a candidate for retry and backoff.
    Transient = 0,
    /// The remote system is unavailable; a candidate for circuit breaking.
    PermanentUnavailable = 1,
    /// A persistent fault that needs a recovery action rather than a plain retry.
    AlwaysFails = 2,
    /// Synthesized by a circuit breaker that refused the call. Never produced by an operation.
    CircuitOpen = 3,
    /// Anything no policy is configured to handle.
    Unclassified = 4,
}

impl ErrorKind {
    /// All kinds, in declaration order.
    pub const ALL: [ErrorKind; 5] = [
        ErrorKind::Transient,
        ErrorKind::PermanentUnavailable,
        ErrorKind::AlwaysFails,
        ErrorKind::CircuitOpen,
        ErrorKind::Unclassified,
    ];

    /// Stable lowercase label, used for metric labels and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Transient => "transient",
            ErrorKind::PermanentUnavailable => "permanent_unavailable",
            ErrorKind::AlwaysFails => "always_fails",
            ErrorKind::CircuitOpen => "circuit_open",
            ErrorKind::Unclassified => "unclassified",
        }
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure tagged with its [`ErrorKind`].
///
/// Errors produced by a circuit breaker (`ErrorKind::CircuitOpen`) carry the
/// remaining cool-down in [`retry_after`](ClassifiedError::retry_after).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ClassifiedError {
    kind: ErrorKind,
    message: String,
    retry_after: Option<Duration>,
}

impl ClassifiedError {
    /// Creates an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retry_after: None,
        }
    }

    /// Creates a [`ErrorKind::Transient`] error.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, message)
    }

    /// Creates a [`ErrorKind::PermanentUnavailable`] error.
    pub fn permanent_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PermanentUnavailable, message)
    }

    /// Creates a [`ErrorKind::AlwaysFails`] error.
    pub fn always_fails(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AlwaysFails, message)
    }

    /// Creates a [`ErrorKind::Unclassified`] error.
    pub fn unclassified(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unclassified, message)
    }

    /// Creates the error a circuit breaker returns while refusing calls.
    pub fn circuit_open(name: &str, remaining: Duration) -> Self {
        Self {
            kind: ErrorKind::CircuitOpen,
            message: format!("circuit '{}' is open; call not permitted", name),
            retry_after: Some(remaining),
        }
    }

    /// The failure kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Remaining cool-down for circuit-open errors.
    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }

    /// Returns `true` if this error was synthesized by an open circuit.
    pub fn is_circuit_open(&self) -> bool {
        self.kind == ErrorKind::CircuitOpen
    }
}

/// The set of failure kinds a policy handles.
///
/// Start with one kind and add more with [`or`](HandledKinds::or). Anything
/// outside the set passes through the policy untouched.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandledKinds {
    mask: u8,
}

impl HandledKinds {
    /// Handles a single kind.
    pub fn handle(kind: ErrorKind) -> Self {
        Self { mask: kind.bit() }
    }

    /// Also handles `kind`.
    pub fn or(mut self, kind: ErrorKind) -> Self {
        self.mask |= kind.bit();
        self
    }

    /// Returns `true` if `kind` is in the set.
    pub fn contains(&self, kind: ErrorKind) -> bool {
        self.mask & kind.bit() != 0
    }

    /// Returns `true` if the error's kind is in the set.
    pub fn matches(&self, error: &ClassifiedError) -> bool {
        self.contains(error.kind())
    }

    /// Iterates the handled kinds in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = ErrorKind> + '_ {
        ErrorKind::ALL.into_iter().filter(|k| self.contains(*k))
    }
}

impl From<ErrorKind> for HandledKinds {
    fn from(kind: ErrorKind) -> Self {
        HandledKinds::handle(kind)
    }
}

impl fmt::Debug for HandledKinds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Errors reported by policy builders when a configuration is rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// A count that must be at least one was zero.
    #[error("{field} must be at least 1")]
    ZeroCount {
        /// The offending setting.
        field: &'static str,
    },

    /// A duration that must be positive was zero.
    #[error("{field} must be greater than zero")]
    ZeroDuration {
        /// The offending setting.
        field: &'static str,
    },

    /// A lower bound exceeded its upper bound.
    #[error("{field}: lower bound {lower:?} is greater than upper bound {upper:?}")]
    InvertedBounds {
        /// The offending setting.
        field: &'static str,
        /// Configured lower bound.
        lower: Duration,
        /// Configured upper bound.
        upper: Duration,
    },

    /// A probability outside `[0.0, 1.0]`.
    #[error("{field} must be within [0.0, 1.0], got {value}")]
    InvalidProbability {
        /// The offending setting.
        field: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// A required setting was never provided.
    #[error("{field} must be set before building")]
    Missing {
        /// The missing setting.
        field: &'static str,
    },
}

impl ConfigError {
    /// Checks that `value` is at least one.
    pub fn require_nonzero(field: &'static str, value: usize) -> Result<usize, ConfigError> {
        if value == 0 {
            Err(ConfigError::ZeroCount { field })
        } else {
            Ok(value)
        }
    }

    /// Checks that `value` is strictly positive.
    pub fn require_positive(field: &'static str, value: Duration) -> Result<Duration, ConfigError> {
        if value.is_zero() {
            Err(ConfigError::ZeroDuration { field })
        } else {
            Ok(value)
        }
    }
}
