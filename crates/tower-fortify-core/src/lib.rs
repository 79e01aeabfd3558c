//! Core infrastructure for tower-fortify.
//!
//! This crate provides what every tower-fortify policy shares:
//! - The failure taxonomy ([`ErrorKind`], [`ClassifiedError`], [`HandledKinds`])
//! - The per-call [`Context`]
//! - Injectable time ([`Clock`], [`Sleeper`])
//! - Event listeners for observer callbacks
//! - Policy composition ([`PolicyWrap`], [`PolicyExt`])

pub mod context;
pub mod error;
pub mod events;
pub mod policy;
pub mod time;

pub use context::Context;
pub use error::{ClassifiedError, ConfigError, ErrorKind, HandledKinds, Outcome};
pub use events::{EventListener, EventListeners, FnListener, PolicyEvent};
pub use policy::{wrap, PolicyExt, PolicyWrap};
pub use time::{
    Clock, Instant, ManualClock, RecordingSleeper, SharedClock, SharedSleeper, Sleeper,
    TokioClock, TokioSleeper,
};
