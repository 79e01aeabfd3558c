//! A fault-injecting echo service for exercising resilience policies.
//!
//! [`EchoService`] is a `Service<Context, Response = String>` that returns the
//! context's `message` item and can be told to misbehave in the ways a real
//! remote dependency does: latency, periodic transient failures, a transient
//! failure window, an outage, random failures, or a persistent fault.
//!
//! # Fault checks
//!
//! Each call runs the checks below in order; the first that fires decides
//! the failure:
//!
//! 1. Latency (`fixed_delay` / `random_delay`), applied even if the call fails
//! 2. The execution is counted; the first one starts the failure timers
//! 3. Always-fail switch: [`AlwaysFails`](tower_fortify_core::ErrorKind::AlwaysFails)
//! 4. Every n-th execution (`fail_after`): `Transient`
//! 5. Inside the failure window (`fail_for` / `fail_for_random`): `Transient`
//! 6. From the n-th execution on (`system_down_after`): `PermanentUnavailable`
//! 7. Inside the outage window (`system_down_for`): `PermanentUnavailable`
//! 8. Random draw at most `fail_with_probability`: `Transient`
//!
//! Failure windows are measured from the first invocation, not from
//! construction.
//!
//! # Example
//!
//! ```
//! use tower::ServiceExt;
//! use tower_fortify_core::{Context, ErrorKind};
//! use tower_fortify_faults::EchoService;
//!
//! # async fn example() {
//! let svc = EchoService::builder().fail_after(2).build().unwrap();
//!
//! let first = svc.clone().oneshot(Context::new("call").with("message", "hi")).await;
//! let second = svc.clone().oneshot(Context::new("call").with("message", "hi")).await;
//!
//! assert_eq!(first.unwrap(), "hi");
//! assert_eq!(second.unwrap_err().kind(), ErrorKind::Transient);
//! # }
//! ```
//!
//! # Feature flags
//!
//! - `tracing`: log injected faults
//! - `metrics`: `faults_injected_total` counter labelled by kind

mod config;
mod events;
mod service;

pub use config::{DelayRange, EchoConfig, EchoConfigBuilder};
pub use events::EchoEvent;
pub use service::EchoService;
