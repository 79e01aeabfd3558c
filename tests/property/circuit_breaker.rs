//! Property tests for the circuit breaker.
//!
//! Invariants tested:
//! - Opens exactly when a run of handled failures reaches the threshold
//! - Never invokes the operation while open
//! - Unhandled failures never open the circuit

use super::{any_operation_kind, error_of};
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tower::{service_fn, Layer, ServiceExt};
use tower_fortify_circuitbreaker::{CircuitBreakerLayer, CircuitState};
use tower_fortify_core::{Context, ErrorKind, ManualClock};

/// Index of the call that opens the circuit, if any.
fn opening_call(outcomes: &[bool], threshold: usize) -> Option<usize> {
    let mut streak = 0;
    for (i, ok) in outcomes.iter().enumerate() {
        if *ok {
            streak = 0;
        } else {
            streak += 1;
            if streak >= threshold {
                return Some(i);
            }
        }
    }
    None
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(30))]

    /// Property: the circuit opens at the first run of `threshold` failures
    /// and no later call reaches the operation
    #[test]
    fn circuit_breaker_opens_on_consecutive_failures(
        threshold in 1usize..=5,
        outcomes in prop::collection::vec(any::<bool>(), 1..40),
    ) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let calls = Arc::new(AtomicUsize::new(0));
            let c = Arc::clone(&calls);
            let layer = CircuitBreakerLayer::handle(ErrorKind::PermanentUnavailable)
                .failure_threshold(threshold)
                .break_duration(Duration::from_secs(60))
                .clock(ManualClock::new())
                .build()
                .unwrap();
            let service = layer.layer(service_fn(move |ctx: Context| {
                c.fetch_add(1, Ordering::SeqCst);
                async move {
                    match ctx.get("ok") {
                        Some("true") => Ok(()),
                        _ => Err(error_of(ErrorKind::PermanentUnavailable)),
                    }
                }
            }));

            let mut rejected = 0;
            for ok in &outcomes {
                let ctx = Context::new("op").with("ok", ok.to_string());
                if let Err(err) = service.clone().oneshot(ctx).await {
                    if err.is_circuit_open() {
                        rejected += 1;
                    }
                }
            }

            match opening_call(&outcomes, threshold) {
                Some(i) => {
                    prop_assert_eq!(layer.state(), CircuitState::Open);
                    prop_assert_eq!(calls.load(Ordering::SeqCst), i + 1);
                    prop_assert_eq!(rejected, outcomes.len() - i - 1);
                }
                None => {
                    prop_assert_eq!(layer.state(), CircuitState::Closed);
                    prop_assert_eq!(calls.load(Ordering::SeqCst), outcomes.len());
                    prop_assert_eq!(rejected, 0);
                }
            }
            Ok(())
        })?;
    }

    /// Property: failures of kinds the breaker does not handle never open it
    #[test]
    fn circuit_breaker_ignores_unhandled_kinds(
        kind in any_operation_kind(),
        calls in 1usize..=30,
    ) {
        prop_assume!(kind != ErrorKind::PermanentUnavailable);

        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let layer = CircuitBreakerLayer::handle(ErrorKind::PermanentUnavailable)
                .failure_threshold(1)
                .build()
                .unwrap();
            let service = layer.layer(service_fn(move |_ctx: Context| async move {
                Err::<(), _>(error_of(kind))
            }));

            for _ in 0..calls {
                let err = service.clone().oneshot(Context::new("op")).await.unwrap_err();
                prop_assert_eq!(err.kind(), kind);
            }

            prop_assert_eq!(layer.state(), CircuitState::Closed);
            prop_assert_eq!(layer.metrics().consecutive_failures, 0);
            Ok(())
        })?;
    }
}
