use futures::future::join_all;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tower::util::BoxCloneService;
use tower::{service_fn, Layer, ServiceExt};
use tower_fortify_circuitbreaker::{CircuitBreakerLayer, CircuitState};
use tower_fortify_core::{ClassifiedError, Context, ErrorKind, ManualClock};

/// An operation that fails while `down` is set and otherwise parks on `gate`.
#[derive(Clone)]
struct Gated {
    down: Arc<AtomicBool>,
    gate: Arc<Semaphore>,
    calls: Arc<AtomicUsize>,
}

impl Gated {
    fn new() -> Self {
        Self {
            down: Arc::new(AtomicBool::new(true)),
            gate: Arc::new(Semaphore::new(0)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn service(&self) -> BoxCloneService<Context, String, ClassifiedError> {
        let this = self.clone();
        BoxCloneService::new(service_fn(move |_ctx: Context| {
            let this = this.clone();
            this.calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if this.down.load(Ordering::SeqCst) {
                    return Err(ClassifiedError::permanent_unavailable("down"));
                }
                if let Ok(permit) = this.gate.acquire().await {
                    permit.forget();
                }
                Ok("ok".to_string())
            }
        }))
    }

    async fn wait_for_calls(&self, n: usize) {
        while self.calls.load(Ordering::SeqCst) < n {
            tokio::task::yield_now().await;
        }
    }
}

fn breaker(clock: &ManualClock) -> CircuitBreakerLayer {
    CircuitBreakerLayer::handle(ErrorKind::PermanentUnavailable)
        .failure_threshold(1)
        .break_duration(Duration::from_secs(10))
        .clock(clock.clone())
        .build()
        .unwrap()
}

#[tokio::test]
async fn half_open_admits_exactly_one_trial() {
    let clock = ManualClock::new();
    let layer = breaker(&clock);
    let op = Gated::new();
    let service = layer.layer(op.service());

    let _ = service.clone().oneshot(Context::new("x")).await;
    assert_eq!(layer.state(), CircuitState::Open);

    clock.advance(Duration::from_secs(10));
    op.down.store(false, Ordering::SeqCst);

    let trial = tokio::spawn(service.clone().oneshot(Context::new("trial")));
    op.wait_for_calls(2).await;
    assert!(layer.metrics().trial_in_flight);

    let contenders = join_all((0..5).map(|_| service.clone().oneshot(Context::new("y")))).await;
    for result in contenders {
        let err = result.unwrap_err();
        assert!(err.is_circuit_open());
        assert_eq!(err.retry_after(), Some(Duration::ZERO));
    }
    assert_eq!(op.calls.load(Ordering::SeqCst), 2);

    op.gate.add_permits(1);
    assert_eq!(trial.await.unwrap().unwrap(), "ok");
    assert_eq!(layer.state(), CircuitState::Closed);
}

#[tokio::test]
async fn abandoned_trial_frees_the_slot() {
    let clock = ManualClock::new();
    let layer = breaker(&clock);
    let op = Gated::new();
    let service = layer.layer(op.service());

    let _ = service.clone().oneshot(Context::new("x")).await;
    clock.advance(Duration::from_secs(10));
    op.down.store(false, Ordering::SeqCst);

    let trial = tokio::spawn(service.clone().oneshot(Context::new("trial")));
    op.wait_for_calls(2).await;
    trial.abort();
    assert!(trial.await.unwrap_err().is_cancelled());

    assert_eq!(layer.state(), CircuitState::HalfOpen);
    assert!(!layer.metrics().trial_in_flight);

    op.gate.add_permits(1);
    service.clone().oneshot(Context::new("retry")).await.unwrap();
    assert_eq!(layer.state(), CircuitState::Closed);
}

#[tokio::test]
async fn burst_of_failures_breaks_once() {
    let breaks = Arc::new(AtomicUsize::new(0));
    let b = Arc::clone(&breaks);
    let calls = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&calls);

    let layer = CircuitBreakerLayer::handle(ErrorKind::PermanentUnavailable)
        .failure_threshold(5)
        .on_break(move |_, _| {
            b.fetch_add(1, Ordering::SeqCst);
        })
        .build()
        .unwrap();
    let service = layer.layer(service_fn(move |_ctx: Context| {
        c.fetch_add(1, Ordering::SeqCst);
        async { Err::<String, _>(ClassifiedError::permanent_unavailable("down")) }
    }));

    let results = join_all((0..20).map(|_| service.clone().oneshot(Context::new("x")))).await;

    assert!(results.iter().all(|r| r.is_err()));
    assert_eq!(breaks.load(Ordering::SeqCst), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 5);
    assert_eq!(layer.state(), CircuitState::Open);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_successes_keep_the_circuit_closed() {
    let layer = CircuitBreakerLayer::handle(ErrorKind::PermanentUnavailable)
        .failure_threshold(1)
        .build()
        .unwrap();
    let service = layer.layer(service_fn(|ctx: Context| async move {
        Ok::<_, ClassifiedError>(ctx.operation_key().unwrap_or_default().to_string())
    }));

    let handles: Vec<_> = (0..50)
        .map(|i| tokio::spawn(service.clone().oneshot(Context::new(format!("op-{}", i)))))
        .collect();
    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.await.unwrap().unwrap(), format!("op-{}", i));
    }

    assert_eq!(layer.state(), CircuitState::Closed);
}
