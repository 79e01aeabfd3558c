use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::{Layer, ServiceBuilder, ServiceExt};
use tower_fortify_circuitbreaker::{CircuitBreakerLayer, CircuitState};
use tower_fortify_core::{wrap, Context, ErrorKind, PolicyExt};
use tower_fortify_faults::EchoService;
use tower_fortify_retry::RetryLayer;

fn down_service() -> EchoService {
    EchoService::builder().system_down_after(1).build().unwrap()
}

fn retry(attempts: usize) -> RetryLayer {
    RetryLayer::handle(ErrorKind::PermanentUnavailable)
        .max_attempts(attempts)
        .build()
        .unwrap()
}

fn counting_breaker(threshold: usize, failures: &Arc<AtomicUsize>) -> CircuitBreakerLayer {
    let f = Arc::clone(failures);
    CircuitBreakerLayer::handle(ErrorKind::PermanentUnavailable)
        .failure_threshold(threshold)
        .break_duration(Duration::from_secs(60))
        .on_break(move |_, _| {
            f.fetch_add(1, Ordering::SeqCst);
        })
        .build()
        .unwrap()
}

#[tokio::test]
async fn breaker_around_retry_counts_one_failure_per_exhaustion() {
    let breaks = Arc::new(AtomicUsize::new(0));
    let breaker = counting_breaker(1, &breaks);
    let policy = retry(3).wrap(breaker.clone());
    let echo = down_service();

    let first = policy
        .execute(Context::new("op"), {
            let echo = echo.clone();
            move |ctx| echo.clone().oneshot(ctx)
        })
        .await
        .unwrap_err();

    assert_eq!(first.kind(), ErrorKind::PermanentUnavailable);
    assert_eq!(echo.executions(), 3);
    assert_eq!(breaks.load(Ordering::SeqCst), 1);
    assert_eq!(breaker.state(), CircuitState::Open);

    let second = policy
        .execute(Context::new("op"), {
            let echo = echo.clone();
            move |ctx| echo.clone().oneshot(ctx)
        })
        .await
        .unwrap_err();

    assert!(second.is_circuit_open());
    assert_eq!(echo.executions(), 3);
}

#[tokio::test]
async fn breaker_threshold_counts_exhaustions_not_invocations() {
    let breaks = Arc::new(AtomicUsize::new(0));
    let breaker = counting_breaker(2, &breaks);
    let policy = retry(3).wrap(breaker.clone());
    let echo = down_service();

    let _ = policy
        .execute(Context::new("op"), {
            let echo = echo.clone();
            move |ctx| echo.clone().oneshot(ctx)
        })
        .await;
    assert_eq!(echo.executions(), 3);
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.metrics().consecutive_failures, 1);

    let _ = policy
        .execute(Context::new("op"), {
            let echo = echo.clone();
            move |ctx| echo.clone().oneshot(ctx)
        })
        .await;
    assert_eq!(echo.executions(), 6);
    assert_eq!(breaker.state(), CircuitState::Open);
}

#[tokio::test]
async fn retry_around_breaker_sees_fast_failures() {
    let breaks = Arc::new(AtomicUsize::new(0));
    let breaker = counting_breaker(1, &breaks);
    let attempts = Arc::new(AtomicUsize::new(0));
    let a = Arc::clone(&attempts);
    let retry = RetryLayer::handle(ErrorKind::PermanentUnavailable)
        .or(ErrorKind::CircuitOpen)
        .max_attempts(3)
        .on_exhausted(move |_, n| {
            a.store(n, Ordering::SeqCst);
        })
        .build()
        .unwrap();
    let echo = down_service();

    let err = breaker
        .clone()
        .wrap(retry)
        .execute(Context::new("op"), {
            let echo = echo.clone();
            move |ctx| echo.clone().oneshot(ctx)
        })
        .await
        .unwrap_err();

    assert!(err.is_circuit_open());
    assert_eq!(echo.executions(), 1);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert_eq!(breaks.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn retry_that_ignores_circuit_open_stops_at_the_breaker() {
    let breaks = Arc::new(AtomicUsize::new(0));
    let breaker = counting_breaker(1, &breaks);
    let echo = down_service();

    let err = breaker
        .wrap(retry(3))
        .execute(Context::new("op"), {
            let echo = echo.clone();
            move |ctx| echo.clone().oneshot(ctx)
        })
        .await
        .unwrap_err();

    assert!(err.is_circuit_open());
    assert_eq!(echo.executions(), 1);
}

#[tokio::test]
async fn free_function_and_service_builder_agree_with_wrap() {
    let echo = down_service();

    let breaks = Arc::new(AtomicUsize::new(0));
    let breaker = counting_breaker(1, &breaks);
    let via_fn = wrap(breaker.clone(), retry(3));
    let _ = via_fn
        .execute(Context::new("op"), {
            let echo = echo.clone();
            move |ctx| echo.clone().oneshot(ctx)
        })
        .await;
    assert_eq!(echo.executions(), 3);
    assert_eq!(breaker.state(), CircuitState::Open);

    let echo = down_service();
    let breaker = counting_breaker(1, &breaks);
    // The first layer added to a ServiceBuilder is the outermost.
    let service = ServiceBuilder::new()
        .layer(breaker.clone())
        .layer(retry(3))
        .service(echo.clone());
    let _ = service.oneshot(Context::new("op")).await;
    assert_eq!(echo.executions(), 3);
    assert_eq!(breaker.state(), CircuitState::Open);
    assert_eq!(breaks.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn wrapped_chain_keeps_state_between_executions() {
    let breaks = Arc::new(AtomicUsize::new(0));
    let breaker = counting_breaker(2, &breaks);
    let policy = retry(1).wrap(breaker.clone());
    let echo = down_service();
    let service = policy.layer(echo.clone());

    let _ = service.clone().oneshot(Context::new("a")).await;
    let _ = service.clone().oneshot(Context::new("b")).await;
    let err = service.oneshot(Context::new("c")).await.unwrap_err();

    assert!(err.is_circuit_open());
    assert_eq!(echo.executions(), 2);
}
