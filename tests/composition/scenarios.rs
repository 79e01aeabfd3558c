use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::{Layer, ServiceExt};
use tower_fortify_cache::CacheLayer;
use tower_fortify_circuitbreaker::{CircuitBreakerLayer, CircuitState};
use tower_fortify_core::{Context, ErrorKind, ManualClock, PolicyExt, RecordingSleeper};
use tower_fortify_fallback::FallbackLayer;
use tower_fortify_faults::EchoService;
use tower_fortify_retry::RetryLayer;

#[tokio::test]
async fn long_interruption_is_bridged_by_exponential_backoff() {
    let clock = ManualClock::new();
    let sleeper = RecordingSleeper::with_clock(clock.clone());
    let echo = EchoService::builder()
        .fail_for(Duration::from_secs(1))
        .clock(clock.clone())
        .build()
        .unwrap();
    let retry = RetryLayer::handle(ErrorKind::Transient)
        .max_attempts(6)
        .exponential_backoff(Duration::from_millis(100))
        .sleeper(sleeper.clone())
        .build()
        .unwrap();

    let out = retry.layer(echo.clone()).oneshot(Context::new("ping")).await;

    assert_eq!(out.unwrap(), "ping");
    assert_eq!(echo.executions(), 5);
    assert_eq!(sleeper.total(), Duration::from_millis(1500));
}

#[tokio::test]
async fn outage_is_broken_then_served_by_fallback() {
    let clock = ManualClock::new();
    let retry = RetryLayer::handle(ErrorKind::Transient)
        .max_attempts(3)
        .build()
        .unwrap();
    let breaker = CircuitBreakerLayer::handle(ErrorKind::PermanentUnavailable)
        .failure_threshold(1)
        .break_duration(Duration::from_secs(5))
        .clock(clock.clone())
        .build()
        .unwrap();
    let fallback = FallbackLayer::handle(ErrorKind::CircuitOpen)
        .or(ErrorKind::PermanentUnavailable)
        .value("offline".to_string())
        .build()
        .unwrap();
    let echo = EchoService::builder().system_down_after(2).build().unwrap();
    let service = retry
        .wrap(breaker.clone())
        .wrap(fallback)
        .layer(echo.clone());

    let replies = [
        service.clone().oneshot(Context::new("one")).await.unwrap(),
        service.clone().oneshot(Context::new("two")).await.unwrap(),
        service.clone().oneshot(Context::new("three")).await.unwrap(),
    ];

    assert_eq!(replies, ["one", "offline", "offline"].map(String::from));
    assert_eq!(echo.executions(), 2);
    assert_eq!(breaker.state(), CircuitState::Open);
}

#[tokio::test]
async fn recovery_action_then_fallback_as_last_resort() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let l = Arc::clone(&log);
    let echo = EchoService::builder().always_fail(true).build().unwrap();

    // The recovery action only works once: the second outage is absorbed.
    let switch = echo.clone();
    let used = AtomicBool::new(false);
    let retry = RetryLayer::handle(ErrorKind::AlwaysFails)
        .max_attempts(2)
        .on_retry(move |_, attempt, _| {
            l.lock().unwrap().push(attempt);
            if !used.swap(true, Ordering::SeqCst) {
                switch.set_always_fail(false);
            }
        })
        .build()
        .unwrap();
    let fallback = FallbackLayer::handle(ErrorKind::AlwaysFails)
        .value("default".to_string())
        .build()
        .unwrap();
    let service = retry.wrap(fallback).layer(echo.clone());

    let first = service.clone().oneshot(Context::new("a")).await.unwrap();
    echo.set_always_fail(true);
    let second = service.clone().oneshot(Context::new("b")).await.unwrap();

    assert_eq!(first, "a");
    assert_eq!(second, "default");
    assert_eq!(echo.executions(), 4);
    assert_eq!(*log.lock().unwrap(), vec![1, 1]);
}

#[tokio::test]
async fn cache_outside_retry_stores_the_retried_result() {
    let cache = CacheLayer::<String>::builder()
        .ttl(Duration::from_secs(60))
        .build()
        .unwrap();
    let retry = RetryLayer::handle(ErrorKind::Transient)
        .max_attempts(3)
        .build()
        .unwrap();
    // Even executions fail.
    let echo = EchoService::builder().fail_after(2).build().unwrap();
    let service = retry.wrap(cache).layer(echo.clone());

    for key in ["a", "b", "a", "b"] {
        let out = service.clone().oneshot(Context::new(key)).await.unwrap();
        assert_eq!(out, key);
    }

    // a: 1. b: 2 fails, 3 succeeds. Both cached afterwards.
    assert_eq!(echo.executions(), 3);
}

#[tokio::test]
async fn unhandled_kind_crosses_the_whole_chain() {
    let retry = RetryLayer::handle(ErrorKind::Transient).build().unwrap();
    let breaker = CircuitBreakerLayer::handle(ErrorKind::PermanentUnavailable)
        .failure_threshold(1)
        .build()
        .unwrap();
    let fallback = FallbackLayer::handle(ErrorKind::CircuitOpen)
        .value(String::new())
        .build()
        .unwrap();
    let echo = EchoService::builder().always_fail(true).build().unwrap();

    let err = retry
        .wrap(breaker.clone())
        .wrap(fallback)
        .layer(echo.clone())
        .oneshot(Context::new("x"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AlwaysFails);
    assert_eq!(echo.executions(), 1);
    assert_eq!(breaker.state(), CircuitState::Closed);
}
