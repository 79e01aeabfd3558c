//! Full-chain stress tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::{Layer, ServiceExt};
use tower_fortify_circuitbreaker::CircuitBreakerLayer;
use tower_fortify_core::{Context, ErrorKind, PolicyExt};
use tower_fortify_fallback::FallbackLayer;
use tower_fortify_faults::EchoService;
use tower_fortify_retry::RetryLayer;

/// A chain over a flaky service never surfaces an error to the caller
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
#[ignore]
async fn stress_full_chain_absorbs_every_failure() {
    let fallbacks = Arc::new(AtomicUsize::new(0));
    let f = Arc::clone(&fallbacks);

    let retry = RetryLayer::handle(ErrorKind::Transient)
        .max_attempts(3)
        .build()
        .unwrap();
    let breaker = CircuitBreakerLayer::handle(ErrorKind::Transient)
        .failure_threshold(50)
        .break_duration(Duration::from_millis(5))
        .build()
        .unwrap();
    let fallback = FallbackLayer::handle(ErrorKind::Transient)
        .or(ErrorKind::CircuitOpen)
        .value("fallback".to_string())
        .on_fallback(move |_| {
            f.fetch_add(1, Ordering::Relaxed);
        })
        .build()
        .unwrap();
    let echo = EchoService::builder()
        .fail_with_probability(0.3)
        .seed(42)
        .build()
        .unwrap();
    let service = retry.wrap(breaker).wrap(fallback).layer(echo.clone());

    let start = Instant::now();
    let handles: Vec<_> = (0..20_000)
        .map(|i| tokio::spawn(service.clone().oneshot(Context::new(format!("req-{}", i)))))
        .collect();
    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }

    println!(
        "20k requests in {:?}, {} executions, {} fallbacks",
        start.elapsed(),
        echo.executions(),
        fallbacks.load(Ordering::Relaxed)
    );
    assert!(echo.executions() >= 20_000);
}
