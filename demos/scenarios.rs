//! Replays the classic resilience scenarios against the unreliable echo service.
//!
//! Run with: cargo run --example scenarios -- <scenario>
//! More detail: RUST_LOG=debug cargo run --example scenarios -- system-down
//!
//! Durations are scaled down: one "second" of the scenario is 20ms of wall time.

use std::time::Duration;
use tower::{Layer, ServiceExt};
use tower_fortify::prelude::*;
use tower_fortify::retry::FnInterval;
use tracing_subscriber::EnvFilter;

const NUM_ITERATIONS: usize = 10;

const SCENARIOS: &[(&str, &str)] = &[
    ("transient", "transient errors with no policy"),
    ("manual-retry", "transient errors with a hand-written retry loop"),
    ("retry", "transient errors with a retry policy"),
    ("long-interruption", "a long outage bridged by exponential backoff"),
    ("system-down", "an expensive call behind a breaker wrapping a retry"),
    ("recovery", "a retry whose callback repairs the service"),
    ("fallback", "recovery and retry with a default message as last resort"),
    ("caching", "an expensive call served from a cache"),
];

/// Scenario time to wall time.
fn secs(n: f64) -> Duration {
    Duration::from_secs_f64(n * 0.02)
}

fn message(i: usize) -> Context {
    Context::new("echo").with("message", format!("Call:{}", i))
}

fn retry_policy(kind: ErrorKind) -> RetryLayer {
    RetryLayer::handle(kind)
        .max_attempts(4)
        .on_retry(|_, n, _| tracing::warn!("Operation failed on {} attempt. Retrying...", n))
        .build()
        .expect("valid retry policy")
}

fn recovery_policy(kind: ErrorKind, echo: &EchoService) -> RetryLayer {
    let echo = echo.clone();
    RetryLayer::handle(kind)
        .max_attempts(4)
        .on_retry(move |_, n, _| {
            tracing::warn!(
                "Operation failed on {} attempt. Executing recovery action...",
                n
            );
            echo.set_always_fail(false);
        })
        .build()
        .expect("valid recovery policy")
}

async fn run_transient() {
    let svc = EchoService::builder()
        .fixed_delay(secs(1.0))
        .fail_after(2)
        .build()
        .expect("valid echo service");

    for i in 0..NUM_ITERATIONS {
        match svc.clone().oneshot(message(i)).await {
            Ok(msg) => tracing::info!("{}", msg),
            Err(err) => tracing::error!(error = %err, "Failed on attempt {}", i),
        }
    }
}

async fn run_manual_retry() {
    let svc = EchoService::builder()
        .fixed_delay(secs(1.0))
        .fail_after(3)
        .build()
        .expect("valid echo service");
    let max_tries = 3;

    for i in 0..NUM_ITERATIONS {
        let mut tries = 0;
        loop {
            match svc.clone().oneshot(message(i)).await {
                Ok(msg) => {
                    tracing::info!("{}", msg);
                    break;
                }
                Err(err) => {
                    tries += 1;
                    if tries >= max_tries {
                        tracing::error!(error = %err, "Failed on attempt {}", i);
                        break;
                    }
                    tracing::warn!("Failed on try {}... Retrying...", tries);
                }
            }
        }
    }
}

async fn run_retry() {
    let svc = EchoService::builder()
        .fixed_delay(secs(1.0))
        .fail_after(2)
        .build()
        .expect("valid echo service");
    let retry = retry_policy(ErrorKind::Transient);

    for i in 0..NUM_ITERATIONS {
        match retry.layer(svc.clone()).oneshot(message(i)).await {
            Ok(msg) => tracing::info!("{}", msg),
            Err(err) => tracing::error!(error = %err, "Failed on attempt {}", i),
        }
    }
}

async fn run_long_interruption() {
    let svc = EchoService::builder()
        .fixed_delay(secs(1.0))
        .fail_for(secs(10.0))
        .build()
        .expect("valid echo service");
    let retry = RetryLayer::handle(ErrorKind::Transient)
        .max_attempts(6)
        .backoff(FnInterval::new(|n| secs(2f64.powi(n as i32 + 1))))
        .on_retry(|_, _, wait| {
            tracing::warn!(
                "Operation failed, waiting {:.0} seconds. Retrying...",
                wait.as_secs_f64() / 0.02
            )
        })
        .build()
        .expect("valid retry policy");

    for i in 0..NUM_ITERATIONS {
        match retry.layer(svc.clone()).oneshot(message(i)).await {
            Ok(msg) => tracing::info!("{}", msg),
            Err(err) => tracing::error!(error = %err, "Failed on attempt {}", i),
        }
    }
}

async fn run_system_down() {
    let svc = EchoService::builder()
        .fixed_delay(secs(5.0))
        .system_down_after(1)
        .build()
        .expect("valid echo service");
    let breaker = CircuitBreakerLayer::handle(ErrorKind::PermanentUnavailable)
        .failure_threshold(1)
        .break_duration(secs(60.0))
        .on_break(|_, duration| tracing::warn!("Circuit broken for {:?}", duration))
        .build()
        .expect("valid breaker");
    let policy = retry_policy(ErrorKind::PermanentUnavailable).wrap(breaker);

    for i in 0..NUM_ITERATIONS {
        match policy.layer(svc.clone()).oneshot(message(i)).await {
            Ok(msg) => tracing::info!("{}", msg),
            Err(err) => tracing::error!(error = %err, "Unable to contact service for attempt {}", i),
        }
    }
}

async fn run_recovery() {
    let svc = EchoService::builder()
        .fixed_delay(secs(1.0))
        .fail_with_probability(0.7)
        .build()
        .expect("valid echo service");
    let policy = recovery_policy(ErrorKind::AlwaysFails, &svc).wrap(retry_policy(ErrorKind::Transient));

    for i in 0..NUM_ITERATIONS {
        svc.set_always_fail(true);
        match policy.layer(svc.clone()).oneshot(message(i)).await {
            Ok(msg) => tracing::info!("{}", msg),
            Err(err) => tracing::error!(error = %err, "Failed to echo message on attempt {}", i),
        }
    }
}

async fn run_fallback() {
    let svc = EchoService::builder()
        .fixed_delay(secs(1.0))
        .fail_with_probability(0.9)
        .build()
        .expect("valid echo service");
    let fallback = FallbackLayer::handle(ErrorKind::Transient)
        .value("Default Message".to_string())
        .build()
        .expect("valid fallback");
    let policy = recovery_policy(ErrorKind::AlwaysFails, &svc)
        .wrap(retry_policy(ErrorKind::Transient))
        .wrap(fallback);

    for i in 0..NUM_ITERATIONS {
        svc.set_always_fail(true);
        match policy.layer(svc.clone()).oneshot(message(i)).await {
            Ok(msg) => tracing::info!("{}", msg),
            Err(err) => tracing::error!(error = %err, "Failed on attempt {}", i),
        }
    }
}

async fn run_caching() {
    let svc = EchoService::builder()
        .fixed_delay(secs(2.0))
        .build()
        .expect("valid echo service");
    let cache = CacheLayer::<String>::builder()
        .ttl(secs(5.0))
        .on_hit(|key| tracing::trace!("[CACHE:{}] - HIT", key))
        .on_miss(|key| tracing::trace!("[CACHE:{}] - MISS", key))
        .on_add(|key| tracing::trace!("[CACHE:{}] - ADD", key))
        .on_error(|key, _| tracing::error!("[CACHE:{}] - ERROR", key.unwrap_or("?")))
        .build()
        .expect("valid cache");

    for i in 0..NUM_ITERATIONS * 3 {
        let ctx = Context::new("EchoCachingMessage").with("message", format!("Call:{}", i));
        match cache.layer(svc.clone()).oneshot(ctx).await {
            Ok(msg) => tracing::info!("{}", msg),
            Err(err) => tracing::error!(error = %err, "Failed on attempt {}", i),
        }
        tokio::time::sleep(secs(0.5)).await;
    }
}

fn usage() {
    eprintln!("usage: scenarios <scenario>\n");
    for (name, about) in SCENARIOS {
        eprintln!("  {:<18} {}", name, about);
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,scenarios=trace")),
        )
        .init();

    let Some(scenario) = std::env::args().nth(1) else {
        usage();
        return;
    };

    match scenario.as_str() {
        "transient" => run_transient().await,
        "manual-retry" => run_manual_retry().await,
        "retry" => run_retry().await,
        "long-interruption" => run_long_interruption().await,
        "system-down" => run_system_down().await,
        "recovery" => run_recovery().await,
        "fallback" => run_fallback().await,
        "caching" => run_caching().await,
        other => {
            eprintln!("unknown scenario '{}'\n", other);
            usage();
        }
    }
}
