use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;
use tower_fortify_core::{ClassifiedError, ConfigError, Context, ErrorKind, PolicyExt};
use tower_fortify_faults::EchoService;
use tower_fortify_fallback::FallbackLayer;

fn always_failing() -> EchoService {
    EchoService::builder().always_fail(true).build().unwrap()
}

#[tokio::test]
async fn value_replaces_a_handled_failure() {
    let fallback = FallbackLayer::handle(ErrorKind::AlwaysFails)
        .value("cached greeting".to_string())
        .build()
        .unwrap();
    let echo = always_failing();

    let out = fallback
        .execute(Context::new("greet"), move |ctx| echo.clone().oneshot(ctx))
        .await;

    assert_eq!(out.unwrap(), "cached greeting");
}

#[tokio::test]
async fn success_is_returned_untouched() {
    let applied = Arc::new(AtomicUsize::new(0));
    let a = Arc::clone(&applied);
    let fallback = FallbackLayer::handle(ErrorKind::Transient)
        .value("fallback".to_string())
        .on_fallback(move |_| {
            a.fetch_add(1, Ordering::SeqCst);
        })
        .build()
        .unwrap();
    let echo = EchoService::builder().build().unwrap();

    let out = fallback
        .execute(
            Context::new("op").with("message", "real"),
            move |ctx| echo.clone().oneshot(ctx),
        )
        .await;

    assert_eq!(out.unwrap(), "real");
    assert_eq!(applied.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unhandled_failure_propagates() {
    let fallback = FallbackLayer::handle(ErrorKind::Transient)
        .value("fallback".to_string())
        .build()
        .unwrap();
    let echo = always_failing();

    let err = fallback
        .execute(Context::new("op"), move |ctx| echo.clone().oneshot(ctx))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AlwaysFails);
    assert_eq!(err.message(), "always failing");
}

#[tokio::test]
async fn supplier_runs_once_per_fallback() {
    let produced = Arc::new(AtomicUsize::new(0));
    let p = Arc::clone(&produced);
    let fallback = FallbackLayer::handle(ErrorKind::AlwaysFails)
        .supplier(move || format!("default #{}", p.fetch_add(1, Ordering::SeqCst) + 1))
        .build()
        .unwrap();
    let echo = always_failing();

    for expected in ["default #1", "default #2", "default #3"] {
        let echo = echo.clone();
        let out = fallback
            .execute(Context::new("op"), move |ctx| echo.clone().oneshot(ctx))
            .await;
        assert_eq!(out.unwrap(), expected);
    }
    assert_eq!(produced.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn from_error_sees_the_failure() {
    let fallback = FallbackLayer::handle(ErrorKind::CircuitOpen)
        .or(ErrorKind::Transient)
        .from_error(|err: &ClassifiedError| match err.retry_after() {
            Some(wait) => format!("busy, retry in {}s", wait.as_secs()),
            None => format!("degraded: {}", err.kind().as_str()),
        })
        .build()
        .unwrap();

    let open = fallback
        .execute(Context::new("op"), |_ctx| async {
            Err::<String, _>(ClassifiedError::circuit_open("db", Duration::from_secs(7)))
        })
        .await;
    assert_eq!(open.unwrap(), "busy, retry in 7s");

    let transient = fallback
        .execute(Context::new("op"), |_ctx| async {
            Err::<String, _>(ClassifiedError::transient("blip"))
        })
        .await;
    assert_eq!(
        transient.unwrap(),
        format!("degraded: {}", ErrorKind::Transient.as_str())
    );
}

#[tokio::test]
async fn on_fallback_receives_the_absorbed_error() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = Arc::clone(&seen);
    let fallback = FallbackLayer::handle(ErrorKind::AlwaysFails)
        .value(0u32)
        .name("counter")
        .on_fallback(move |err| s.lock().unwrap().push(err.kind()))
        .build()
        .unwrap();
    assert_eq!(fallback.config().name(), "counter");

    let out = fallback
        .execute(Context::new("op"), |_ctx| async {
            Err::<u32, _>(ClassifiedError::always_fails("nope"))
        })
        .await;

    assert_eq!(out.unwrap(), 0);
    assert_eq!(*seen.lock().unwrap(), vec![ErrorKind::AlwaysFails]);
}

#[test]
fn missing_strategy_is_a_config_error() {
    let err = FallbackLayer::<String>::handle(ErrorKind::Transient)
        .build()
        .unwrap_err();
    assert_eq!(err, ConfigError::Missing { field: "supplier" });
}
