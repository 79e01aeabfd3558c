use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;
use tower_fortify_core::{ClassifiedError, Context, ErrorKind, PolicyExt, RecordingSleeper};
use tower_fortify_faults::EchoService;
use tower_fortify_retry::{
    ExponentialBackoff, ExponentialRandomBackoff, FnInterval, IntervalFunction, RetryLayer,
};

async fn run_failing(retry: &RetryLayer) -> Result<String, ClassifiedError> {
    let svc = EchoService::builder().fail_after(1).build().unwrap();
    retry
        .execute(Context::new("op"), move |ctx| svc.clone().oneshot(ctx))
        .await
}

#[tokio::test]
async fn fixed_backoff_waits_between_attempts_only() {
    let sleeper = RecordingSleeper::new();
    let retry = RetryLayer::handle(ErrorKind::Transient)
        .max_attempts(4)
        .fixed_backoff(Duration::from_millis(25))
        .sleeper(sleeper.clone())
        .build()
        .unwrap();

    run_failing(&retry).await.unwrap_err();

    assert_eq!(sleeper.calls(), vec![Duration::from_millis(25); 3]);
}

#[tokio::test]
async fn exponential_backoff_doubles() {
    let sleeper = RecordingSleeper::new();
    let retry = RetryLayer::handle(ErrorKind::Transient)
        .max_attempts(5)
        .exponential_backoff(Duration::from_millis(100))
        .sleeper(sleeper.clone())
        .build()
        .unwrap();

    run_failing(&retry).await.unwrap_err();

    let expected: Vec<_> = [100, 200, 400, 800]
        .into_iter()
        .map(Duration::from_millis)
        .collect();
    assert_eq!(sleeper.calls(), expected);
    assert_eq!(sleeper.total(), Duration::from_millis(1500));
}

#[tokio::test]
async fn capped_backoff_levels_off() {
    let sleeper = RecordingSleeper::new();
    let retry = RetryLayer::handle(ErrorKind::Transient)
        .max_attempts(6)
        .backoff(
            ExponentialBackoff::new(Duration::from_secs(1))
                .multiplier(3.0)
                .max_interval(Duration::from_secs(10)),
        )
        .sleeper(sleeper.clone())
        .build()
        .unwrap();

    run_failing(&retry).await.unwrap_err();

    let expected: Vec<_> = [1, 3, 9, 10, 10]
        .into_iter()
        .map(Duration::from_secs)
        .collect();
    assert_eq!(sleeper.calls(), expected);
}

#[tokio::test]
async fn seeded_random_backoff_is_reproducible() {
    let schedule = |seed| {
        let backoff = ExponentialRandomBackoff::new(Duration::from_millis(100), 0.5).seed(seed);
        (0..5).map(|n| backoff.next_interval(n)).collect::<Vec<_>>()
    };

    assert_eq!(schedule(9), schedule(9));
    for (n, delay) in schedule(9).into_iter().enumerate() {
        let base = 100.0 * 2f64.powi(n as i32);
        let ms = delay.as_secs_f64() * 1000.0;
        assert!(ms >= base * 0.5 - 1e-6 && ms <= base * 1.5 + 1e-6, "{} outside range", ms);
    }
}

#[tokio::test]
async fn custom_interval_sees_zero_based_index() {
    let indexes = Arc::new(Mutex::new(Vec::new()));
    let i = Arc::clone(&indexes);
    let sleeper = RecordingSleeper::new();
    let retry = RetryLayer::handle(ErrorKind::Transient)
        .max_attempts(3)
        .backoff(FnInterval::new(move |n| {
            i.lock().unwrap().push(n);
            Duration::from_millis(n as u64 * 7)
        }))
        .sleeper(sleeper.clone())
        .build()
        .unwrap();

    run_failing(&retry).await.unwrap_err();

    assert_eq!(*indexes.lock().unwrap(), vec![0, 1]);
    assert_eq!(
        sleeper.calls(),
        vec![Duration::ZERO, Duration::from_millis(7)]
    );
}

#[tokio::test(start_paused = true)]
async fn default_sleeper_follows_tokio_time() {
    let retry = RetryLayer::handle(ErrorKind::Transient)
        .max_attempts(3)
        .fixed_backoff(Duration::from_secs(5))
        .build()
        .unwrap();

    let start = tokio::time::Instant::now();
    run_failing(&retry).await.unwrap_err();
    assert!(start.elapsed() >= Duration::from_secs(10));
}
