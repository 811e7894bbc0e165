//! Check and await behavior against scripted transports.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use statecheck::{
    equal, present, validate, AwaitContext, FetchError, FetchErrorKind, Mismatch, StatePath,
    Validator, Value,
};
use statecheck_test_utils::assertions::*;
use statecheck_test_utils::{init_test_tracing, ScriptedSource, Step, StreamEnd};
use tokio::time::Instant;

fn counter() -> StatePath {
    StatePath::parse("/counters/state/in-pkts").unwrap()
}

#[tokio::test]
async fn test_check_present_on_absent_value() {
    let source = ScriptedSource::new().with_lookup(Step::Absent);
    let result = present::<u64>(counter()).check(&source).await;

    assert_mismatch(&result);
    assert_eq!(
        result.unwrap_err().to_string(),
        "/counters/state/in-pkts: got no value, want any value"
    );
}

#[tokio::test]
async fn test_check_equal_mismatch() {
    let source = ScriptedSource::returning(5);
    let result = equal(counter(), 6u64).check(&source).await;
    assert_message_contains(&result, "got 5, want 6");
    assert_eq!(source.watches(), 0);
}

#[tokio::test]
async fn test_check_transport_failure_keeps_cause() {
    let source = ScriptedSource::new().with_lookup(Step::Fail(FetchError::unavailable("rpc down")));
    let result = equal(counter(), 6u64).check(&source).await;

    let err = assert_transport_failure(&result, FetchErrorKind::Unavailable);
    assert!(err.validation_err().is_none());
    assert_eq!(err.to_string(), "/counters/state/in-pkts: unavailable: rpc down");
}

#[tokio::test(start_paused = true)]
async fn test_await_passes_on_later_delivery() {
    init_test_tracing();
    let source = ScriptedSource::returning(4)
        .with_updates([Step::value(4), Step::value(5)])
        .spaced_by(Duration::from_millis(50));

    let result = equal(counter(), 5u64)
        .await_for(Duration::from_secs(2), &source)
        .await;
    assert_passed(&result);
    assert_eq!(source.lookups(), 1);
    assert_eq!(source.watches(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_await_passes_after_many_failing_deliveries() {
    let updates = (0..20).map(Step::value).chain([Step::value(100)]);
    let source = ScriptedSource::returning(0).with_updates(updates);

    let result = equal(counter(), 100u64)
        .await_for(Duration::from_secs(1), &source)
        .await;
    assert_passed(&result);
}

#[tokio::test(start_paused = true)]
async fn test_await_deadline_reports_last_value() {
    let source = ScriptedSource::returning(3).with_updates([Step::value(4)]);

    let started = Instant::now();
    let result = equal(counter(), 5u64)
        .await_for(Duration::from_secs(3), &source)
        .await;

    let err = assert_timed_out(&result);
    assert_eq!(err.validation_err().map(Mismatch::message), Some("got 4, want 5"));
    assert_eq!(
        err.to_string(),
        "/counters/state/in-pkts: got 4, want 5 (deadline exceeded)"
    );
    assert!(started.elapsed() >= Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_await_fetch_failure_returns_without_waiting() {
    let source = ScriptedSource::new()
        .with_lookup(Step::Fail(FetchError::unavailable("no session")))
        .with_updates([Step::value(5)]);

    let started = Instant::now();
    let result = equal(counter(), 5u64)
        .await_for(Duration::from_secs(30), &source)
        .await;
    assert_transport_failure(&result, FetchErrorKind::Unavailable);
    assert!(started.elapsed() < Duration::from_millis(1));
    assert_eq!(source.watches(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_await_stream_closed() {
    let source = ScriptedSource::returning(1)
        .with_updates([Step::value(2)])
        .ending(StreamEnd::Close);

    let result = equal(counter(), 5u64)
        .await_for(Duration::from_secs(30), &source)
        .await;
    let err = assert_transport_failure(&result, FetchErrorKind::StreamClosed);
    assert!(!err.is_timeout());
    assert_eq!(err.validation_err().map(Mismatch::message), Some("got 2, want 5"));
}

#[tokio::test(start_paused = true)]
async fn test_await_stream_error_ends_wait() {
    let source = ScriptedSource::returning(1)
        .ending(StreamEnd::Fail(FetchError::unavailable("subscription reset")));

    let result = equal(counter(), 5u64)
        .await_for(Duration::from_secs(30), &source)
        .await;
    assert_transport_failure(&result, FetchErrorKind::Unavailable);
    assert_message_contains(&result, "subscription reset");
}

#[tokio::test(start_paused = true)]
async fn test_await_watch_refused() {
    let source = ScriptedSource::returning(1).failing_watch(FetchError::unavailable("no watch"));

    let result = equal(counter(), 5u64)
        .await_for(Duration::from_secs(30), &source)
        .await;
    let err = assert_transport_failure(&result, FetchErrorKind::Unavailable);
    assert_eq!(err.validation_err().map(Mismatch::message), Some("got 1, want 5"));
}

#[tokio::test(start_paused = true)]
async fn test_await_decode_failure_in_stream() {
    let source = ScriptedSource::returning(1).with_updates([Step::value("fast")]);

    let result = equal(counter(), 5u64)
        .await_for(Duration::from_secs(30), &source)
        .await;
    assert_transport_failure(&result, FetchErrorKind::Decode);
}

#[tokio::test(start_paused = true)]
async fn test_await_for_max_duration_waits_without_deadline() {
    let source = ScriptedSource::returning(4);
    let pending = tokio::time::timeout(
        Duration::from_secs(1),
        equal(counter(), 5u64).await_for(Duration::MAX, &source),
    )
    .await;

    assert!(pending.is_err(), "await ended early: {:?}", pending);
    assert_eq!(source.watches(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_await_for_zero_is_check() {
    let source = ScriptedSource::returning(4).with_updates([Step::value(5)]);
    let vd = equal(counter(), 5u64);

    let awaited = vd.await_for(Duration::ZERO, &source).await;
    let checked = vd.check(&source).await;
    assert_eq!(awaited, checked);
    assert_mismatch(&awaited);
    assert_eq!(source.watches(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_await_until_past_is_check() {
    let source = ScriptedSource::returning(4).with_updates([Step::value(5)]);
    let vd = equal(counter(), 5u64);

    let awaited = vd
        .await_until(Utc::now() - chrono::Duration::seconds(5), &source)
        .await;
    assert_eq!(awaited, vd.check(&source).await);
    assert_eq!(source.watches(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_await_until_future_deadline() {
    let source = ScriptedSource::returning(4)
        .with_updates([Step::value(5)])
        .spaced_by(Duration::from_millis(200));

    let result = equal(counter(), 5u64)
        .await_until(Utc::now() + chrono::Duration::seconds(10), &source)
        .await;
    assert_passed(&result);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_ends_wait() {
    let source = Arc::new(ScriptedSource::returning(4));
    let (handle, ctx) = AwaitContext::cancellable();

    let waiter = {
        let source = Arc::clone(&source);
        tokio::spawn(async move { equal(counter(), 5u64).await_with(&ctx, &source).await })
    };
    tokio::time::sleep(Duration::from_secs(1)).await;
    handle.cancel();

    let result = waiter.await.unwrap();
    let err = assert_transport_failure(&result, FetchErrorKind::Cancelled);
    assert!(!err.is_timeout());
    assert_message_contains(&result, "cancelled");
}

#[tokio::test(start_paused = true)]
async fn test_validate_sees_absent_updates() {
    let source = ScriptedSource::returning(9).with_updates([Step::value(9), Step::Absent]);
    let vd = validate(counter(), |v: &Value<u64>| match v.val() {
        Some(n) => Err(Mismatch::new(format!("got {}, want it cleared", n))),
        None => Ok(()),
    });

    assert_passed(&vd.await_for(Duration::from_secs(1), &source).await);
}

#[tokio::test(start_paused = true)]
async fn test_unresolvable_path_fails_without_fetching_value() {
    let source = ScriptedSource::returning(1);
    let result = equal(statecheck::Query::<u64>::parse("/a/b[c]"), 1u64)
        .await_for(Duration::from_secs(1), &source)
        .await;

    let err = assert_transport_failure(&result, FetchErrorKind::InvalidPath);
    assert!(err.path().starts_with("<unprintable path: "));
}
