use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use ragkit_core::error::Error;
use ragkit_core::retry::{ResilientCaller, RetryPolicy};
use tokio::time::Instant;

fn policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy { max_attempts, initial_delay: Duration::from_secs(1), call_timeout: None }
}

#[tokio::test(start_paused = true)]
async fn transient_failures_then_success_backs_off_exponentially() {
    let caller = ResilientCaller::new(policy(4));
    let calls = AtomicU32::new(0);
    let started = Instant::now();
    let seen = Mutex::new(Vec::new());

    let value = caller
        .execute("flaky", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            seen.lock().unwrap().push(started.elapsed());
            async move { if n < 2 { Err(Error::Transient("rate limited".into())) } else { Ok(42) } }
        })
        .await
        .expect("succeeds on third attempt");

    assert_eq!(value, 42);
    assert_eq!(calls.load(Ordering::SeqCst), 3, "k failures + 1 success");
    let seen = seen.lock().unwrap();
    // Delays 1s then 2s: attempts start at t=0, t=1, t=3.
    assert_eq!(*seen, vec![Duration::ZERO, Duration::from_secs(1), Duration::from_secs(3)]);
}

#[tokio::test(start_paused = true)]
async fn always_transient_is_invoked_max_attempts_times() {
    let caller = ResilientCaller::new(policy(3));
    let calls = AtomicU32::new(0);
    let started = Instant::now();

    let err = caller
        .execute("embed", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(Error::Transient("503".into())) }
        })
        .await
        .unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(started.elapsed(), Duration::from_secs(3), "slept 1s + 2s, none after the last attempt");
    match err {
        Error::RetriesExhausted { attempts, source, .. } => {
            assert_eq!(attempts, 3);
            assert!(matches!(*source, Error::Transient(ref m) if m == "503"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn permanent_failure_aborts_immediately() {
    let caller = ResilientCaller::new(policy(5));
    let calls = AtomicU32::new(0);

    let err = caller
        .execute("generate", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(Error::Permanent("401 invalid api key".into())) }
        })
        .await
        .unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(matches!(err, Error::Permanent(_)));
}

#[tokio::test(start_paused = true)]
async fn timeout_counts_as_transient() {
    let caller = ResilientCaller::new(RetryPolicy {
        max_attempts: 2,
        initial_delay: Duration::from_millis(10),
        call_timeout: Some(Duration::from_millis(50)),
    });
    let calls = AtomicU32::new(0);

    let value = caller
        .execute("search", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 { tokio::time::sleep(Duration::from_secs(60)).await; }
                Ok::<_, Error>("done")
            }
        })
        .await
        .expect("second attempt within timeout");

    assert_eq!(value, "done");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn default_policy_delays_are_one_two_four() {
    let p = RetryPolicy::default();
    assert_eq!(p.max_attempts, 3);
    assert_eq!(p.delay_after(1), Duration::from_secs(1));
    assert_eq!(p.delay_after(2), Duration::from_secs(2));
    assert_eq!(p.delay_after(3), Duration::from_secs(4));
}
