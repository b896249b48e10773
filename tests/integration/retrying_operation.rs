//! Retry wrapper timing and its use around provider calls.

// std
use std::{
	sync::{
		Arc,
		atomic::{AtomicU32, Ordering},
	},
	time::Duration,
};
// crates.io
use stayx_session::{
	CancellationToken, ManualClock, Profile, RetryError, RetryPolicy, RetryingOperation,
	SessionCache,
};
use tokio::time::Instant;

#[derive(Debug, PartialEq, Eq)]
enum ProviderError {
	Unavailable,
	InvalidCredentials,
}

fn assert_close(actual: Duration, expected: Duration) {
	assert!(
		actual >= expected && actual < expected + Duration::from_millis(2),
		"expected ~{expected:?}, got {actual:?}"
	);
}

#[tokio::test(start_paused = true)]
async fn delays_double_between_attempts() {
	let _ = tracing_subscriber::fmt::try_init();

	let started = Instant::now();
	let stamps = Arc::new(parking_lot::Mutex::new(Vec::new()));
	let sink = stamps.clone();
	let result: Result<(), ProviderError> = RetryingOperation::default()
		.run(|| {
			sink.lock().push(started.elapsed());

			async { Err(ProviderError::Unavailable) }
		})
		.await;

	assert_eq!(result, Err(ProviderError::Unavailable));

	let stamps = stamps.lock().clone();

	assert_eq!(stamps.len(), 3);
	assert_close(stamps[1] - stamps[0], Duration::from_millis(1_000));
	assert_close(stamps[2] - stamps[1], Duration::from_millis(2_000));
	// No delay follows the final attempt.
	assert_close(started.elapsed(), Duration::from_millis(3_000));
}

#[tokio::test]
async fn token_fetch_is_retried_then_cached() {
	let _ = tracing_subscriber::fmt::try_init();

	let clock = ManualClock::new();
	let cache = SessionCache::builder().clock(clock.clone()).build().expect("cache");
	let calls = AtomicU32::new(0);
	let retrying = RetryingOperation::new(RetryPolicy::new(4, Duration::from_millis(250)))
		.expect("policy")
		.retry_if(|err: &ProviderError| *err == ProviderError::Unavailable)
		.clock(clock.clone());
	let token = retrying
		.run(|| {
			let n = calls.fetch_add(1, Ordering::SeqCst) + 1;

			async move {
				if n < 3 { Err(ProviderError::Unavailable) } else { Ok(format!("bearer-{n}")) }
			}
		})
		.await
		.expect("third attempt succeeds");

	cache.put_token_default("u1", token);
	cache.put_profile("u1", Profile::default().with_email("u1@example.com"));

	assert_eq!(calls.load(Ordering::SeqCst), 3);
	assert_eq!(
		clock.recorded_sleeps(),
		vec![Duration::from_millis(250), Duration::from_millis(500)]
	);
	assert_eq!(cache.get_token("u1").as_deref(), Some("bearer-3"));
}

#[tokio::test]
async fn credential_errors_are_not_retried() {
	let _ = tracing_subscriber::fmt::try_init();

	let clock = ManualClock::new();
	let calls = AtomicU32::new(0);
	let result: Result<String, _> = RetryingOperation::default()
		.retry_if(|err: &ProviderError| *err == ProviderError::Unavailable)
		.clock(clock.clone())
		.run(|| {
			calls.fetch_add(1, Ordering::SeqCst);

			async { Err(ProviderError::InvalidCredentials) }
		})
		.await;

	assert_eq!(result, Err(ProviderError::InvalidCredentials));
	assert_eq!(calls.load(Ordering::SeqCst), 1);
	assert!(clock.recorded_sleeps().is_empty());
}

#[tokio::test]
async fn cancellable_run_passes_operation_errors_through() {
	let _ = tracing_subscriber::fmt::try_init();

	let clock = ManualClock::new();
	let cancel = CancellationToken::new();
	let retrying = RetryingOperation::new(RetryPolicy::new(2, Duration::from_millis(10)))
		.expect("policy")
		.clock(clock);
	let result: Result<(), _> = retrying
		.run_cancellable(|| async { Err(ProviderError::Unavailable) }, &cancel)
		.await;

	match result {
		Err(err @ RetryError::Operation(_)) => {
			assert!(!err.is_cancelled());
			assert_eq!(err.into_operation_error(), Some(ProviderError::Unavailable));
		},
		other => panic!("expected operation error, got {other:?}"),
	}
}
