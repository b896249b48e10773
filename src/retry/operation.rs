//! Exponential-backoff retry wrapper with optional failure classification and cancellation.

// std
use std::{
	convert::Infallible,
	fmt::{Debug, Formatter, Result as FmtResult},
	future::Future,
};
// crates.io
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	clock::{Clock, Sleep, TokioClock},
	config::RetryPolicy,
	metrics::{self, GiveUpReason},
	retry::executor::RetryExecutor,
};

type RetryPredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;
type FailureObserver<E> = Arc<dyn Fn(&AttemptFailure<'_, E>) + Send + Sync>;

/// View of one failed attempt handed to [`RetryingOperation::on_failure`] observers.
#[derive(Debug)]
pub struct AttemptFailure<'a, E> {
	/// 1-based number of the attempt that failed.
	pub attempt: u32,
	/// Failure produced by the operation.
	pub error: &'a E,
	/// Delay before the next attempt; `None` when this failure is final.
	pub next_delay: Option<Duration>,
}

/// Failure returned by [`RetryingOperation::run_cancellable`].
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
	/// Last failure of the operation, unchanged.
	#[error("{0}")]
	Operation(E),
	/// The cancellation token fired before the loop finished.
	#[error("Retry cancelled after {attempts} attempt(s).")]
	Cancelled {
		/// Attempts started before cancellation.
		attempts: u32,
		/// Failure of the most recent attempt, if any ran.
		last_error: Option<E>,
	},
}
impl<E> RetryError<E> {
	/// Whether the loop stopped because of cancellation.
	pub fn is_cancelled(&self) -> bool {
		matches!(self, RetryError::Cancelled { .. })
	}

	/// The operation's own failure, when one was observed.
	pub fn into_operation_error(self) -> Option<E> {
		match self {
			RetryError::Operation(error) => Some(error),
			RetryError::Cancelled { last_error, .. } => last_error,
		}
	}
}

/// Re-invokes a failing asynchronous operation with exponentially growing delays.
///
/// The operation runs at most `max_attempts` times. Delays are only awaited between attempts,
/// and the failure surfaced on exhaustion is exactly the last one observed.
///
/// ```no_run
/// # async fn demo() -> Result<(), std::io::Error> {
/// use stayx_session::RetryingOperation;
///
/// let listings = RetryingOperation::default()
/// 	.retry_if(|err: &std::io::Error| err.kind() != std::io::ErrorKind::PermissionDenied)
/// 	.run(|| async { Ok::<_, std::io::Error>(vec!["villa-12"]) })
/// 	.await?;
/// # let _ = listings;
/// # Ok(())
/// # }
/// ```
pub struct RetryingOperation<E> {
	policy: RetryPolicy,
	clock: Arc<dyn Clock>,
	should_retry: Option<RetryPredicate<E>>,
	on_failure: Option<FailureObserver<E>>,
}
impl<E> RetryingOperation<E> {
	/// Wrapper using `policy` on the tokio clock.
	pub fn new(policy: RetryPolicy) -> Result<Self> {
		policy.validate()?;

		Ok(Self::with_policy(policy))
	}

	fn with_policy(policy: RetryPolicy) -> Self {
		Self { policy, clock: Arc::new(TokioClock), should_retry: None, on_failure: None }
	}

	/// Only retry failures for which `predicate` returns true; others surface immediately.
	pub fn retry_if<P>(mut self, predicate: P) -> Self
	where
		P: Fn(&E) -> bool + Send + Sync + 'static,
	{
		self.should_retry = Some(Arc::new(predicate));

		self
	}

	/// Invoke `observer` after every failed attempt.
	pub fn on_failure<O>(mut self, observer: O) -> Self
	where
		O: Fn(&AttemptFailure<'_, E>) + Send + Sync + 'static,
	{
		self.on_failure = Some(Arc::new(observer));

		self
	}

	/// Await delays on `clock` instead of the tokio timer.
	pub fn clock(mut self, clock: impl Clock) -> Self {
		self.clock = Arc::new(clock);

		self
	}

	/// Policy driving this wrapper.
	pub fn policy(&self) -> &RetryPolicy {
		&self.policy
	}

	/// Run `operation` until it succeeds, fails non-retryably, or exhausts its attempts.
	#[tracing::instrument(skip_all, fields(max_attempts = self.policy.max_attempts))]
	pub async fn run<T, F, Fut>(&self, operation: F) -> std::result::Result<T, E>
	where
		F: FnMut() -> Fut,
		Fut: Future<Output = std::result::Result<T, E>>,
	{
		match self.drive(operation, &Unguarded).await {
			Ok(value) => Ok(value),
			Err(Halt::Failed(error)) => Err(error),
			Err(Halt::Interrupted { interrupt, .. }) => match interrupt {},
		}
	}

	/// Like [`RetryingOperation::run`], but stops early once `cancel` fires.
	///
	/// The token is checked before every attempt and raced against every delay. An attempt
	/// already in flight is not interrupted.
	#[tracing::instrument(skip_all, fields(max_attempts = self.policy.max_attempts))]
	pub async fn run_cancellable<T, F, Fut>(
		&self,
		operation: F,
		cancel: &CancellationToken,
	) -> std::result::Result<T, RetryError<E>>
	where
		F: FnMut() -> Fut,
		Fut: Future<Output = std::result::Result<T, E>>,
	{
		match self.drive(operation, cancel).await {
			Ok(value) => Ok(value),
			Err(Halt::Failed(error)) => Err(RetryError::Operation(error)),
			Err(Halt::Interrupted { attempts, last_error, .. }) => {
				tracing::warn!(attempts, "retry loop cancelled");

				metrics::record_give_up(GiveUpReason::Cancelled);

				Err(RetryError::Cancelled { attempts, last_error })
			},
		}
	}

	async fn drive<T, F, Fut, G>(
		&self,
		mut operation: F,
		guard: &G,
	) -> std::result::Result<T, Halt<E, G::Interrupt>>
	where
		F: FnMut() -> Fut,
		Fut: Future<Output = std::result::Result<T, E>>,
		G: Guard,
	{
		let mut executor = RetryExecutor::new(&self.policy);
		let mut last_error = None;

		loop {
			if let Err(interrupt) = guard.check() {
				return Err(Halt::Interrupted {
					attempts: executor.attempts_used(),
					last_error,
					interrupt,
				});
			}

			let attempt = executor.begin_attempt();
			let error = match operation().await {
				Ok(value) => {
					metrics::record_attempt(true);

					if attempt > 1 {
						tracing::debug!(attempt, "operation succeeded after retrying");
					}

					return Ok(value);
				},
				Err(error) => error,
			};

			metrics::record_attempt(false);

			let Some(delay) = executor.next_backoff() else {
				tracing::warn!(attempt, "retry attempts exhausted");

				self.notify(attempt, &error, None);
				metrics::record_give_up(GiveUpReason::Exhausted);

				return Err(Halt::Failed(error));
			};

			if !self.is_retryable(&error) {
				tracing::warn!(attempt, "failure is not retryable");

				self.notify(attempt, &error, None);
				metrics::record_give_up(GiveUpReason::NonRetryable);

				return Err(Halt::Failed(error));
			}

			tracing::debug!(attempt, ?delay, "attempt failed; backing off");

			self.notify(attempt, &error, Some(delay));
			metrics::record_backoff(delay);

			last_error = Some(error);

			if !delay.is_zero()
				&& let Err(interrupt) = guard.wait(self.clock.sleep(delay)).await
			{
				return Err(Halt::Interrupted { attempts: attempt, last_error, interrupt });
			}
		}
	}

	fn is_retryable(&self, error: &E) -> bool {
		self.should_retry.as_ref().is_none_or(|predicate| predicate(error))
	}

	fn notify(&self, attempt: u32, error: &E, next_delay: Option<Duration>) {
		if let Some(observer) = &self.on_failure {
			observer(&AttemptFailure { attempt, error, next_delay });
		}
	}
}
impl<E> Default for RetryingOperation<E> {
	fn default() -> Self {
		Self::with_policy(RetryPolicy::default())
	}
}
impl<E> Clone for RetryingOperation<E> {
	fn clone(&self) -> Self {
		Self {
			policy: self.policy.clone(),
			clock: self.clock.clone(),
			should_retry: self.should_retry.clone(),
			on_failure: self.on_failure.clone(),
		}
	}
}
impl<E> Debug for RetryingOperation<E> {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.debug_struct("RetryingOperation")
			.field("policy", &self.policy)
			.field("clock", &self.clock)
			.field("should_retry", &self.should_retry.is_some())
			.field("on_failure", &self.on_failure.is_some())
			.finish()
	}
}

enum Halt<E, I> {
	Failed(E),
	Interrupted { attempts: u32, last_error: Option<E>, interrupt: I },
}

// Decides whether the loop may start another attempt or finish a delay.
trait Guard {
	type Interrupt;

	fn check(&self) -> std::result::Result<(), Self::Interrupt>;

	fn wait(&self, sleep: Sleep)
	-> impl Future<Output = std::result::Result<(), Self::Interrupt>> + Send;
}

struct Unguarded;
impl Guard for Unguarded {
	type Interrupt = Infallible;

	fn check(&self) -> std::result::Result<(), Infallible> {
		Ok(())
	}

	async fn wait(&self, sleep: Sleep) -> std::result::Result<(), Infallible> {
		sleep.await;

		Ok(())
	}
}
impl Guard for CancellationToken {
	type Interrupt = ();

	fn check(&self) -> std::result::Result<(), ()> {
		if self.is_cancelled() { Err(()) } else { Ok(()) }
	}

	async fn wait(&self, sleep: Sleep) -> std::result::Result<(), ()> {
		tokio::select! {
			() = sleep => Ok(()),
			() = self.cancelled() => Err(()),
		}
	}
}
