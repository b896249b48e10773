//! Attempt bookkeeping for a single retry loop.

// self
use crate::{_prelude::*, config::RetryPolicy};

/// Tracks attempts and backoff progression for one call of a retry wrapper.
///
/// The executor is discarded when the wrapper returns; nothing carries over between calls.
#[derive(Debug)]
pub struct RetryExecutor<'a> {
	policy: &'a RetryPolicy,
	attempts: u32,
	last_delay: Option<Duration>,
}
impl<'a> RetryExecutor<'a> {
	/// Create a new executor respecting the supplied retry policy.
	pub fn new(policy: &'a RetryPolicy) -> Self {
		Self { policy, attempts: 0, last_delay: None }
	}

	/// Count the attempt about to start and return its 1-based number.
	pub fn begin_attempt(&mut self) -> u32 {
		self.attempts = self.attempts.saturating_add(1);

		self.attempts
	}

	/// Number of attempts started so far.
	pub fn attempts_used(&self) -> u32 {
		self.attempts
	}

	/// Whether another attempt fits under the ceiling.
	///
	/// A policy with `max_attempts == 0` still permits the first attempt.
	pub fn can_retry(&self) -> bool {
		self.attempts < self.policy.max_attempts.max(1)
	}

	/// Delay to await before the next attempt, or `None` once the ceiling is reached.
	pub fn next_backoff(&mut self) -> Option<Duration> {
		if !self.can_retry() {
			tracing::debug!(attempt = self.attempts, "retry budget exhausted");

			return None;
		}

		let delay = self.policy.compute_backoff(self.attempts);

		self.last_delay = Some(delay);

		tracing::debug!(attempt = self.attempts + 1, ?delay, "retry backoff computed");

		Some(delay)
	}

	/// Most recent delay handed out by [`RetryExecutor::next_backoff`].
	pub fn last_delay(&self) -> Option<Duration> {
		self.last_delay
	}
}
