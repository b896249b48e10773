//! Injectable time sources for expiry checks and backoff delays.
//!
//! Both the session cache and the retry wrapper read time exclusively through [`Clock`], so
//! tests can swap in a [`ManualClock`] and assert on expiry and delay schedules without real
//! sleeping.

// std
use std::{fmt::Debug, future::Future, pin::Pin};
// crates.io
use parking_lot::Mutex;
// self
use crate::_prelude::*;

/// Boxed future returned by [`Clock::sleep`].
pub type Sleep = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Source of monotonic time and timer futures.
pub trait Clock: Debug + Send + Sync + 'static {
	/// Current monotonic instant.
	fn now(&self) -> Instant;

	/// Future that resolves once `duration` has elapsed on this clock.
	fn sleep(&self, duration: Duration) -> Sleep;
}

/// Default clock backed by the tokio timer.
///
/// Under a paused tokio runtime (`#[tokio::test(start_paused = true)]`) this clock is
/// deterministic as well.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioClock;
impl Clock for TokioClock {
	fn now(&self) -> Instant {
		Instant::now()
	}

	fn sleep(&self, duration: Duration) -> Sleep {
		Box::pin(tokio::time::sleep(duration))
	}
}

/// Hand-driven clock for tests.
///
/// Time only moves through [`ManualClock::advance`] or through [`Clock::sleep`], which advances
/// by the requested duration, records it, and yields once to the scheduler.
#[derive(Clone, Debug)]
pub struct ManualClock {
	inner: Arc<ManualClockInner>,
}
impl ManualClock {
	/// Create a clock anchored at the current instant.
	pub fn new() -> Self {
		Self {
			inner: Arc::new(ManualClockInner {
				origin: Instant::now(),
				offset: Mutex::new(Duration::ZERO),
				sleeps: Mutex::new(Vec::new()),
			}),
		}
	}

	/// Move the clock forward.
	pub fn advance(&self, duration: Duration) {
		let mut offset = self.inner.offset.lock();

		*offset = offset.saturating_add(duration);
	}

	/// Total time advanced since construction.
	pub fn elapsed(&self) -> Duration {
		*self.inner.offset.lock()
	}

	/// Every duration passed to [`Clock::sleep`], in call order.
	pub fn recorded_sleeps(&self) -> Vec<Duration> {
		self.inner.sleeps.lock().clone()
	}
}
impl Default for ManualClock {
	fn default() -> Self {
		Self::new()
	}
}
impl Clock for ManualClock {
	fn now(&self) -> Instant {
		self.inner.origin + *self.inner.offset.lock()
	}

	fn sleep(&self, duration: Duration) -> Sleep {
		self.inner.sleeps.lock().push(duration);
		self.advance(duration);

		Box::pin(tokio::task::yield_now())
	}
}

#[derive(Debug)]
struct ManualClockInner {
	origin: Instant,
	offset: Mutex<Duration>,
	sleeps: Mutex<Vec<Duration>>,
}
