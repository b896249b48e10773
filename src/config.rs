//! Cache and retry configuration with validation.

// std
use std::cell::RefCell;
// crates.io
use rand::{Rng, SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
// self
use crate::_prelude::*;

thread_local! {
	static SMALL_RNG: RefCell<SmallRng> = RefCell::new(SmallRng::from_rng(&mut rand::rng()));
}

/// Default freshness window for cached profiles.
pub const DEFAULT_PROFILE_TTL: Duration = Duration::from_secs(5 * 60);
/// Default bearer token lifetime used by [`crate::SessionCache::put_token_default`].
pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3_600);
/// Default ceiling on operation invocations.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default delay before the first retry.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1_000);

/// Settings for a [`crate::SessionCache`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCacheConfig {
	/// Maximum age of a cached profile before it reads as absent.
	#[serde(default = "default_profile_ttl")]
	pub profile_ttl: Duration,
	/// Lifetime applied when a token is stored without an explicit one.
	#[serde(default = "default_token_lifetime")]
	pub default_token_lifetime: Duration,
}
impl SessionCacheConfig {
	/// Parse and validate a JSON configuration document.
	pub fn from_json(raw: &str) -> Result<Self> {
		let config: Self = serde_json::from_str(raw)?;

		config.validate()?;

		Ok(config)
	}

	/// Override the profile TTL.
	pub fn with_profile_ttl(mut self, ttl: Duration) -> Self {
		self.profile_ttl = ttl;

		self
	}

	/// Override the default token lifetime.
	pub fn with_default_token_lifetime(mut self, lifetime: Duration) -> Self {
		self.default_token_lifetime = lifetime;

		self
	}

	/// Validate invariants for cache configuration.
	pub fn validate(&self) -> Result<()> {
		if self.profile_ttl.is_zero() {
			return Err(Error::Validation {
				field: "profile_ttl",
				reason: "Must be greater than zero.".into(),
			});
		}
		if self.default_token_lifetime.is_zero() {
			return Err(Error::Validation {
				field: "default_token_lifetime",
				reason: "Must be greater than zero.".into(),
			});
		}

		Ok(())
	}
}
impl Default for SessionCacheConfig {
	fn default() -> Self {
		Self { profile_ttl: DEFAULT_PROFILE_TTL, default_token_lifetime: DEFAULT_TOKEN_LIFETIME }
	}
}

/// Supported jitter strategies for retry delays.
#[derive(Clone, Debug, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
	/// Deterministic doubling schedule.
	#[default]
	None,
	/// Randomize each delay within the upper fifth of its computed value.
	Full,
}

/// Retry configuration for [`crate::RetryingOperation`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
	/// Maximum number of times the operation is invoked, including the first call.
	#[serde(default = "default_max_attempts")]
	pub max_attempts: u32,
	/// Delay before the first retry; doubled for every subsequent one.
	#[serde(default = "default_base_delay")]
	pub base_delay: Duration,
	/// Optional upper bound applied to each computed delay.
	#[serde(default)]
	pub max_delay: Option<Duration>,
	/// Strategy used to randomize the computed delay.
	#[serde(default)]
	pub jitter: JitterStrategy,
}
impl RetryPolicy {
	/// Policy with the given attempt ceiling and base delay, no cap and no jitter.
	pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
		Self { max_attempts, base_delay, max_delay: None, jitter: JitterStrategy::None }
	}

	/// Parse and validate a JSON configuration document.
	pub fn from_json(raw: &str) -> Result<Self> {
		let policy: Self = serde_json::from_str(raw)?;

		policy.validate()?;

		Ok(policy)
	}

	/// Cap every computed delay at `max_delay`.
	pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
		self.max_delay = Some(max_delay);

		self
	}

	/// Select the jitter strategy.
	pub fn with_jitter(mut self, jitter: JitterStrategy) -> Self {
		self.jitter = jitter;

		self
	}

	/// Validate invariants for retry configuration.
	pub fn validate(&self) -> Result<()> {
		if self.max_attempts == 0 {
			return Err(Error::Validation {
				field: "retry_policy.max_attempts",
				reason: "Must be at least 1.".into(),
			});
		}
		if let Some(max_delay) = self.max_delay
			&& max_delay < self.base_delay
		{
			return Err(Error::Validation {
				field: "retry_policy.max_delay",
				reason: "Must be greater than or equal to base_delay.".into(),
			});
		}

		Ok(())
	}

	/// Delay awaited before retry number `retry` (1-based): `base_delay × 2^(retry − 1)`.
	pub fn compute_backoff(&self, retry: u32) -> Duration {
		let exponent = retry.saturating_sub(1).min(31);
		let delay = self.base_delay.checked_mul(1 << exponent).unwrap_or(Duration::MAX);
		let bounded = match self.max_delay {
			Some(max_delay) => delay.min(max_delay),
			None => delay,
		};

		self.apply_jitter(bounded)
	}

	fn apply_jitter(&self, bounded: Duration) -> Duration {
		match self.jitter {
			JitterStrategy::None => bounded,
			JitterStrategy::Full => random_within(bounded.mul_f64(0.8), bounded),
		}
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_BASE_DELAY)
	}
}

fn random_within(min: Duration, max: Duration) -> Duration {
	if max <= min {
		return max;
	}
	SMALL_RNG.with(|cell| {
		let mut rng = cell.borrow_mut();
		let nanos = max.as_nanos() - min.as_nanos();
		let jitter = rng.random_range(0..=nanos.min(u64::MAX as u128));

		min + Duration::from_nanos(jitter as u64)
	})
}

fn default_profile_ttl() -> Duration {
	DEFAULT_PROFILE_TTL
}

fn default_token_lifetime() -> Duration {
	DEFAULT_TOKEN_LIFETIME
}

fn default_max_attempts() -> u32 {
	DEFAULT_MAX_ATTEMPTS
}

fn default_base_delay() -> Duration {
	DEFAULT_BASE_DELAY
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn backoff_doubles_from_base_delay() {
		let policy = RetryPolicy::new(5, Duration::from_millis(100));

		assert_eq!(policy.compute_backoff(1), Duration::from_millis(100));
		assert_eq!(policy.compute_backoff(2), Duration::from_millis(200));
		assert_eq!(policy.compute_backoff(3), Duration::from_millis(400));
		assert_eq!(policy.compute_backoff(4), Duration::from_millis(800));
	}

	#[test]
	fn backoff_respects_cap_and_never_overflows() {
		let policy =
			RetryPolicy::new(64, Duration::from_secs(1)).with_max_delay(Duration::from_secs(5));

		assert_eq!(policy.compute_backoff(3), Duration::from_secs(4));
		assert_eq!(policy.compute_backoff(4), Duration::from_secs(5));

		let uncapped = RetryPolicy::new(64, Duration::from_secs(u64::MAX / 2));

		assert_eq!(uncapped.compute_backoff(60), Duration::MAX);
	}

	#[test]
	fn full_jitter_stays_within_upper_fifth() {
		let policy =
			RetryPolicy::new(3, Duration::from_millis(1_000)).with_jitter(JitterStrategy::Full);

		for _ in 0..64 {
			let delay = policy.compute_backoff(2);

			assert!(delay >= Duration::from_millis(1_600) && delay <= Duration::from_millis(2_000));
		}
	}

	#[test]
	fn validation_rejects_zero_attempts_and_inverted_cap() {
		let zero = RetryPolicy::new(0, Duration::from_millis(10));

		assert!(matches!(
			zero.validate(),
			Err(Error::Validation { field: "retry_policy.max_attempts", .. })
		));

		let inverted =
			RetryPolicy::new(3, Duration::from_secs(2)).with_max_delay(Duration::from_secs(1));

		assert!(matches!(
			inverted.validate(),
			Err(Error::Validation { field: "retry_policy.max_delay", .. })
		));
	}

	#[test]
	fn json_documents_fill_in_defaults() {
		let policy = RetryPolicy::from_json(r#"{ "max_attempts": 5 }"#).expect("policy");

		assert_eq!(policy.max_attempts, 5);
		assert_eq!(policy.base_delay, DEFAULT_BASE_DELAY);
		assert_eq!(policy.jitter, JitterStrategy::None);

		let config = SessionCacheConfig::from_json("{}").expect("config");

		assert_eq!(config, SessionCacheConfig::default());
	}

	#[test]
	fn cache_config_rejects_zero_ttl() {
		let raw = r#"{ "profile_ttl": { "secs": 0, "nanos": 0 } }"#;

		assert!(matches!(
			SessionCacheConfig::from_json(raw),
			Err(Error::Validation { field: "profile_ttl", .. })
		));
		assert!(matches!(SessionCacheConfig::from_json("not json"), Err(Error::Serde(_))));
	}
}
