//! Session cache memoizing profiles and bearer tokens under independent TTLs.

// std
use std::collections::HashMap;
// crates.io
use parking_lot::Mutex;
use serde::Serialize;
// self
use crate::{
	_prelude::*,
	cache::entry::{CachedProfile, CachedToken, Profile, ProfilePatch},
	clock::{Clock, TokioClock},
	config::SessionCacheConfig,
	metrics::{self, CacheMetrics, CacheMetricsSnapshot, EntryKind},
};

/// In-memory, time-boxed cache of user profiles and tokens.
///
/// Expired entries are evicted lazily by the read that observes them; there is no background
/// sweep. Each map sits behind its own mutex, and operations that touch both maps lock
/// profiles before tokens. Clones share the same underlying maps.
#[derive(Clone, Debug)]
pub struct SessionCache {
	config: Arc<SessionCacheConfig>,
	clock: Arc<dyn Clock>,
	profiles: Arc<Mutex<HashMap<String, CachedProfile>>>,
	tokens: Arc<Mutex<HashMap<String, CachedToken>>>,
	metrics: Arc<CacheMetrics>,
}
impl SessionCache {
	/// Cache with default TTLs on the tokio clock.
	pub fn new() -> Self {
		Self::with_parts(SessionCacheConfig::default(), Arc::new(TokioClock))
	}

	/// Create a [`SessionCacheBuilder`] for custom TTLs or clocks.
	pub fn builder() -> SessionCacheBuilder {
		SessionCacheBuilder::default()
	}

	fn with_parts(config: SessionCacheConfig, clock: Arc<dyn Clock>) -> Self {
		Self {
			config: Arc::new(config),
			clock,
			profiles: Arc::new(Mutex::new(HashMap::new())),
			tokens: Arc::new(Mutex::new(HashMap::new())),
			metrics: CacheMetrics::new(),
		}
	}

	/// Active configuration.
	pub fn config(&self) -> &SessionCacheConfig {
		&self.config
	}

	/// Insert or overwrite the profile for `user_id`, stamping the current time.
	pub fn put_profile(&self, user_id: impl Into<String>, profile: Profile) {
		let user_id = user_id.into();
		let entry = CachedProfile::new(user_id.clone(), profile, self.clock.now());

		tracing::debug!(user_id = %user_id, "profile cached");

		self.profiles.lock().insert(user_id, entry);
	}

	/// Return the cached profile when it is younger than the profile TTL.
	///
	/// A stale entry is removed by this call and reported as absent.
	pub fn get_profile(&self, user_id: &str) -> Option<CachedProfile> {
		let now = self.clock.now();
		let ttl = self.config.profile_ttl;
		let mut profiles = self.profiles.lock();
		let lookup =
			profiles.get(user_id).map(|entry| entry.is_fresh(now, ttl).then(|| entry.clone()));

		match lookup {
			Some(Some(entry)) => {
				drop(profiles);
				self.observe_hit(EntryKind::Profile, user_id);

				Some(entry)
			},
			Some(None) => {
				profiles.remove(user_id);
				drop(profiles);
				self.observe_eviction(EntryKind::Profile, user_id, 1);
				self.observe_miss(EntryKind::Profile, user_id);

				None
			},
			None => {
				drop(profiles);
				self.observe_miss(EntryKind::Profile, user_id);

				None
			},
		}
	}

	/// Merge `patch` into a live entry and reset its age.
	///
	/// Returns `false` without creating anything when no live entry exists. An entry that has
	/// already expired is evicted and treated as missing.
	pub fn update_profile(&self, user_id: &str, patch: &ProfilePatch) -> bool {
		let now = self.clock.now();
		let ttl = self.config.profile_ttl;
		let mut profiles = self.profiles.lock();
		let Some(entry) = profiles.get_mut(user_id) else {
			return false;
		};

		if !entry.is_fresh(now, ttl) {
			profiles.remove(user_id);
			drop(profiles);
			self.observe_eviction(EntryKind::Profile, user_id, 1);

			return false;
		}

		patch.apply(&mut entry.profile);
		entry.inserted_at = now;

		tracing::debug!(user_id = %user_id, "profile updated");

		true
	}

	/// Insert or overwrite the token for `user_id`, expiring `lifetime` from now.
	pub fn put_token(
		&self,
		user_id: impl Into<String>,
		token: impl Into<String>,
		lifetime: Duration,
	) {
		let user_id = user_id.into();
		let entry = CachedToken::new(user_id.clone(), token.into(), self.clock.now(), lifetime);

		tracing::debug!(user_id = %user_id, ?lifetime, "token cached");

		self.tokens.lock().insert(user_id, entry);
	}

	/// [`SessionCache::put_token`] with the configured default lifetime.
	pub fn put_token_default(&self, user_id: impl Into<String>, token: impl Into<String>) {
		self.put_token(user_id, token, self.config.default_token_lifetime);
	}

	/// Return the token while it has not yet expired.
	///
	/// An expired entry is removed by this call and reported as absent.
	pub fn get_token(&self, user_id: &str) -> Option<String> {
		let now = self.clock.now();
		let mut tokens = self.tokens.lock();
		let lookup = tokens
			.get(user_id)
			.map(|entry| (!entry.is_expired(now)).then(|| entry.token().to_owned()));

		match lookup {
			Some(Some(token)) => {
				drop(tokens);
				self.observe_hit(EntryKind::Token, user_id);

				Some(token)
			},
			Some(None) => {
				tokens.remove(user_id);
				drop(tokens);
				self.observe_eviction(EntryKind::Token, user_id, 1);
				self.observe_miss(EntryKind::Token, user_id);

				None
			},
			None => {
				drop(tokens);
				self.observe_miss(EntryKind::Token, user_id);

				None
			},
		}
	}

	/// Drop one user's profile and token, or everything when `user_id` is `None`.
	pub fn clear(&self, user_id: Option<&str>) {
		let mut profiles = self.profiles.lock();
		let mut tokens = self.tokens.lock();

		match user_id {
			Some(user_id) => {
				let removed_profile = profiles.remove(user_id).is_some();
				let removed_token = tokens.remove(user_id).is_some();

				tracing::info!(user_id = %user_id, removed_profile, removed_token, "session cleared");
			},
			None => {
				let (profile_count, token_count) = (profiles.len(), tokens.len());

				profiles.clear();
				tokens.clear();

				tracing::info!(profiles = profile_count, tokens = token_count, "all sessions cleared");
			},
		}
	}

	/// Remove every expired profile and token, returning how many entries were dropped.
	///
	/// Reads already evict lazily; this is for callers that want to bound memory eagerly.
	pub fn purge_expired(&self) -> usize {
		let now = self.clock.now();
		let ttl = self.config.profile_ttl;
		let mut profiles = self.profiles.lock();
		let mut tokens = self.tokens.lock();
		let (profiles_before, tokens_before) = (profiles.len(), tokens.len());

		profiles.retain(|_, entry| entry.is_fresh(now, ttl));
		tokens.retain(|_, entry| !entry.is_expired(now));

		let purged_profiles = (profiles_before - profiles.len()) as u64;
		let purged_tokens = (tokens_before - tokens.len()) as u64;

		drop(tokens);
		drop(profiles);

		metrics::record_eviction(EntryKind::Profile, purged_profiles);
		metrics::record_eviction(EntryKind::Token, purged_tokens);
		self.metrics.record_evictions(purged_profiles + purged_tokens);

		tracing::debug!(profiles = purged_profiles, tokens = purged_tokens, "expired entries purged");

		(purged_profiles + purged_tokens) as usize
	}

	/// Whether a profile entry is stored for `user_id`, regardless of its age.
	pub fn contains_profile(&self, user_id: &str) -> bool {
		self.profiles.lock().contains_key(user_id)
	}

	/// Whether a token entry is stored for `user_id`, regardless of its expiry.
	pub fn contains_token(&self, user_id: &str) -> bool {
		self.tokens.lock().contains_key(user_id)
	}

	/// Capture entry counts and lookup counters for status reporting.
	pub fn stats(&self) -> CacheStats {
		let profiles = self.profiles.lock().len();
		let tokens = self.tokens.lock().len();

		CacheStats { captured_at: Utc::now(), profiles, tokens, metrics: self.metrics.snapshot() }
	}

	fn observe_hit(&self, kind: EntryKind, user_id: &str) {
		tracing::debug!(kind = kind.as_str(), user_id = %user_id, "session cache hit");

		metrics::record_lookup(kind, true);

		self.metrics.record_hit(kind);
	}

	fn observe_miss(&self, kind: EntryKind, user_id: &str) {
		tracing::debug!(kind = kind.as_str(), user_id = %user_id, "session cache miss");

		metrics::record_lookup(kind, false);

		self.metrics.record_miss(kind);
	}

	fn observe_eviction(&self, kind: EntryKind, user_id: &str, count: u64) {
		tracing::debug!(kind = kind.as_str(), user_id = %user_id, "expired entry evicted");

		metrics::record_eviction(kind, count);

		self.metrics.record_evictions(count);
	}
}
impl Default for SessionCache {
	fn default() -> Self {
		Self::new()
	}
}

/// Builder for [`SessionCache`].
#[derive(Debug, Default)]
pub struct SessionCacheBuilder {
	config: SessionCacheConfig,
	clock: Option<Arc<dyn Clock>>,
}
impl SessionCacheBuilder {
	/// Replace the whole configuration.
	pub fn config(mut self, config: SessionCacheConfig) -> Self {
		self.config = config;

		self
	}

	/// Override the profile TTL.
	pub fn profile_ttl(mut self, ttl: Duration) -> Self {
		self.config.profile_ttl = ttl;

		self
	}

	/// Override the default token lifetime.
	pub fn default_token_lifetime(mut self, lifetime: Duration) -> Self {
		self.config.default_token_lifetime = lifetime;

		self
	}

	/// Read time from `clock` instead of the tokio timer.
	pub fn clock(mut self, clock: impl Clock) -> Self {
		self.clock = Some(Arc::new(clock));

		self
	}

	/// Validate the configuration and construct the cache.
	pub fn build(self) -> Result<SessionCache> {
		self.config.validate()?;

		let clock = self.clock.unwrap_or_else(|| Arc::new(TokioClock));

		Ok(SessionCache::with_parts(self.config, clock))
	}
}

/// Point-in-time view of a [`SessionCache`].
#[derive(Clone, Debug, Serialize)]
pub struct CacheStats {
	/// Wall-clock time the stats were captured.
	pub captured_at: DateTime<Utc>,
	/// Profile entries currently stored, including ones not yet lazily evicted.
	pub profiles: usize,
	/// Token entries currently stored, including ones not yet lazily evicted.
	pub tokens: usize,
	/// Lookup and eviction counters since construction.
	pub metrics: CacheMetricsSnapshot,
}
