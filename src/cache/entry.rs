//! Cached profile and token records plus partial profile updates.

// std
use std::fmt::{Debug, Formatter, Result as FmtResult};
// crates.io
use serde::{Deserialize, Serialize};
// self
use crate::_prelude::*;

/// Profile fields mirrored from the identity provider.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
	/// Human-readable name, when the provider has one.
	#[serde(default)]
	pub display_name: Option<String>,
	/// Primary email address.
	#[serde(default)]
	pub email: Option<String>,
	/// Avatar image URL.
	#[serde(default)]
	pub avatar_url: Option<String>,
	/// Application role tag (customer, property admin, super admin, ...).
	#[serde(default)]
	pub role: Option<String>,
}
impl Profile {
	/// Set the display name.
	pub fn with_display_name(mut self, value: impl Into<String>) -> Self {
		self.display_name = Some(value.into());

		self
	}

	/// Set the email address.
	pub fn with_email(mut self, value: impl Into<String>) -> Self {
		self.email = Some(value.into());

		self
	}

	/// Set the avatar URL.
	pub fn with_avatar_url(mut self, value: impl Into<String>) -> Self {
		self.avatar_url = Some(value.into());

		self
	}

	/// Set the role tag.
	pub fn with_role(mut self, value: impl Into<String>) -> Self {
		self.role = Some(value.into());

		self
	}
}

/// Partial profile update.
///
/// An outer `None` leaves the field untouched; `Some(None)` clears it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProfilePatch {
	/// Replacement display name.
	pub display_name: Option<Option<String>>,
	/// Replacement email address.
	pub email: Option<Option<String>>,
	/// Replacement avatar URL.
	pub avatar_url: Option<Option<String>>,
	/// Replacement role tag.
	pub role: Option<Option<String>>,
}
impl ProfilePatch {
	/// Empty patch.
	pub fn new() -> Self {
		Self::default()
	}

	/// Overwrite the display name.
	pub fn display_name(mut self, value: Option<impl Into<String>>) -> Self {
		self.display_name = Some(value.map(Into::into));

		self
	}

	/// Overwrite the email address.
	pub fn email(mut self, value: Option<impl Into<String>>) -> Self {
		self.email = Some(value.map(Into::into));

		self
	}

	/// Overwrite the avatar URL.
	pub fn avatar_url(mut self, value: Option<impl Into<String>>) -> Self {
		self.avatar_url = Some(value.map(Into::into));

		self
	}

	/// Overwrite the role tag.
	pub fn role(mut self, value: Option<impl Into<String>>) -> Self {
		self.role = Some(value.map(Into::into));

		self
	}

	/// Whether the patch mentions no field at all.
	pub fn is_empty(&self) -> bool {
		self.display_name.is_none()
			&& self.email.is_none()
			&& self.avatar_url.is_none()
			&& self.role.is_none()
	}

	/// Merge mentioned fields into `profile`, leaving the rest untouched.
	pub fn apply(&self, profile: &mut Profile) {
		if let Some(value) = &self.display_name {
			profile.display_name = value.clone();
		}
		if let Some(value) = &self.email {
			profile.email = value.clone();
		}
		if let Some(value) = &self.avatar_url {
			profile.avatar_url = value.clone();
		}
		if let Some(value) = &self.role {
			profile.role = value.clone();
		}
	}
}

/// Profile held by the session cache.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedProfile {
	/// User identifier keying the entry.
	pub user_id: String,
	/// Cached profile fields.
	pub profile: Profile,
	/// Monotonic instant of the last insert or update.
	pub inserted_at: Instant,
}
impl CachedProfile {
	pub(crate) fn new(user_id: String, profile: Profile, now: Instant) -> Self {
		Self { user_id, profile, inserted_at: now }
	}

	/// Time elapsed since the entry was last written.
	pub fn age(&self, now: Instant) -> Duration {
		now.saturating_duration_since(self.inserted_at)
	}

	/// Whether the entry is still younger than `ttl`.
	pub fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
		self.age(now) < ttl
	}
}

/// Bearer token held by the session cache.
#[derive(Clone, PartialEq, Eq)]
pub struct CachedToken {
	/// User identifier keying the entry.
	pub user_id: String,
	token: String,
	/// Monotonic instant when the token was stored.
	pub inserted_at: Instant,
	/// Monotonic instant at which the token stops being served.
	pub expires_at: Instant,
}
impl CachedToken {
	pub(crate) fn new(user_id: String, token: String, now: Instant, lifetime: Duration) -> Self {
		let expires_at = now.checked_add(lifetime).unwrap_or_else(|| far_future(now));

		Self { user_id, token, inserted_at: now, expires_at }
	}

	/// Opaque bearer token value.
	pub fn token(&self) -> &str {
		&self.token
	}

	/// Whether the token has reached its expiry.
	pub fn is_expired(&self, now: Instant) -> bool {
		now >= self.expires_at
	}

	/// Lifetime left before expiry, zero once expired.
	pub fn remaining(&self, now: Instant) -> Duration {
		self.expires_at.saturating_duration_since(now)
	}
}
impl Debug for CachedToken {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.debug_struct("CachedToken")
			.field("user_id", &self.user_id)
			.field("token", &"<redacted>")
			.field("inserted_at", &self.inserted_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

// Roughly thirty years out; used when a caller passes a lifetime the clock cannot represent.
fn far_future(now: Instant) -> Instant {
	now + Duration::from_secs(86_400 * 365 * 30)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn patch_merges_only_mentioned_fields() {
		let mut profile = Profile::default()
			.with_display_name("Layla")
			.with_email("layla@example.com")
			.with_role("customer");
		let patch = ProfilePatch::new()
			.role(Some("property_admin"))
			.avatar_url(Some("https://cdn.example.com/a.png"))
			.email(None::<String>);

		patch.apply(&mut profile);

		assert_eq!(profile.display_name.as_deref(), Some("Layla"));
		assert_eq!(profile.email, None);
		assert_eq!(profile.avatar_url.as_deref(), Some("https://cdn.example.com/a.png"));
		assert_eq!(profile.role.as_deref(), Some("property_admin"));
		assert!(ProfilePatch::new().is_empty());
		assert!(!patch.is_empty());
	}

	#[test]
	fn profile_freshness_is_strictly_below_ttl() {
		let now = Instant::now();
		let entry = CachedProfile::new("u1".into(), Profile::default(), now);
		let ttl = Duration::from_secs(300);

		assert!(entry.is_fresh(now + Duration::from_secs(299), ttl));
		assert!(!entry.is_fresh(now + ttl, ttl));
	}

	#[test]
	fn token_expiry_is_insert_time_plus_lifetime() {
		let now = Instant::now();
		let token = CachedToken::new("u1".into(), "tok-abc".into(), now, Duration::from_secs(60));

		assert_eq!(token.expires_at, now + Duration::from_secs(60));
		assert!(!token.is_expired(now + Duration::from_secs(59)));
		assert!(token.is_expired(now + Duration::from_secs(60)));
		assert_eq!(token.remaining(now + Duration::from_secs(45)), Duration::from_secs(15));
	}

	#[test]
	fn token_debug_output_is_redacted() {
		let token =
			CachedToken::new("u1".into(), "secret-value".into(), Instant::now(), Duration::ZERO);
		let rendered = format!("{token:?}");

		assert!(!rendered.contains("secret-value"));
		assert!(rendered.contains("<redacted>"));
	}
}
