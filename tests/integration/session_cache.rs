//! Session cache behaviour driven the way the authentication listener uses it.

// std
use std::time::Duration;
// crates.io
use stayx_session::{ManualClock, Profile, ProfilePatch, Result, SessionCache, SessionCacheConfig};

fn host_profile() -> Profile {
	Profile::default()
		.with_display_name("Noura")
		.with_email("noura@example.com")
		.with_avatar_url("https://cdn.example.com/avatars/noura.png")
		.with_role("property_admin")
}

#[tokio::test(start_paused = true)]
async fn token_expires_on_the_tokio_clock() {
	let _ = tracing_subscriber::fmt::try_init();

	let cache = SessionCache::new();

	cache.put_token("u1", "tok-abc", Duration::from_secs(60));

	assert_eq!(cache.get_token("u1").as_deref(), Some("tok-abc"));

	tokio::time::advance(Duration::from_secs(61)).await;

	assert_eq!(cache.get_token("u1"), None);
	assert!(!cache.contains_token("u1"), "expired token should be evicted on read");
}

#[tokio::test(start_paused = true)]
async fn sign_in_refresh_and_sign_out_lifecycle() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let config = SessionCacheConfig::from_json(
		r#"{ "profile_ttl": { "secs": 120, "nanos": 0 }, "default_token_lifetime": { "secs": 900, "nanos": 0 } }"#,
	)?;
	let cache = SessionCache::builder().config(config).build()?;

	// Sign-in event.
	cache.put_profile("host-7", host_profile());
	cache.put_token_default("host-7", "bearer-7");

	tokio::time::advance(Duration::from_secs(100)).await;

	assert!(cache.update_profile("host-7", &ProfilePatch::new().display_name(Some("Noura A."))));

	tokio::time::advance(Duration::from_secs(100)).await;

	let profile = cache.get_profile("host-7").expect("update extends lifetime");

	assert_eq!(profile.profile.display_name.as_deref(), Some("Noura A."));
	assert_eq!(profile.profile.role.as_deref(), Some("property_admin"));
	assert_eq!(cache.get_token("host-7").as_deref(), Some("bearer-7"));

	// Sign-out event.
	cache.clear(Some("host-7"));

	assert!(cache.get_profile("host-7").is_none());
	assert!(cache.get_token("host-7").is_none());

	let stats = cache.stats();

	assert_eq!(stats.profiles, 0);
	assert_eq!(stats.metrics.profile_hits, 1);
	assert_eq!(stats.metrics.token_hits, 1);

	Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn clones_share_state_across_tasks() {
	let _ = tracing_subscriber::fmt::try_init();

	let cache = SessionCache::builder().clock(ManualClock::new()).build().expect("cache");
	let mut handles = Vec::new();

	for worker in 0..8 {
		let cache = cache.clone();

		handles.push(tokio::spawn(async move {
			for n in 0..50 {
				let user = format!("guest-{worker}-{n}");

				cache.put_profile(user.clone(), Profile::default().with_role("customer"));
				cache.put_token(user.clone(), format!("tok-{worker}-{n}"), Duration::from_secs(60));

				assert!(cache.get_profile(&user).is_some());
			}
		}));
	}
	for handle in handles {
		handle.await.expect("worker");
	}

	let stats = cache.stats();

	assert_eq!((stats.profiles, stats.tokens), (400, 400));

	cache.clear(None);

	let stats = cache.stats();

	assert_eq!((stats.profiles, stats.tokens), (0, 0));
}
