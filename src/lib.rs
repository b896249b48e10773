//! Time-boxed session cache and exponential-backoff retry primitives for the StayX booking
//! client.
//!
//! [`SessionCache`] memoizes identity-provider profiles and bearer tokens so the authentication
//! listener can skip redundant round trips, and [`RetryingOperation`] smooths over transient
//! failures of backend and provider calls. Both read time through an injectable [`Clock`].

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod cache;
pub mod clock;
pub mod config;
pub mod metrics;
pub mod retry;

mod error;
mod _prelude {
	pub use std::{sync::Arc, time::Duration};

	pub use chrono::{DateTime, Utc};
	pub use tokio::time::Instant;

	pub use crate::{Error, Result};
}

#[cfg(feature = "prometheus")] pub use crate::metrics::install_default_exporter;
pub use crate::{
	cache::{
		entry::{CachedProfile, CachedToken, Profile, ProfilePatch},
		session::{CacheStats, SessionCache, SessionCacheBuilder},
	},
	clock::{Clock, ManualClock, TokioClock},
	config::{JitterStrategy, RetryPolicy, SessionCacheConfig},
	error::{Error, Result},
	retry::operation::{AttemptFailure, RetryError, RetryingOperation},
};
pub use tokio_util::sync::CancellationToken;
