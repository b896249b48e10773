//! Metrics helpers and per-cache telemetry bookkeeping.

// std
#[cfg(feature = "prometheus")] use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
// crates.io
use metrics::Label;
#[cfg(feature = "prometheus")]
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Serialize;
use smallvec::SmallVec;
// self
use crate::_prelude::*;

type LabelSet = SmallVec<[Label; 2]>;

const METRIC_CACHE_REQUESTS_TOTAL: &str = "stayx_session_cache_requests_total";
const METRIC_CACHE_EVICTIONS_TOTAL: &str = "stayx_session_cache_evictions_total";
const METRIC_RETRY_ATTEMPTS_TOTAL: &str = "stayx_session_retry_attempts_total";
const METRIC_RETRY_GIVE_UPS_TOTAL: &str = "stayx_session_retry_give_ups_total";
const METRIC_RETRY_BACKOFF: &str = "stayx_session_retry_backoff_seconds";

/// Shared Prometheus handle installed by [`install_default_exporter`].
#[cfg(feature = "prometheus")]
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Which of the two session maps an observation refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntryKind {
	/// Cached user profile.
	Profile,
	/// Cached bearer token.
	Token,
}
impl EntryKind {
	/// Label value used for this kind.
	pub fn as_str(self) -> &'static str {
		match self {
			EntryKind::Profile => "profile",
			EntryKind::Token => "token",
		}
	}
}

/// Why a retry loop stopped without a success.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GiveUpReason {
	/// Attempt ceiling reached.
	Exhausted,
	/// Failure rejected by the retry predicate.
	NonRetryable,
	/// Caller cancelled the loop.
	Cancelled,
}
impl GiveUpReason {
	/// Label value used for this reason.
	pub fn as_str(self) -> &'static str {
		match self {
			GiveUpReason::Exhausted => "exhausted",
			GiveUpReason::NonRetryable => "non_retryable",
			GiveUpReason::Cancelled => "cancelled",
		}
	}
}

/// Thread-safe counters for a single session cache.
#[derive(Debug, Default)]
pub struct CacheMetrics {
	profile_hits: AtomicU64,
	profile_misses: AtomicU64,
	token_hits: AtomicU64,
	token_misses: AtomicU64,
	evictions: AtomicU64,
}
impl CacheMetrics {
	/// Create a new metrics accumulator.
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	/// Record a lookup that returned a live entry.
	pub fn record_hit(&self, kind: EntryKind) {
		match kind {
			EntryKind::Profile => self.profile_hits.fetch_add(1, Ordering::Relaxed),
			EntryKind::Token => self.token_hits.fetch_add(1, Ordering::Relaxed),
		};
	}

	/// Record a lookup that found nothing usable.
	pub fn record_miss(&self, kind: EntryKind) {
		match kind {
			EntryKind::Profile => self.profile_misses.fetch_add(1, Ordering::Relaxed),
			EntryKind::Token => self.token_misses.fetch_add(1, Ordering::Relaxed),
		};
	}

	/// Record entries dropped because they expired.
	pub fn record_evictions(&self, count: u64) {
		self.evictions.fetch_add(count, Ordering::Relaxed);
	}

	/// Take a point-in-time snapshot for status reporting.
	pub fn snapshot(&self) -> CacheMetricsSnapshot {
		CacheMetricsSnapshot {
			profile_hits: self.profile_hits.load(Ordering::Relaxed),
			profile_misses: self.profile_misses.load(Ordering::Relaxed),
			token_hits: self.token_hits.load(Ordering::Relaxed),
			token_misses: self.token_misses.load(Ordering::Relaxed),
			evictions: self.evictions.load(Ordering::Relaxed),
		}
	}
}

/// Read-only snapshot of per-cache counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CacheMetricsSnapshot {
	/// Profile lookups served from the cache.
	pub profile_hits: u64,
	/// Profile lookups that missed or found an expired entry.
	pub profile_misses: u64,
	/// Token lookups served from the cache.
	pub token_hits: u64,
	/// Token lookups that missed or found an expired entry.
	pub token_misses: u64,
	/// Entries removed because they outlived their TTL.
	pub evictions: u64,
}
impl CacheMetricsSnapshot {
	/// Ratio of hits over all lookups, across both maps.
	pub fn hit_rate(&self) -> f64 {
		let hits = self.profile_hits + self.token_hits;
		let total = hits + self.profile_misses + self.token_misses;

		if total == 0 { 0.0 } else { hits as f64 / total as f64 }
	}
}

/// Install the default Prometheus recorder backed by `metrics`.
///
/// Multiple invocations are safe; subsequent calls become no-ops once the recorder is installed.
#[cfg(feature = "prometheus")]
pub fn install_default_exporter() -> Result<()> {
	if PROMETHEUS_HANDLE.get().is_some() {
		return Ok(());
	}

	let handle = PrometheusBuilder::new().install_recorder()?;
	let _ = PROMETHEUS_HANDLE.set(handle);

	Ok(())
}

/// Access the global Prometheus exporter handle when installed.
#[cfg(feature = "prometheus")]
pub fn prometheus_handle() -> Option<&'static PrometheusHandle> {
	PROMETHEUS_HANDLE.get()
}

/// Record a cache lookup outcome.
pub fn record_lookup(kind: EntryKind, hit: bool) {
	let labels = lookup_labels(kind, if hit { "hit" } else { "miss" });

	metrics::counter!(METRIC_CACHE_REQUESTS_TOTAL, labels.iter()).increment(1);
}

/// Record expired entries removed from a map.
pub fn record_eviction(kind: EntryKind, count: u64) {
	if count == 0 {
		return;
	}

	metrics::counter!(METRIC_CACHE_EVICTIONS_TOTAL, kind_labels(kind).iter()).increment(count);
}

/// Record one invocation of a retried operation.
pub fn record_attempt(success: bool) {
	let outcome = if success { "success" } else { "failure" };

	metrics::counter!(METRIC_RETRY_ATTEMPTS_TOTAL, "outcome" => outcome).increment(1);
}

/// Record a scheduled delay between attempts.
pub fn record_backoff(delay: Duration) {
	metrics::histogram!(METRIC_RETRY_BACKOFF).record(delay.as_secs_f64());
}

/// Record a retry loop that stopped without success.
pub fn record_give_up(reason: GiveUpReason) {
	metrics::counter!(METRIC_RETRY_GIVE_UPS_TOTAL, "reason" => reason.as_str()).increment(1);
}

fn kind_labels(kind: EntryKind) -> LabelSet {
	let mut labels = LabelSet::new();

	labels.push(Label::new("kind", kind.as_str()));

	labels
}

fn lookup_labels(kind: EntryKind, outcome: &'static str) -> LabelSet {
	let mut labels = kind_labels(kind);

	labels.push(Label::new("outcome", outcome));

	labels
}
