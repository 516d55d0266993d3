//! Read-through cache for metadata responses keyed by request fingerprint.

// self
use crate::{
	_prelude::*,
	cache::{Fingerprint, QueryParams, TtlMap},
	obs::{AccessMetrics, MetricEvent},
};

/// Response cache for side-effect-free metadata reads.
///
/// Lookups never hold the map lock across the fetcher's `.await`, so two concurrent misses
/// for the same fingerprint may both fetch; the later insert replaces the earlier one.
#[derive(Debug)]
pub struct ResponseCache<V = serde_json::Value> {
	entries: Mutex<TtlMap<Fingerprint, V>>,
	metrics: Arc<AccessMetrics>,
}
impl<V> ResponseCache<V>
where
	V: Clone,
{
	/// Default time-to-live for cached bodies.
	pub const DEFAULT_TTL: Duration = Duration::seconds(30);
	/// Default capacity ceiling.
	pub const DEFAULT_CAPACITY: usize = 512;

	/// Creates a cache that reports hits and misses to `metrics`.
	pub fn new(ttl: Duration, capacity: usize, metrics: Arc<AccessMetrics>) -> Self {
		Self { entries: Mutex::new(TtlMap::new(ttl, capacity)), metrics }
	}

	/// Returns the cached value for `endpoint` + `params`, or runs `fetch` and stores its
	/// successful result stamped with the instant the fetch completed.
	pub async fn get_or_fetch<F, Fut, E>(
		&self,
		endpoint: &str,
		params: &QueryParams,
		fetch: F,
	) -> Result<V, E>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<V, E>>,
	{
		self.get_or_fetch_with(Fingerprint::new(endpoint, params), OffsetDateTime::now_utc, fetch)
			.await
	}

	/// [`get_or_fetch`](Self::get_or_fetch) with an explicit fingerprint and clock.
	///
	/// `clock` is read once for the lookup and again after `fetch` resolves.
	pub async fn get_or_fetch_with<C, F, Fut, E>(
		&self,
		fingerprint: Fingerprint,
		clock: C,
		fetch: F,
	) -> Result<V, E>
	where
		C: Fn() -> OffsetDateTime,
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<V, E>>,
	{
		if let Some(value) = self.lookup_at(&fingerprint, clock()) {
			self.metrics.record(MetricEvent::CacheHit);
			tracing::debug!(key = fingerprint.digest(), "response cache hit");

			return Ok(value);
		}

		self.metrics.record(MetricEvent::CacheMiss);
		tracing::debug!(key = fingerprint.digest(), "response cache miss");

		let value = fetch().await?;

		self.store_at(fingerprint, value.clone(), clock());

		Ok(value)
	}

	/// Returns the fresh value stored under `fingerprint`, if any.
	pub fn lookup_at(&self, fingerprint: &Fingerprint, now: OffsetDateTime) -> Option<V> {
		self.entries.lock().get_at(fingerprint, now).map(|entry| entry.value.clone())
	}

	/// Stores `value`, evicting the single oldest entry when the cache is full.
	pub fn store_at(&self, fingerprint: Fingerprint, value: V, now: OffsetDateTime) {
		let evicted = self.entries.lock().insert_at(fingerprint, value, now);

		for key in evicted {
			tracing::debug!(key = key.digest(), "response cache evicted oldest entry");
		}
	}

	/// Number of physically present entries.
	pub fn len(&self) -> usize {
		self.entries.lock().len()
	}

	/// Returns true when the cache holds no entries.
	pub fn is_empty(&self) -> bool {
		self.entries.lock().is_empty()
	}

	/// Drops every cached body.
	pub fn clear(&self) {
		self.entries.lock().clear();
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;

	const T0: OffsetDateTime = datetime!(2025-11-10 12:00 UTC);

	fn cache(capacity: usize) -> (ResponseCache<u32>, Arc<AccessMetrics>) {
		let metrics = Arc::new(AccessMetrics::default());

		(ResponseCache::new(Duration::seconds(30), capacity, metrics.clone()), metrics)
	}

	fn key(endpoint: &str) -> Fingerprint {
		Fingerprint::new(endpoint, &QueryParams::new())
	}

	#[tokio::test]
	async fn hit_within_ttl_skips_fetcher() {
		let (cache, metrics) = cache(8);
		let counter = AtomicUsize::new(0);
		let calls = &counter;
		let fetch = move || async move {
			calls.fetch_add(1, Ordering::SeqCst);

			Ok::<_, ()>(7)
		};
		let a = QueryParams::new().with("query", "batman").with("page", 1);
		let b = QueryParams::new().with("page", 1).with("query", "batman");

		assert_eq!(cache.get_or_fetch("/search", &a, fetch).await, Ok(7));
		assert_eq!(cache.get_or_fetch("/search", &b, fetch).await, Ok(7));
		assert_eq!(calls.load(Ordering::SeqCst), 1);

		let view = metrics.snapshot(false);

		assert_eq!((view.cache_hits, view.cache_misses), (1, 1));
	}

	#[tokio::test]
	async fn expired_entry_triggers_refetch() {
		let (cache, metrics) = cache(8);

		cache.store_at(key("/movie/1"), 1, T0);

		let value = cache
			.get_or_fetch_with(key("/movie/1"), || T0 + Duration::seconds(31), || async {
				Ok::<_, ()>(2)
			})
			.await;

		assert_eq!(value, Ok(2));
		assert_eq!(metrics.snapshot(false).cache_misses, 1);
		assert_eq!(cache.len(), 1, "Refresh replaces the stale entry.");
	}

	#[tokio::test]
	async fn failed_fetch_is_not_cached() {
		let (cache, _) = cache(8);
		let result =
			cache.get_or_fetch_with(key("/tv/1"), || T0, || async { Err::<u32, _>("down") }).await;

		assert_eq!(result, Err("down"));
		assert!(cache.is_empty());
	}

	#[tokio::test]
	async fn slow_fetch_is_stamped_when_it_completes() {
		let metrics = Arc::new(AccessMetrics::default());
		let cache = ResponseCache::new(Duration::seconds(1), 8, metrics);
		let instant = Mutex::new(T0);
		let clock = &instant;
		let fetch = move || async move {
			*clock.lock() = T0 + Duration::milliseconds(900);

			Ok::<_, ()>(603)
		};
		let value = cache.get_or_fetch_with(key("/movie/603"), || *clock.lock(), fetch).await;

		assert_eq!(value, Ok(603));
		assert_eq!(
			cache.lookup_at(&key("/movie/603"), T0 + Duration::milliseconds(1_100)),
			Some(603),
			"Entry age counts from the end of the fetch.",
		);
		assert_eq!(cache.lookup_at(&key("/movie/603"), T0 + Duration::milliseconds(2_000)), None);
	}

	#[test]
	fn capacity_ceiling_evicts_oldest_stored() {
		let (cache, _) = cache(2);

		cache.store_at(key("/movie/1"), 1, T0);
		cache.store_at(key("/movie/2"), 2, T0 + Duration::seconds(1));
		cache.store_at(key("/movie/3"), 3, T0 + Duration::seconds(2));

		let now = T0 + Duration::seconds(3);

		assert_eq!(cache.len(), 2);
		assert_eq!(cache.lookup_at(&key("/movie/1"), now), None);
		assert_eq!(cache.lookup_at(&key("/movie/2"), now), Some(2));
		assert_eq!(cache.lookup_at(&key("/movie/3"), now), Some(3));
	}
}
