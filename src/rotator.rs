//! Credential rotation over a TTL-bounded snapshot of the credential store.
//!
//! The rotator keeps an immutable [`CredentialSnapshot`] behind an `Arc` and swaps it
//! wholesale on reload, so readers never observe a half-updated pool. Reloads are
//! single-flight: concurrent selectors that find the snapshot stale wait on one shared
//! reload instead of each hitting the store. A failed reload keeps serving the previous
//! snapshot, and selectors that queued behind it reuse that outcome; the store is retried once
//! the retry backoff has elapsed or the rotator is invalidated. Only a total absence of
//! credentials surfaces as an error.

// std
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
// crates.io
use rand::seq::IndexedRandom;
// self
use crate::{_prelude::*, auth::CredentialPair, store::CredentialStore};

/// Immutable view of the credential pool at one point in time.
#[derive(Clone, Debug)]
pub struct CredentialSnapshot {
	/// Pairs loaded from the store.
	pub pairs: Arc<[CredentialPair]>,
	/// When the pairs were loaded; never decreases across reloads.
	pub fetched_at: OffsetDateTime,
}
impl CredentialSnapshot {
	fn empty(fetched_at: OffsetDateTime) -> Self {
		Self { pairs: Arc::from(Vec::new()), fetched_at }
	}

	/// Returns true while the snapshot is non-empty and younger than `ttl`.
	pub fn is_fresh_at(&self, ttl: Duration, now: OffsetDateTime) -> bool {
		!self.pairs.is_empty() && now - self.fetched_at <= ttl
	}
}

/// Selects one credential pair per outbound call.
pub struct CredentialRotator {
	store: Arc<dyn CredentialStore>,
	ttl: Duration,
	retry_backoff: Duration,
	fallback: Option<CredentialPair>,
	snapshot: RwLock<Option<Arc<CredentialSnapshot>>>,
	invalidated: AtomicBool,
	attempts: AtomicU64,
	failed_at: Mutex<Option<OffsetDateTime>>,
	reload_guard: AsyncMutex<()>,
}
impl CredentialRotator {
	/// Default snapshot time-to-live.
	pub const DEFAULT_TTL: Duration = Duration::seconds(60);
	/// Default pause between store retries after a failed reload.
	pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::seconds(5);

	/// Creates a rotator reading from `store` with the default TTL and no static fallback.
	pub fn new(store: Arc<dyn CredentialStore>) -> Self {
		Self {
			store,
			ttl: Self::DEFAULT_TTL,
			retry_backoff: Self::DEFAULT_RETRY_BACKOFF,
			fallback: None,
			snapshot: RwLock::new(None),
			invalidated: AtomicBool::new(false),
			attempts: AtomicU64::new(0),
			failed_at: Mutex::new(None),
			reload_guard: AsyncMutex::new(()),
		}
	}

	/// Overrides the snapshot TTL.
	pub fn with_ttl(mut self, ttl: Duration) -> Self {
		self.ttl = if ttl.is_negative() { Duration::ZERO } else { ttl };

		self
	}

	/// Overrides the pause between store retries after a failed reload.
	pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
		self.retry_backoff = if backoff.is_negative() { Duration::ZERO } else { backoff };

		self
	}

	/// Sets the statically configured pair used when the store yields none.
	pub fn with_fallback(mut self, fallback: Option<CredentialPair>) -> Self {
		self.fallback = fallback;

		self
	}

	/// Picks a pair uniformly at random, reloading the snapshot first when stale.
	pub async fn select_credential(&self) -> Result<CredentialPair> {
		self.select_credential_at(OffsetDateTime::now_utc()).await
	}

	/// [`select_credential`](Self::select_credential) with an explicit clock reading.
	pub async fn select_credential_at(&self, now: OffsetDateTime) -> Result<CredentialPair> {
		let snapshot = self.current_at(now).await;

		choose_uniform(&snapshot.pairs)
			.or(self.fallback.as_ref())
			.cloned()
			.ok_or(Error::NoCredentialsAvailable)
	}

	/// Forces the next selection to reload from the store, skipping any retry backoff.
	pub fn invalidate(&self) {
		*self.failed_at.lock() = None;
		self.invalidated.store(true, Ordering::Release);
	}

	/// Currently cached snapshot, if one was ever loaded.
	pub fn snapshot(&self) -> Option<Arc<CredentialSnapshot>> {
		self.snapshot.read().clone()
	}

	async fn current_at(&self, now: OffsetDateTime) -> Arc<CredentialSnapshot> {
		if let Some(snapshot) = self.fresh_at(now) {
			return snapshot;
		}
		if self.backing_off_at(now) {
			return self.previous_or_empty(now);
		}

		let seen = self.attempts.load(Ordering::Acquire);
		let _reload = self.reload_guard.lock().await;

		// Another selector may have finished the reload while this one waited.
		if let Some(snapshot) = self.fresh_at(now) {
			return snapshot;
		}
		if self.attempts.load(Ordering::Acquire) != seen || self.backing_off_at(now) {
			return self.previous_or_empty(now);
		}

		self.attempts.fetch_add(1, Ordering::AcqRel);
		self.invalidated.store(false, Ordering::Release);

		let previous = self.snapshot();

		match self.store.list_credentials().await {
			Ok(records) => {
				let fetched_at = previous.as_ref().map_or(now, |p| p.fetched_at.max(now));
				let pairs: Arc<[CredentialPair]> =
					records.into_iter().map(|record| record.pair).collect();
				let snapshot = Arc::new(CredentialSnapshot { pairs, fetched_at });

				tracing::debug!(pairs = snapshot.pairs.len(), "credential snapshot reloaded");

				*self.snapshot.write() = Some(snapshot.clone());
				*self.failed_at.lock() = None;

				snapshot
			},
			Err(e) => {
				*self.failed_at.lock() = Some(now);
				self.invalidated.store(true, Ordering::Release);

				tracing::warn!(
					error = %e,
					stale_pairs = previous.as_ref().map_or(0, |p| p.pairs.len()),
					"credential reload failed; serving previous snapshot",
				);

				previous.unwrap_or_else(|| Arc::new(CredentialSnapshot::empty(now)))
			},
		}
	}

	fn backing_off_at(&self, now: OffsetDateTime) -> bool {
		let failed_at = *self.failed_at.lock();

		failed_at.is_some_and(|at| now - at < self.retry_backoff)
	}

	fn previous_or_empty(&self, now: OffsetDateTime) -> Arc<CredentialSnapshot> {
		self.snapshot().unwrap_or_else(|| Arc::new(CredentialSnapshot::empty(now)))
	}

	fn fresh_at(&self, now: OffsetDateTime) -> Option<Arc<CredentialSnapshot>> {
		if self.invalidated.load(Ordering::Acquire) {
			return None;
		}

		self.snapshot.read().as_ref().filter(|s| s.is_fresh_at(self.ttl, now)).cloned()
	}
}
impl Debug for CredentialRotator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialRotator")
			.field("ttl", &self.ttl)
			.field("retry_backoff", &self.retry_backoff)
			.field("fallback_set", &self.fallback.is_some())
			.field("pairs", &self.snapshot.read().as_ref().map(|s| s.pairs.len()))
			.finish()
	}
}

/// Uniform random choice over an immutable pair sequence.
pub fn choose_uniform(pairs: &[CredentialPair]) -> Option<&CredentialPair> {
	pairs.choose(&mut rand::rng())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn pair(app: &str) -> CredentialPair {
		CredentialPair::parse(app, format!("{app}-key")).expect("Pair fixture should parse.")
	}

	#[test]
	fn uniform_choice_covers_every_pair() {
		let pairs = [pair("a"), pair("b"), pair("c")];
		let mut seen = HashSet::new();

		for _ in 0..500 {
			if let Some(choice) = choose_uniform(&pairs) {
				seen.insert(choice.app_id.to_string());
			}
		}

		assert_eq!(seen.len(), 3);
		assert!(choose_uniform(&[]).is_none());
	}

	#[test]
	fn empty_snapshot_is_never_fresh() {
		let now = OffsetDateTime::now_utc();

		assert!(!CredentialSnapshot::empty(now).is_fresh_at(Duration::minutes(1), now));
	}
}
