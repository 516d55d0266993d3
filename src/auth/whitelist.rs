//! TTL-bounded in-memory copy of the authorization whitelist.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::{_prelude::*, auth::SubjectId, store::CredentialStore};

#[derive(Debug)]
struct WhitelistSnapshot {
	subjects: HashSet<SubjectId>,
	fetched_at: OffsetDateTime,
	stale: bool,
}

/// Answers "is this subject authorized?" without touching the store on the hot path.
///
/// The store is read at most once per TTL window (plus forced refreshes). When a reload
/// fails, the previously loaded set keeps answering; a cache that has never loaded
/// successfully denies everyone. Callers queued behind a failed reload reuse its result, and
/// the store is not retried until the retry backoff has elapsed.
pub struct AuthorizationCache {
	store: Arc<dyn CredentialStore>,
	ttl: Duration,
	retry_backoff: Duration,
	snapshot: RwLock<Option<Arc<WhitelistSnapshot>>>,
	attempts: AtomicU64,
	failed_at: Mutex<Option<OffsetDateTime>>,
	reload_guard: AsyncMutex<()>,
}
impl AuthorizationCache {
	/// Default whitelist time-to-live.
	pub const DEFAULT_TTL: Duration = Duration::seconds(60);
	/// Default pause between store retries after a failed reload.
	pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::seconds(5);

	/// Creates an empty cache over `store` with the default TTL.
	pub fn new(store: Arc<dyn CredentialStore>) -> Self {
		Self {
			store,
			ttl: Self::DEFAULT_TTL,
			retry_backoff: Self::DEFAULT_RETRY_BACKOFF,
			snapshot: RwLock::new(None),
			attempts: AtomicU64::new(0),
			failed_at: Mutex::new(None),
			reload_guard: AsyncMutex::new(()),
		}
	}

	/// Overrides the TTL.
	pub fn with_ttl(mut self, ttl: Duration) -> Self {
		self.ttl = if ttl.is_negative() { Duration::ZERO } else { ttl };

		self
	}

	/// Overrides the pause between store retries after a failed reload.
	pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
		self.retry_backoff = if backoff.is_negative() { Duration::ZERO } else { backoff };

		self
	}

	/// Returns whether `subject` is on the whitelist as of the last successful load.
	pub async fn is_authorized(&self, subject: &str) -> bool {
		self.is_authorized_at(subject, OffsetDateTime::now_utc()).await
	}

	/// [`is_authorized`](Self::is_authorized) with an explicit clock reading.
	pub async fn is_authorized_at(&self, subject: &str, now: OffsetDateTime) -> bool {
		if let Some(snapshot) = self.fresh_at(now) {
			return snapshot.subjects.contains(subject);
		}
		if self.backing_off_at(now) {
			return self.previous_contains(subject);
		}

		let seen = self.attempts.load(Ordering::Acquire);
		let _reload = self.reload_guard.lock().await;

		if let Some(snapshot) = self.fresh_at(now) {
			return snapshot.subjects.contains(subject);
		}
		// A reload attempted while this caller waited already failed; reuse its outcome.
		if self.attempts.load(Ordering::Acquire) != seen || self.backing_off_at(now) {
			return self.previous_contains(subject);
		}

		self.attempts.fetch_add(1, Ordering::AcqRel);

		match self.reload_at(now).await {
			Ok(snapshot) => snapshot.subjects.contains(subject),
			Err(e) => {
				*self.failed_at.lock() = Some(now);

				tracing::warn!(
					error = %e,
					loaded = self.snapshot.read().is_some(),
					"whitelist reload failed; serving previous set",
				);

				self.previous_contains(subject)
			},
		}
	}

	/// Reloads the whitelist immediately, ignoring any retry backoff.
	///
	/// On failure the current set is marked stale so the next query retries the store.
	pub async fn force_refresh(&self) -> Result<()> {
		let _reload = self.reload_guard.lock().await;

		self.attempts.fetch_add(1, Ordering::AcqRel);

		match self.reload_at(OffsetDateTime::now_utc()).await {
			Ok(_) => Ok(()),
			Err(e) => {
				self.mark_stale();

				Err(e.into())
			},
		}
	}

	/// Number of subjects in the currently loaded set.
	pub fn len(&self) -> usize {
		self.snapshot.read().as_ref().map_or(0, |snapshot| snapshot.subjects.len())
	}

	/// Returns true when no subject is loaded.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	async fn reload_at(
		&self,
		now: OffsetDateTime,
	) -> Result<Arc<WhitelistSnapshot>, crate::store::StoreError> {
		let rows = self.store.list_whitelist().await?;
		let previous_at = self.snapshot.read().as_ref().map(|snapshot| snapshot.fetched_at);
		let snapshot = Arc::new(WhitelistSnapshot {
			subjects: rows.into_iter().map(|row| row.subject).collect(),
			fetched_at: previous_at.map_or(now, |at| at.max(now)),
			stale: false,
		});

		tracing::debug!(subjects = snapshot.subjects.len(), "whitelist reloaded");

		*self.snapshot.write() = Some(snapshot.clone());
		*self.failed_at.lock() = None;

		Ok(snapshot)
	}

	fn mark_stale(&self) {
		let mut guard = self.snapshot.write();

		if let Some(current) = guard.as_ref() {
			*guard = Some(Arc::new(WhitelistSnapshot {
				subjects: current.subjects.clone(),
				fetched_at: current.fetched_at,
				stale: true,
			}));
		}
	}

	fn backing_off_at(&self, now: OffsetDateTime) -> bool {
		let failed_at = *self.failed_at.lock();

		failed_at.is_some_and(|at| now - at < self.retry_backoff)
	}

	fn previous_contains(&self, subject: &str) -> bool {
		self.snapshot.read().as_ref().is_some_and(|snapshot| snapshot.subjects.contains(subject))
	}

	fn fresh_at(&self, now: OffsetDateTime) -> Option<Arc<WhitelistSnapshot>> {
		self.snapshot
			.read()
			.as_ref()
			.filter(|snapshot| !snapshot.stale && now - snapshot.fetched_at <= self.ttl)
			.cloned()
	}
}
impl Debug for AuthorizationCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthorizationCache")
			.field("ttl", &self.ttl)
			.field("retry_backoff", &self.retry_backoff)
			.field("subjects", &self.len())
			.finish()
	}
}
