// std
use std::sync::atomic::{AtomicUsize, Ordering};
// crates.io
use time::macros;
// self
use nullbr_access::{
	_preludet::*,
	auth::{AppId, CredentialPair, SubjectId},
	rotator::CredentialRotator,
	store::{CredentialRecord, CredentialStore, MemoryStore, StoreFuture, WhitelistEntry},
};

const T0: OffsetDateTime = macros::datetime!(2025-11-10 12:00 UTC);

/// Memory store that counts credential listings and delays each one.
#[derive(Default)]
struct CountingStore {
	inner: MemoryStore,
	lists: AtomicUsize,
}
impl CredentialStore for CountingStore {
	fn list_credentials(&self) -> StoreFuture<'_, Vec<CredentialRecord>> {
		Box::pin(async move {
			self.lists.fetch_add(1, Ordering::SeqCst);
			tokio::time::sleep(std::time::Duration::from_millis(50)).await;

			self.inner.list_credentials().await
		})
	}

	fn upsert_credential(&self, pair: CredentialPair) -> StoreFuture<'_, ()> {
		self.inner.upsert_credential(pair)
	}

	fn delete_credential<'a>(&'a self, app_id: &'a AppId) -> StoreFuture<'a, bool> {
		self.inner.delete_credential(app_id)
	}

	fn list_whitelist(&self) -> StoreFuture<'_, Vec<WhitelistEntry>> {
		self.inner.list_whitelist()
	}

	fn insert_subject<'a>(
		&'a self,
		subject: &'a SubjectId,
		added_by: &'a str,
	) -> StoreFuture<'a, bool> {
		self.inner.insert_subject(subject, added_by)
	}

	fn delete_subject<'a>(&'a self, subject: &'a SubjectId) -> StoreFuture<'a, bool> {
		self.inner.delete_subject(subject)
	}
}

fn rotator_over(store: Arc<MemoryStore>) -> CredentialRotator {
	CredentialRotator::new(store)
}

#[tokio::test]
async fn selection_covers_the_whole_pool() {
	let store = seeded_store(&[("app-a", "key-a"), ("app-b", "key-b"), ("app-c", "key-c")]).await;
	let rotator = rotator_over(store);
	let mut seen = HashSet::new();

	for _ in 0..300 {
		let pair = rotator.select_credential_at(T0).await.expect("Selection should succeed.");

		seen.insert(pair.app_id.to_string());
	}

	assert_eq!(seen.len(), 3);
}

#[tokio::test]
async fn empty_store_falls_back_to_static_pair() {
	let store = Arc::new(MemoryStore::default());
	let rotator = rotator_over(store.clone()).with_fallback(Some(test_pair("static", "secret")));
	let pair = rotator.select_credential_at(T0).await.expect("Fallback should be selected.");

	assert_eq!(pair.app_id.to_string(), "static");

	let bare = rotator_over(store);

	assert!(matches!(
		bare.select_credential_at(T0).await,
		Err(Error::NoCredentialsAvailable)
	));
}

#[tokio::test]
async fn snapshot_is_reused_within_ttl_and_reloaded_after() {
	let store = seeded_store(&[("app-a", "key-a")]).await;
	let rotator = rotator_over(store.clone()).with_ttl(Duration::seconds(60));

	rotator.select_credential_at(T0).await.expect("Initial selection should succeed.");
	store
		.delete_credential(&AppId::new("app-a").expect("App id fixture should be valid."))
		.await
		.expect("Delete should succeed.");
	store.upsert_credential(test_pair("app-b", "key-b")).await.expect("Upsert should succeed.");

	let cached = rotator
		.select_credential_at(T0 + Duration::seconds(30))
		.await
		.expect("Cached selection should succeed.");

	assert_eq!(cached.app_id.to_string(), "app-a", "Within TTL the old snapshot serves.");

	let reloaded = rotator
		.select_credential_at(T0 + Duration::seconds(61))
		.await
		.expect("Reloaded selection should succeed.");

	assert_eq!(reloaded.app_id.to_string(), "app-b");
}

#[tokio::test]
async fn invalidate_forces_the_next_reload() {
	let store = seeded_store(&[("app-a", "key-a")]).await;
	let rotator = rotator_over(store.clone());

	rotator.select_credential_at(T0).await.expect("Initial selection should succeed.");
	store
		.delete_credential(&AppId::new("app-a").expect("App id fixture should be valid."))
		.await
		.expect("Delete should succeed.");
	store.upsert_credential(test_pair("app-b", "key-b")).await.expect("Upsert should succeed.");
	rotator.invalidate();

	let pair = rotator.select_credential_at(T0).await.expect("Selection should succeed.");

	assert_eq!(pair.app_id.to_string(), "app-b");
}

#[tokio::test]
async fn failed_reload_keeps_serving_previous_snapshot() {
	let store = seeded_store(&[("app-a", "key-a")]).await;
	let rotator = rotator_over(store.clone());

	rotator.select_credential_at(T0).await.expect("Initial selection should succeed.");
	store.set_unavailable(true);

	let degraded = rotator
		.select_credential_at(T0 + Duration::minutes(5))
		.await
		.expect("Previous snapshot should keep serving.");

	assert_eq!(degraded.app_id.to_string(), "app-a");

	store.set_unavailable(false);
	store.upsert_credential(test_pair("app-b", "key-b")).await.expect("Upsert should succeed.");

	let retry_at = T0 + Duration::minutes(5) + CredentialRotator::DEFAULT_RETRY_BACKOFF;
	let mut seen = HashSet::new();

	for _ in 0..100 {
		let pair = rotator
			.select_credential_at(retry_at)
			.await
			.expect("Recovered selection should succeed.");

		seen.insert(pair.app_id.to_string());
	}

	assert!(seen.contains("app-b"), "The first selection after the backoff retries the store.");

	let snapshot = rotator.snapshot().expect("Snapshot should be loaded.");

	assert_eq!(snapshot.fetched_at, retry_at);
}

#[tokio::test]
async fn invalidate_skips_the_retry_backoff() {
	let store = seeded_store(&[("app-a", "key-a")]).await;
	let rotator = rotator_over(store.clone());

	rotator.select_credential_at(T0).await.expect("Initial selection should succeed.");
	store.set_unavailable(true);
	rotator.invalidate();
	rotator.select_credential_at(T0).await.expect("Previous snapshot should keep serving.");
	store.set_unavailable(false);
	store
		.delete_credential(&AppId::new("app-a").expect("App id fixture should be valid."))
		.await
		.expect("Delete should succeed.");
	store.upsert_credential(test_pair("app-b", "key-b")).await.expect("Upsert should succeed.");
	rotator.invalidate();

	let pair = rotator.select_credential_at(T0).await.expect("Selection should succeed.");

	assert_eq!(pair.app_id.to_string(), "app-b");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_stale_selectors_share_one_reload() {
	let store = Arc::new(CountingStore::default());

	store
		.inner
		.upsert_credential(test_pair("app-a", "key-a"))
		.await
		.expect("Seeding should succeed.");

	let rotator = Arc::new(CredentialRotator::new(store.clone()));
	let tasks = (0..16)
		.map(|_| {
			let rotator = rotator.clone();

			tokio::spawn(async move { rotator.select_credential().await })
		})
		.collect::<Vec<_>>();

	for task in tasks {
		task.await.expect("Selector task should join.").expect("Selection should succeed.");
	}

	assert_eq!(store.lists.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_selectors_during_outage_share_one_store_attempt() {
	let store = Arc::new(CountingStore::default());

	store
		.inner
		.upsert_credential(test_pair("app-a", "key-a"))
		.await
		.expect("Seeding should succeed.");

	let rotator = Arc::new(CredentialRotator::new(store.clone()));

	rotator.select_credential_at(T0).await.expect("Initial selection should succeed.");
	store.inner.set_unavailable(true);

	let expired = T0 + Duration::minutes(2);
	let tasks = (0..16)
		.map(|_| {
			let rotator = rotator.clone();

			tokio::spawn(async move { rotator.select_credential_at(expired).await })
		})
		.collect::<Vec<_>>();

	for task in tasks {
		let pair = task
			.await
			.expect("Selector task should join.")
			.expect("Previous snapshot should keep serving.");

		assert_eq!(pair.app_id.to_string(), "app-a");
	}

	assert_eq!(store.lists.load(Ordering::SeqCst), 2, "One initial load plus one failed reload.");

	store.inner.set_unavailable(false);
	rotator
		.select_credential_at(expired + CredentialRotator::DEFAULT_RETRY_BACKOFF)
		.await
		.expect("Selection after the backoff should succeed.");

	assert_eq!(store.lists.load(Ordering::SeqCst), 3);
}
