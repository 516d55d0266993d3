// self
use nullbr_access::{
	_preludet::*,
	auth::{AppId, SubjectId},
	store::{CredentialStore, MemoryStore, StoreError},
};

fn subject(raw: &str) -> SubjectId {
	SubjectId::new(raw).expect("Subject fixture should be valid.")
}

#[tokio::test]
async fn upsert_replaces_pair_with_same_app_id() {
	let store = MemoryStore::default();

	store
		.upsert_credential(test_pair("app-1", "key-old"))
		.await
		.expect("First upsert should succeed.");
	store
		.upsert_credential(test_pair("app-1", "key-new"))
		.await
		.expect("Replacing upsert should succeed.");
	store
		.upsert_credential(test_pair("app-2", "key-2"))
		.await
		.expect("Second pair upsert should succeed.");

	let records = store.list_credentials().await.expect("Listing credentials should succeed.");

	assert_eq!(records.len(), 2);
	assert_eq!(records[0].pair.app_id.to_string(), "app-1");
	assert_eq!(records[0].pair.api_key.expose(), "key-new");
}

#[tokio::test]
async fn delete_reports_whether_a_row_existed() {
	let store = seeded_store(&[("app-1", "key-1")]).await;
	let app_id = AppId::new("app-1").expect("App id fixture should be valid.");

	assert!(store.delete_credential(&app_id).await.expect("Delete should succeed."));
	assert!(!store.delete_credential(&app_id).await.expect("Repeat delete should succeed."));
	assert!(store.list_credentials().await.expect("Listing should succeed.").is_empty());
}

#[tokio::test]
async fn whitelist_insert_is_insert_if_absent() {
	let store = MemoryStore::default();

	assert!(store.insert_subject(&subject("42"), "admin").await.expect("Insert should succeed."));
	assert!(
		!store.insert_subject(&subject("42"), "someone-else").await.expect("Insert should succeed.")
	);

	let rows = store.list_whitelist().await.expect("Listing whitelist should succeed.");

	assert_eq!(rows.len(), 1);
	assert_eq!(rows[0].added_by, "admin", "The original row is kept.");
	assert!(store.delete_subject(&subject("42")).await.expect("Delete should succeed."));
	assert!(!store.delete_subject(&subject("42")).await.expect("Delete should succeed."));
}

#[tokio::test]
async fn simulated_outage_fails_every_operation() {
	let store = seeded_store(&[("app-1", "key-1")]).await;

	store.set_unavailable(true);

	assert!(matches!(store.list_credentials().await, Err(StoreError::Unavailable { .. })));
	assert!(matches!(store.list_whitelist().await, Err(StoreError::Unavailable { .. })));
	assert!(store.upsert_credential(test_pair("app-2", "key-2")).await.is_err());

	store.set_unavailable(false);

	assert_eq!(store.list_credentials().await.expect("Store should recover.").len(), 1);
}
