//! Thread-safe in-memory [`CredentialStore`] implementation for local development and tests.

// std
use std::sync::atomic::{AtomicBool, Ordering};
// self
use crate::{
	_prelude::*,
	auth::{AppId, CredentialPair, SubjectId},
	store::{CredentialRecord, CredentialStore, StoreError, StoreFuture, WhitelistEntry},
};

/// Both tables, keyed for deterministic listing order.
#[derive(Clone, Debug, Default)]
pub(crate) struct Tables {
	pub(crate) credentials: BTreeMap<AppId, CredentialRecord>,
	pub(crate) whitelist: BTreeMap<SubjectId, WhitelistEntry>,
}
impl Tables {
	pub(crate) fn upsert_credential(&mut self, pair: CredentialPair, now: OffsetDateTime) {
		self.credentials.insert(pair.app_id.clone(), CredentialRecord { pair, added_at: now });
	}

	pub(crate) fn delete_credential(&mut self, app_id: &AppId) -> bool {
		self.credentials.remove(app_id).is_some()
	}

	pub(crate) fn insert_subject(
		&mut self,
		subject: &SubjectId,
		added_by: &str,
		now: OffsetDateTime,
	) -> bool {
		if self.whitelist.contains_key(subject) {
			return false;
		}

		self.whitelist.insert(
			subject.clone(),
			WhitelistEntry { subject: subject.clone(), added_by: added_by.to_owned(), added_at: now },
		);

		true
	}

	pub(crate) fn delete_subject(&mut self, subject: &SubjectId) -> bool {
		self.whitelist.remove(subject).is_some()
	}
}

type StoreMap = Arc<RwLock<Tables>>;

/// Thread-safe storage backend that keeps both tables in-process.
///
/// [`MemoryStore::set_unavailable`] makes every subsequent call fail with
/// [`StoreError::Unavailable`], which lets callers exercise degraded-refresh paths.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
	tables: StoreMap,
	unavailable: Arc<AtomicBool>,
}
impl MemoryStore {
	/// Toggles simulated backend outages.
	pub fn set_unavailable(&self, unavailable: bool) {
		self.unavailable.store(unavailable, Ordering::Relaxed);
	}

	fn check(&self) -> Result<(), StoreError> {
		if self.unavailable.load(Ordering::Relaxed) {
			Err(StoreError::Unavailable { message: "memory store marked unavailable".into() })
		} else {
			Ok(())
		}
	}
}
impl CredentialStore for MemoryStore {
	fn list_credentials(&self) -> StoreFuture<'_, Vec<CredentialRecord>> {
		let map = self.tables.clone();

		Box::pin(async move {
			self.check()?;

			Ok(map.read().credentials.values().cloned().collect())
		})
	}

	fn upsert_credential(&self, pair: CredentialPair) -> StoreFuture<'_, ()> {
		let map = self.tables.clone();

		Box::pin(async move {
			self.check()?;
			map.write().upsert_credential(pair, OffsetDateTime::now_utc());

			Ok(())
		})
	}

	fn delete_credential<'a>(&'a self, app_id: &'a AppId) -> StoreFuture<'a, bool> {
		let map = self.tables.clone();

		Box::pin(async move {
			self.check()?;

			Ok(map.write().delete_credential(app_id))
		})
	}

	fn list_whitelist(&self) -> StoreFuture<'_, Vec<WhitelistEntry>> {
		let map = self.tables.clone();

		Box::pin(async move {
			self.check()?;

			Ok(map.read().whitelist.values().cloned().collect())
		})
	}

	fn insert_subject<'a>(
		&'a self,
		subject: &'a SubjectId,
		added_by: &'a str,
	) -> StoreFuture<'a, bool> {
		let map = self.tables.clone();

		Box::pin(async move {
			self.check()?;

			Ok(map.write().insert_subject(subject, added_by, OffsetDateTime::now_utc()))
		})
	}

	fn delete_subject<'a>(&'a self, subject: &'a SubjectId) -> StoreFuture<'a, bool> {
		let map = self.tables.clone();

		Box::pin(async move {
			self.check()?;

			Ok(map.write().delete_subject(subject))
		})
	}
}
