//! Credential store contract and the built-in store implementations.
//!
//! The store is the durable owner of two tables: the upstream credential pool and the
//! authorization whitelist. Every operation is a short, independent read or write; nothing
//! spans both tables.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{AppId, CredentialPair, SubjectId},
};

/// Boxed future returned by [`CredentialStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract for credential pairs and whitelist rows.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Returns every stored credential pair.
	fn list_credentials(&self) -> StoreFuture<'_, Vec<CredentialRecord>>;

	/// Inserts the pair, replacing any existing pair with the same app id.
	fn upsert_credential(&self, pair: CredentialPair) -> StoreFuture<'_, ()>;

	/// Deletes the pair for `app_id`, returning whether a row was removed.
	fn delete_credential<'a>(&'a self, app_id: &'a AppId) -> StoreFuture<'a, bool>;

	/// Returns every whitelisted subject.
	fn list_whitelist(&self) -> StoreFuture<'_, Vec<WhitelistEntry>>;

	/// Inserts the subject if absent, returning whether a row was added.
	fn insert_subject<'a>(
		&'a self,
		subject: &'a SubjectId,
		added_by: &'a str,
	) -> StoreFuture<'a, bool>;

	/// Deletes the subject, returning whether a row was removed.
	fn delete_subject<'a>(&'a self, subject: &'a SubjectId) -> StoreFuture<'a, bool>;
}

/// Stored credential pair plus its insertion time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
	/// The pair itself.
	pub pair: CredentialPair,
	/// When the pair was inserted or last replaced.
	pub added_at: OffsetDateTime,
}

/// Stored whitelist row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhitelistEntry {
	/// Authorized chat or user.
	pub subject: SubjectId,
	/// Who added the row (an admin id or `system`).
	pub added_by: String,
	/// When the row was inserted.
	pub added_at: OffsetDateTime,
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// The backend could not be reached or failed to complete the operation.
	#[error("Store unavailable: {message}.")]
	Unavailable {
		/// Human-readable error payload.
		message: String,
	},
}
