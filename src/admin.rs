//! Administrative mutations over the credential store.
//!
//! Writes go to the store first; the in-memory caches are then told to reload so the next
//! credential selection or authorization check observes the change.

// self
use crate::{
	_prelude::*,
	auth::{AppId, AuthorizationCache, CredentialPair, SubjectId},
	rotator::CredentialRotator,
	store::{CredentialStore, WhitelistEntry},
};

/// `added_by` marker for rows written during bootstrap.
pub const SYSTEM_ACTOR: &str = "system";

/// What [`AccessControl::bootstrap`] changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BootstrapReport {
	/// The admin subject was newly whitelisted.
	pub admin_whitelisted: bool,
	/// The static pair was written into an empty credential table.
	pub credential_seeded: bool,
}

/// Credential listing entry; never carries the key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CredentialSummary {
	/// Application identifier.
	pub app_id: AppId,
	/// When the pair was inserted or last replaced.
	pub added_at: OffsetDateTime,
}

/// Snapshot of both store tables for an operator view.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AccessOverview {
	/// Whitelisted subjects.
	pub whitelist: Vec<WhitelistEntry>,
	/// Configured credential pairs.
	pub credentials: Vec<CredentialSummary>,
}

/// Administration surface shared by operator commands.
pub struct AccessControl {
	store: Arc<dyn CredentialStore>,
	rotator: Arc<CredentialRotator>,
	authorization: Arc<AuthorizationCache>,
	admin: Option<SubjectId>,
}
impl AccessControl {
	/// Wires the store and the caches that mirror it.
	pub fn new(
		store: Arc<dyn CredentialStore>,
		rotator: Arc<CredentialRotator>,
		authorization: Arc<AuthorizationCache>,
		admin: Option<SubjectId>,
	) -> Self {
		Self { store, rotator, authorization, admin }
	}

	/// Protected administrator subject, if configured.
	pub fn admin(&self) -> Option<&SubjectId> {
		self.admin.as_ref()
	}

	/// Returns true when `subject` is the configured administrator.
	pub fn is_admin(&self, subject: &str) -> bool {
		self.admin.as_ref().is_some_and(|admin| &**admin == subject)
	}

	/// Whitelists the admin and seeds `static_pair` into an empty credential table.
	pub async fn bootstrap(&self, static_pair: Option<&CredentialPair>) -> Result<BootstrapReport> {
		let mut report = BootstrapReport::default();

		if let Some(admin) = &self.admin {
			report.admin_whitelisted = self.store.insert_subject(admin, SYSTEM_ACTOR).await?;
		}
		if let Some(pair) = static_pair {
			if self.store.list_credentials().await?.is_empty() {
				self.store.upsert_credential(pair.clone()).await?;

				report.credential_seeded = true;
			}
		}

		tracing::info!(
			admin_whitelisted = report.admin_whitelisted,
			credential_seeded = report.credential_seeded,
			"access store bootstrapped",
		);

		if report.credential_seeded {
			self.rotator.invalidate();
		}
		if report.admin_whitelisted {
			self.authorization.force_refresh().await?;
		}

		Ok(report)
	}

	/// Inserts or replaces a credential pair.
	pub async fn add_credential(&self, pair: CredentialPair) -> Result<()> {
		let app_id = pair.app_id.clone();

		self.store.upsert_credential(pair).await?;
		self.rotator.invalidate();

		tracing::info!(app_id = %app_id, "credential pair stored");

		Ok(())
	}

	/// Deletes a credential pair, returning whether one existed.
	pub async fn remove_credential(&self, app_id: &AppId) -> Result<bool> {
		let removed = self.store.delete_credential(app_id).await?;

		self.rotator.invalidate();

		tracing::info!(app_id = %app_id, removed, "credential pair deleted");

		Ok(removed)
	}

	/// Whitelists `subject`, returning whether it was newly added.
	pub async fn authorize(&self, subject: &SubjectId, added_by: &str) -> Result<bool> {
		let added = self.store.insert_subject(subject, added_by).await?;

		self.authorization.force_refresh().await?;

		tracing::info!(subject = %subject, added, "subject whitelisted");

		Ok(added)
	}

	/// Removes `subject` from the whitelist; the admin subject is refused.
	pub async fn revoke(&self, subject: &SubjectId) -> Result<bool> {
		if self.is_admin(subject) {
			return Err(Error::ProtectedSubject { subject: subject.to_string() });
		}

		let removed = self.store.delete_subject(subject).await?;

		self.authorization.force_refresh().await?;

		tracing::info!(subject = %subject, removed, "subject revoked");

		Ok(removed)
	}

	/// Reads both tables straight from the store.
	pub async fn overview(&self) -> Result<AccessOverview> {
		let whitelist = self.store.list_whitelist().await?;
		let credentials = self
			.store
			.list_credentials()
			.await?
			.into_iter()
			.map(|record| CredentialSummary { app_id: record.pair.app_id, added_at: record.added_at })
			.collect();

		Ok(AccessOverview { whitelist, credentials })
	}
}
impl Debug for AccessControl {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AccessControl")
			.field("rotator", &self.rotator)
			.field("authorization", &self.authorization)
			.field("admin", &self.admin)
			.finish()
	}
}
