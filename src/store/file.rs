//! Simple file-backed [`CredentialStore`] for single-process bot deployments.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::{AppId, CredentialPair, SubjectId},
	store::{
		CredentialRecord, CredentialStore, StoreError, StoreFuture, WhitelistEntry,
		memory::Tables,
	},
};

/// On-disk layout; rows are stored as lists so the file stays readable.
#[derive(Default, Serialize, Deserialize)]
struct Snapshot {
	credentials: Vec<CredentialRecord>,
	whitelist: Vec<WhitelistEntry>,
}
impl From<&Tables> for Snapshot {
	fn from(tables: &Tables) -> Self {
		Self {
			credentials: tables.credentials.values().cloned().collect(),
			whitelist: tables.whitelist.values().cloned().collect(),
		}
	}
}
impl From<Snapshot> for Tables {
	fn from(snapshot: Snapshot) -> Self {
		Self {
			credentials: snapshot
				.credentials
				.into_iter()
				.map(|record| (record.pair.app_id.clone(), record))
				.collect(),
			whitelist: snapshot
				.whitelist
				.into_iter()
				.map(|entry| (entry.subject.clone(), entry))
				.collect(),
		}
	}
}

/// Persists both tables to a JSON file after each mutation.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<Tables>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let tables = Self::load_snapshot(&path)?.into();

		Ok(Self { path, inner: Arc::new(RwLock::new(tables)) })
	}

	/// Location of the backing file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_snapshot(path: &Path) -> Result<Snapshot, StoreError> {
		if !path.exists() {
			return Ok(Snapshot::default());
		}

		let metadata = path.metadata().map_err(|e| StoreError::Unavailable {
			message: format!("Failed to inspect {}: {e}", path.display()),
		})?;

		if metadata.len() == 0 {
			return Ok(Snapshot::default());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Unavailable {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse {}: {e}", path.display()),
		})
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Unavailable {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}
		Ok(())
	}

	fn persist_locked(&self, tables: &Tables) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let serialized = serde_json::to_vec_pretty(&Snapshot::from(tables)).map_err(|e| {
			StoreError::Serialization { message: format!("Failed to serialize store snapshot: {e}") }
		})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Unavailable {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Unavailable {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Unavailable {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Unavailable {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}

	/// Applies `mutate` under the write lock and persists when it reports a change.
	fn mutate<T>(&self, mutate: impl FnOnce(&mut Tables) -> (T, bool)) -> Result<T, StoreError> {
		let mut guard = self.inner.write();
		let (value, changed) = mutate(&mut guard);

		if changed {
			self.persist_locked(&guard)?;
		}

		Ok(value)
	}
}
impl CredentialStore for FileStore {
	fn list_credentials(&self) -> StoreFuture<'_, Vec<CredentialRecord>> {
		Box::pin(async move { Ok(self.inner.read().credentials.values().cloned().collect()) })
	}

	fn upsert_credential(&self, pair: CredentialPair) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			self.mutate(|tables| {
				tables.upsert_credential(pair, OffsetDateTime::now_utc());

				((), true)
			})
		})
	}

	fn delete_credential<'a>(&'a self, app_id: &'a AppId) -> StoreFuture<'a, bool> {
		Box::pin(async move {
			self.mutate(|tables| {
				let removed = tables.delete_credential(app_id);

				(removed, removed)
			})
		})
	}

	fn list_whitelist(&self) -> StoreFuture<'_, Vec<WhitelistEntry>> {
		Box::pin(async move { Ok(self.inner.read().whitelist.values().cloned().collect()) })
	}

	fn insert_subject<'a>(
		&'a self,
		subject: &'a SubjectId,
		added_by: &'a str,
	) -> StoreFuture<'a, bool> {
		Box::pin(async move {
			self.mutate(|tables| {
				let added = tables.insert_subject(subject, added_by, OffsetDateTime::now_utc());

				(added, added)
			})
		})
	}

	fn delete_subject<'a>(&'a self, subject: &'a SubjectId) -> StoreFuture<'a, bool> {
		Box::pin(async move {
			self.mutate(|tables| {
				let removed = tables.delete_subject(subject);

				(removed, removed)
			})
		})
	}
}
