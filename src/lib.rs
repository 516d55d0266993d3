//! Stateful access layer for the Nullbr metadata API: rotating credential pools, TTL response
//! caching, bounded upstream concurrency, whitelist and search-session caches in one crate.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod admin;
pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod governor;
pub mod http;
pub mod obs;
#[cfg(feature = "reporter")] pub mod reporter;
pub mod rotator;
pub mod session;
pub mod store;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::CredentialPair,
		client::{self, NullbrClient},
		http::ReqwestTransport,
		obs::AccessMetrics,
		rotator::CredentialRotator,
		store::{CredentialStore, MemoryStore},
	};

	/// Client type alias used by reqwest-backed integration tests.
	pub type ReqwestTestClient = NullbrClient<ReqwestTransport>;

	/// Builds a reqwest transport with a short timeout for mock-server tests.
	pub fn test_reqwest_transport() -> ReqwestTransport {
		ReqwestTransport::with_timeout(std::time::Duration::from_secs(5))
			.expect("Failed to build Reqwest transport for tests.")
	}

	/// Parses a credential pair fixture.
	pub fn test_pair(app_id: &str, api_key: &str) -> CredentialPair {
		CredentialPair::parse(app_id, api_key).expect("Credential fixture should be valid.")
	}

	/// Creates an in-memory store holding `pairs`.
	pub async fn seeded_store(pairs: &[(&str, &str)]) -> Arc<MemoryStore> {
		let store = Arc::new(MemoryStore::default());

		for (app_id, api_key) in pairs {
			store
				.upsert_credential(test_pair(app_id, api_key))
				.await
				.expect("Seeding the memory store should succeed.");
		}

		store
	}

	/// Constructs a [`NullbrClient`] pointed at `base_url` and backed by `store`.
	pub fn build_reqwest_test_client(base_url: &str, store: Arc<MemoryStore>) -> ReqwestTestClient {
		let store: Arc<dyn CredentialStore> = store;
		let rotator = Arc::new(CredentialRotator::new(store));
		let base_url = client::parse_base_url(base_url).expect("Mock server URL should parse.");

		NullbrClient::new(base_url, test_reqwest_transport(), rotator, Arc::new(AccessMetrics::default()))
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap, HashSet},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		hash::{Hash, Hasher},
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
