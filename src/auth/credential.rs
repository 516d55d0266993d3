//! Upstream credential pairs and the redacted API key wrapper.

// self
use crate::{_prelude::*, auth::AppId};

/// Redacted API key wrapper keeping secret material out of logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKey(String);
impl ApiKey {
	/// Wraps a new key string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner key value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for ApiKey {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for ApiKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("ApiKey").field(&"<redacted>").finish()
	}
}
impl Display for ApiKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// One `(app id, api key)` pair authorizing calls against a single upstream account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
	/// Application identifier, sent on every call.
	pub app_id: AppId,
	/// Secret key, sent only on quota-consuming calls.
	pub api_key: ApiKey,
}
impl CredentialPair {
	/// Builds a pair from a validated app id and a raw key.
	pub fn new(app_id: AppId, api_key: impl Into<String>) -> Self {
		Self { app_id, api_key: ApiKey::new(api_key) }
	}

	/// Validates both halves from raw strings.
	pub fn parse(app_id: impl AsRef<str>, api_key: impl Into<String>) -> Result<Self> {
		Ok(Self::new(AppId::new(app_id)?, api_key))
	}
}
