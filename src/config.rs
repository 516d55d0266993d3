//! Environment-driven configuration for the access layer.
//!
//! Every knob has a default; [`AccessConfig::from_env`] overrides them from process
//! variables and fails fast on values that do not parse. Durations are whole seconds.

// std
use std::time::Duration as StdDuration;
// self
use crate::{
	_prelude::*,
	auth::{AuthorizationCache, CredentialPair, SubjectId},
	cache::ResponseCache,
	client::{self, DEFAULT_BASE_URL},
	error::ConfigError,
	governor::ConcurrencyGovernor,
	rotator::CredentialRotator,
	session::SearchSessionStore,
	store::CredentialStore,
};

/// Resolved access-layer settings.
#[derive(Clone, Debug, PartialEq)]
pub struct AccessConfig {
	/// Upstream base URL (`NULLBR_BASE_URL`), validated on load.
	pub base_url: String,
	/// Per-request timeout (`API_TIMEOUT`).
	pub api_timeout: StdDuration,
	/// Credential snapshot TTL (`CREDENTIALS_CACHE_TTL`).
	pub credentials_cache_ttl: Duration,
	/// Response cache TTL (`META_CACHE_TTL`).
	pub meta_cache_ttl: Duration,
	/// Response cache capacity (`META_CACHE_MAX`).
	pub meta_cache_max: usize,
	/// Concurrent upstream calls (`API_MAX_CONCURRENCY`).
	pub api_max_concurrency: usize,
	/// Whitelist cache TTL (`AUTH_CACHE_TTL`).
	pub auth_cache_ttl: Duration,
	/// Search session idle timeout (`SEARCH_SESSION_TTL`).
	pub search_session_ttl: Duration,
	/// Search session capacity (`SEARCH_SESSION_MAX`).
	pub search_session_max: usize,
	/// Metrics reporter period (`METRICS_REPORT_INTERVAL`); `0` disables the reporter.
	pub metrics_report_interval: Option<StdDuration>,
	/// Fallback pair (`X_APP_ID`/`NULLBR_APP_ID` and `X_API_KEY`/`NULLBR_API_KEY`).
	pub static_credential: Option<CredentialPair>,
	/// Protected administrator subject (`ADMIN_ID`).
	pub admin_subject: Option<SubjectId>,
}
impl AccessConfig {
	/// Default per-request timeout.
	pub const DEFAULT_API_TIMEOUT: StdDuration = StdDuration::from_secs(20);
	/// Default metrics reporter period.
	pub const DEFAULT_REPORT_INTERVAL: StdDuration = StdDuration::from_secs(300);

	/// Reads overrides from the process environment.
	pub fn from_env() -> Result<Self> {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Reads overrides through `lookup`, which returns the raw value for a variable name.
	///
	/// Blank values count as unset.
	pub fn from_lookup<F>(lookup: F) -> Result<Self>
	where
		F: Fn(&str) -> Option<String>,
	{
		let get = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());
		let mut config = Self::default();

		if let Some(raw) = get("NULLBR_BASE_URL") {
			config.base_url = client::parse_base_url(&raw)?.into();
		}
		if let Some(secs) = parse_opt::<u64>("API_TIMEOUT", get("API_TIMEOUT"))? {
			config.api_timeout = StdDuration::from_secs(secs.max(1));
		}
		if let Some(ttl) = parse_seconds("CREDENTIALS_CACHE_TTL", get("CREDENTIALS_CACHE_TTL"))? {
			config.credentials_cache_ttl = ttl;
		}
		if let Some(ttl) = parse_seconds("META_CACHE_TTL", get("META_CACHE_TTL"))? {
			config.meta_cache_ttl = ttl;
		}
		if let Some(max) = parse_opt("META_CACHE_MAX", get("META_CACHE_MAX"))? {
			config.meta_cache_max = max;
		}
		if let Some(limit) = parse_opt("API_MAX_CONCURRENCY", get("API_MAX_CONCURRENCY"))? {
			config.api_max_concurrency = limit;
		}
		if let Some(ttl) = parse_seconds("AUTH_CACHE_TTL", get("AUTH_CACHE_TTL"))? {
			config.auth_cache_ttl = ttl;
		}
		if let Some(ttl) = parse_seconds("SEARCH_SESSION_TTL", get("SEARCH_SESSION_TTL"))? {
			config.search_session_ttl = ttl;
		}
		if let Some(max) = parse_opt("SEARCH_SESSION_MAX", get("SEARCH_SESSION_MAX"))? {
			config.search_session_max = max;
		}
		if let Some(secs) =
			parse_opt::<u64>("METRICS_REPORT_INTERVAL", get("METRICS_REPORT_INTERVAL"))?
		{
			config.metrics_report_interval = (secs > 0).then_some(StdDuration::from_secs(secs));
		}

		let app_id = get("X_APP_ID").or_else(|| get("NULLBR_APP_ID"));
		let api_key = get("X_API_KEY").or_else(|| get("NULLBR_API_KEY"));

		config.static_credential = match (app_id, api_key) {
			(Some(app_id), Some(api_key)) => Some(CredentialPair::parse(app_id, api_key)?),
			(None, None) => None,
			_ => return Err(ConfigError::IncompleteStaticCredential.into()),
		};

		if let Some(raw) = get("ADMIN_ID") {
			config.admin_subject = Some(SubjectId::new(raw)?);
		}

		Ok(config)
	}

	/// Overrides the upstream base URL.
	pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
		self.base_url = base_url.into();

		self
	}

	/// Overrides the fallback credential pair.
	pub fn with_static_credential(mut self, pair: Option<CredentialPair>) -> Self {
		self.static_credential = pair;

		self
	}

	/// Overrides the protected administrator subject.
	pub fn with_admin_subject(mut self, subject: Option<SubjectId>) -> Self {
		self.admin_subject = subject;

		self
	}

	/// Overrides the response cache limits.
	pub fn with_meta_cache(mut self, ttl: Duration, capacity: usize) -> Self {
		self.meta_cache_ttl = ttl;
		self.meta_cache_max = capacity;

		self
	}

	/// Overrides the concurrency ceiling.
	pub fn with_api_max_concurrency(mut self, limit: usize) -> Self {
		self.api_max_concurrency = limit;

		self
	}

	/// Builds a rotator over `store` honoring the TTL and static fallback.
	pub fn rotator(&self, store: Arc<dyn CredentialStore>) -> CredentialRotator {
		CredentialRotator::new(store)
			.with_ttl(self.credentials_cache_ttl)
			.with_fallback(self.static_credential.clone())
	}

	/// Builds a whitelist cache over `store` honoring the TTL.
	pub fn authorization_cache(
		&self,
		store: Arc<dyn CredentialStore>,
	) -> AuthorizationCache {
		AuthorizationCache::new(store).with_ttl(self.auth_cache_ttl)
	}

	/// Builds an empty search session store honoring the limits.
	pub fn session_store(&self) -> SearchSessionStore {
		SearchSessionStore::new(self.search_session_ttl, self.search_session_max)
	}
}
impl Default for AccessConfig {
	fn default() -> Self {
		Self {
			base_url: DEFAULT_BASE_URL.into(),
			api_timeout: Self::DEFAULT_API_TIMEOUT,
			credentials_cache_ttl: CredentialRotator::DEFAULT_TTL,
			meta_cache_ttl: ResponseCache::<serde_json::Value>::DEFAULT_TTL,
			meta_cache_max: ResponseCache::<serde_json::Value>::DEFAULT_CAPACITY,
			api_max_concurrency: ConcurrencyGovernor::DEFAULT_LIMIT,
			auth_cache_ttl: AuthorizationCache::DEFAULT_TTL,
			search_session_ttl: SearchSessionStore::DEFAULT_TTL,
			search_session_max: SearchSessionStore::DEFAULT_CAPACITY,
			metrics_report_interval: Some(Self::DEFAULT_REPORT_INTERVAL),
			static_credential: None,
			admin_subject: None,
		}
	}
}

fn parse_opt<T>(key: &'static str, raw: Option<String>) -> Result<Option<T>, ConfigError>
where
	T: FromStr,
{
	raw.map(|value| value.parse().map_err(|_| ConfigError::InvalidValue { key, value }))
		.transpose()
}

fn parse_seconds(key: &'static str, raw: Option<String>) -> Result<Option<Duration>, ConfigError> {
	Ok(parse_opt::<u32>(key, raw)?.map(|secs| Duration::seconds(secs.into())))
}
