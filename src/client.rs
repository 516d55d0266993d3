//! Upstream client facade: every Nullbr call passes through credential selection, the
//! response cache, the concurrency governor, and the metrics aggregator.
//!
//! Call order per request:
//!
//! 1. [`CredentialRotator::select_credential`] picks a pair.
//! 2. The request is counted under its [`AuthMode`].
//! 3. [`AuthMode::Meta`] calls consult the [`ResponseCache`]; a hit ends the call here.
//! 4. The network call runs inside [`ConcurrencyGovernor::run_guarded`] and is timed.
//! 5. The outcome is classified and recorded, then the body is decoded as JSON.

// std
use std::time::Instant;
// self
use crate::{
	_prelude::*,
	auth::CredentialPair,
	cache::{QueryParams, ResponseCache},
	config::AccessConfig,
	error::ConfigError,
	governor::ConcurrencyGovernor,
	http::{UpstreamRequest, UpstreamResponse, UpstreamTransport},
	obs::{AccessMetrics, AuthMode, CallOutcome, CallSpan, MetricEvent, MetricsView},
	rotator::CredentialRotator,
};

/// Default upstream base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.nullbr.eu.org";
/// Header carrying the application id on every call.
pub const APP_ID_HEADER: &str = "X-APP-ID";
/// Header carrying the secret key on `res` and `user` calls.
pub const API_KEY_HEADER: &str = "X-API-KEY";

/// Client facade over a pluggable [`UpstreamTransport`].
pub struct NullbrClient<T>
where
	T: UpstreamTransport,
{
	base_url: Url,
	transport: T,
	rotator: Arc<CredentialRotator>,
	cache: ResponseCache,
	governor: ConcurrencyGovernor,
	metrics: Arc<AccessMetrics>,
}
impl<T> NullbrClient<T>
where
	T: UpstreamTransport,
{
	/// Creates a client with default cache and concurrency limits.
	pub fn new(
		base_url: Url,
		transport: T,
		rotator: Arc<CredentialRotator>,
		metrics: Arc<AccessMetrics>,
	) -> Self {
		Self {
			base_url,
			transport,
			rotator,
			cache: ResponseCache::new(
				ResponseCache::<serde_json::Value>::DEFAULT_TTL,
				ResponseCache::<serde_json::Value>::DEFAULT_CAPACITY,
				metrics.clone(),
			),
			governor: ConcurrencyGovernor::default(),
			metrics,
		}
	}

	/// Creates a client using the limits and base URL from `config`.
	pub fn from_config(
		config: &AccessConfig,
		transport: T,
		rotator: Arc<CredentialRotator>,
		metrics: Arc<AccessMetrics>,
	) -> Result<Self> {
		let base_url = parse_base_url(&config.base_url)?;

		Ok(Self::new(base_url, transport, rotator, metrics)
			.with_cache(config.meta_cache_ttl, config.meta_cache_max)
			.with_concurrency(config.api_max_concurrency))
	}

	/// Replaces the response cache with one using `ttl` and `capacity`.
	pub fn with_cache(mut self, ttl: Duration, capacity: usize) -> Self {
		self.cache = ResponseCache::new(ttl, capacity, self.metrics.clone());

		self
	}

	/// Replaces the concurrency governor with one admitting `limit` calls.
	pub fn with_concurrency(mut self, limit: usize) -> Self {
		self.governor = ConcurrencyGovernor::new(limit);

		self
	}

	/// Rotator shared with the administration surface.
	pub fn rotator(&self) -> &Arc<CredentialRotator> {
		&self.rotator
	}

	/// Metrics aggregator shared with the reporter.
	pub fn metrics(&self) -> &Arc<AccessMetrics> {
		&self.metrics
	}

	/// Governor bounding network calls.
	pub fn governor(&self) -> &ConcurrencyGovernor {
		&self.governor
	}

	/// Point-in-time metrics, optionally resetting the counters.
	pub fn metrics_snapshot(&self, reset: bool) -> MetricsView {
		MetricsView { meta_cache_size: self.cache.len(), ..self.metrics.snapshot(reset) }
	}

	/// Number of response bodies currently cached.
	pub fn cache_len(&self) -> usize {
		self.cache.len()
	}

	/// Issues one upstream call for `endpoint` in `mode`.
	///
	/// No retry happens here; [`Error::is_transient`] tells the caller whether one makes sense.
	pub async fn request(
		&self,
		endpoint: &str,
		mode: AuthMode,
		params: QueryParams,
	) -> Result<serde_json::Value> {
		let span = CallSpan::new(mode, endpoint);

		span.instrument(async {
			let pair = self.rotator.select_credential().await?;

			self.metrics.record(MetricEvent::Request(mode));

			if mode.is_cacheable() {
				self.cache
					.get_or_fetch(endpoint, &params, || self.fetch(endpoint, mode, &params, &pair, &span))
					.await
			} else {
				self.fetch(endpoint, mode, &params, &pair, &span).await
			}
		})
		.await
	}

	/// Searches movies, shows, people, and collections.
	pub async fn search(&self, query: &str, page: u32) -> Result<serde_json::Value> {
		let params = QueryParams::new().with("query", query).with("page", page);

		self.request("/search", AuthMode::Meta, params).await
	}

	/// Movie metadata by TMDB id.
	pub async fn movie(&self, tmdb_id: u64) -> Result<serde_json::Value> {
		self.meta(format!("/movie/{tmdb_id}")).await
	}

	/// TV show metadata by TMDB id.
	pub async fn tv(&self, tmdb_id: u64) -> Result<serde_json::Value> {
		self.meta(format!("/tv/{tmdb_id}")).await
	}

	/// Person metadata by TMDB id.
	pub async fn person(&self, tmdb_id: u64) -> Result<serde_json::Value> {
		self.meta(format!("/person/{tmdb_id}")).await
	}

	/// Collection metadata by TMDB id.
	pub async fn collection(&self, tmdb_id: u64) -> Result<serde_json::Value> {
		self.meta(format!("/collection/{tmdb_id}")).await
	}

	/// 115 cloud-drive resources for a movie.
	pub async fn movie_115(&self, tmdb_id: u64) -> Result<serde_json::Value> {
		self.res(format!("/movie/{tmdb_id}/115")).await
	}

	/// Magnet resources for a movie.
	pub async fn movie_magnet(&self, tmdb_id: u64) -> Result<serde_json::Value> {
		self.res(format!("/movie/{tmdb_id}/magnet")).await
	}

	/// 115 cloud-drive resources for a TV show.
	pub async fn tv_115(&self, tmdb_id: u64) -> Result<serde_json::Value> {
		self.res(format!("/tv/{tmdb_id}/115")).await
	}

	/// Magnet resources for a whole season.
	pub async fn tv_season_magnet(&self, tmdb_id: u64, season: u32) -> Result<serde_json::Value> {
		self.res(format!("/tv/{tmdb_id}/season/{season}/magnet")).await
	}

	/// Magnet resources for a single episode.
	pub async fn tv_episode_magnet(
		&self,
		tmdb_id: u64,
		season: u32,
		episode: u32,
	) -> Result<serde_json::Value> {
		self.res(format!("/tv/{tmdb_id}/season/{season}/episode/{episode}/magnet")).await
	}

	/// Subscription and quota information for the selected credential's account.
	pub async fn user_info(&self) -> Result<serde_json::Value> {
		self.request("/user/info", AuthMode::User, QueryParams::new()).await
	}

	async fn meta(&self, endpoint: String) -> Result<serde_json::Value> {
		self.request(&endpoint, AuthMode::Meta, QueryParams::new()).await
	}

	async fn res(&self, endpoint: String) -> Result<serde_json::Value> {
		self.request(&endpoint, AuthMode::Res, QueryParams::new()).await
	}

	async fn fetch(
		&self,
		endpoint: &str,
		mode: AuthMode,
		params: &QueryParams,
		pair: &CredentialPair,
		span: &CallSpan,
	) -> Result<serde_json::Value> {
		let request = build_request(&self.base_url, endpoint, mode, params, pair)?;
		let (response, latency) = self
			.governor
			.run_guarded(|| async {
				let started = Instant::now();
				let response = self.transport.get(request).await;

				(response, started.elapsed())
			})
			.await;
		let outcome = match &response {
			Ok(response) => CallOutcome::from_status(response.status),
			Err(_) => CallOutcome::TransportError,
		};

		self.metrics.record(MetricEvent::Completed { outcome, latency });
		span.record_outcome(outcome.as_str());

		let response = response.inspect_err(|e| {
			tracing::warn!(error = %e, "upstream transport failed");
		})?;

		decode(endpoint, response)
	}
}
impl<T> Debug for NullbrClient<T>
where
	T: UpstreamTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("NullbrClient")
			.field("base_url", &self.base_url.as_str())
			.field("rotator", &self.rotator)
			.field("cache_len", &self.cache.len())
			.field("governor", &self.governor)
			.finish()
	}
}

/// Parses the configured base URL, keeping any path prefix it carries.
pub fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
	Ok(Url::parse(raw.trim_end_matches('/'))?)
}

fn build_request(
	base_url: &Url,
	endpoint: &str,
	mode: AuthMode,
	params: &QueryParams,
	pair: &CredentialPair,
) -> Result<UpstreamRequest> {
	let mut url = Url::parse(&format!("{}{endpoint}", base_url.as_str().trim_end_matches('/')))
		.map_err(ConfigError::from)?;

	if !params.is_empty() {
		url.query_pairs_mut().extend_pairs(params.iter());
	}

	let mut headers = vec![(APP_ID_HEADER, pair.app_id.to_string())];

	if mode.sends_api_key() {
		headers.push((API_KEY_HEADER, pair.api_key.expose().to_owned()));
	}

	Ok(UpstreamRequest { url, headers })
}

fn decode(endpoint: &str, response: UpstreamResponse) -> Result<serde_json::Value> {
	if !response.is_success() {
		tracing::warn!(status = response.status, endpoint, "upstream returned an error status");

		return Err(Error::UpstreamHttp {
			endpoint: endpoint.to_owned(),
			status: response.status,
			retry_after: response.retry_after,
		});
	}

	let mut deserializer = serde_json::Deserializer::from_slice(&response.body);

	serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| Error::Decode { endpoint: endpoint.to_owned(), source })
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn pair() -> CredentialPair {
		CredentialPair::parse("app-1", "key-1").expect("Pair fixture should parse.")
	}

	fn base() -> Url {
		parse_base_url("https://api.example.test/").expect("Base URL fixture should parse.")
	}

	#[test]
	fn meta_requests_omit_the_api_key() {
		let request = build_request(&base(), "/movie/1", AuthMode::Meta, &QueryParams::new(), &pair())
			.expect("Request should build.");

		assert_eq!(request.url.as_str(), "https://api.example.test/movie/1");
		assert_eq!(request.header(APP_ID_HEADER), Some("app-1"));
		assert_eq!(request.header(API_KEY_HEADER), None);
	}

	#[test]
	fn res_and_user_requests_carry_both_headers() {
		for mode in [AuthMode::Res, AuthMode::User] {
			let request = build_request(&base(), "/user/info", mode, &QueryParams::new(), &pair())
				.expect("Request should build.");

			assert_eq!(request.header(API_KEY_HEADER), Some("key-1"));
		}
	}

	#[test]
	fn query_params_are_encoded_and_prefix_paths_kept() {
		let base = parse_base_url("https://proxy.example.test/nullbr").expect("URL should parse.");
		let params = QueryParams::new().with("query", "star wars").with("page", 2);
		let request = build_request(&base, "/search", AuthMode::Meta, &params, &pair())
			.expect("Request should build.");

		assert_eq!(request.url.path(), "/nullbr/search");
		assert_eq!(request.url.query(), Some("query=star+wars&page=2"));
	}

	#[test]
	fn decode_classifies_status_and_body() {
		let limited = UpstreamResponse {
			status: 429,
			retry_after: Some(Duration::seconds(3)),
			body: Vec::new(),
		};

		assert!(decode("/search", limited).expect_err("429 should fail.").is_rate_limited());

		let garbage = UpstreamResponse { status: 200, retry_after: None, body: b"<html>".to_vec() };

		assert!(matches!(decode("/search", garbage), Err(Error::Decode { .. })));

		let ok = UpstreamResponse { status: 200, retry_after: None, body: br#"{"ok":true}"#.to_vec() };

		assert_eq!(
			decode("/search", ok).expect("JSON body should decode."),
			serde_json::json!({ "ok": true }),
		);
	}
}
