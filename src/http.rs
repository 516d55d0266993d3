//! Transport primitives for upstream metadata calls.
//!
//! [`UpstreamTransport`] is the access layer's only dependency on an HTTP stack. The client
//! facade hands it a fully built [`UpstreamRequest`] (absolute URL plus authentication
//! headers) and expects an [`UpstreamResponse`] for every call that produced an HTTP status,
//! successful or not. Anything short of a status line is a [`TransportError`].

// crates.io
#[cfg(feature = "reqwest")] use reqwest::header::{HeaderMap, RETRY_AFTER};
#[cfg(feature = "reqwest")] use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, error::TransportError};

/// Boxed future returned by [`UpstreamTransport::get`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<UpstreamResponse, TransportError>> + 'a + Send>>;

/// HTTP GET executor used by [`NullbrClient`](crate::client::NullbrClient).
///
/// Implementations must not retry and must not follow the status code: non-2xx responses are
/// returned as-is so the caller can classify them.
pub trait UpstreamTransport
where
	Self: 'static + Send + Sync,
{
	/// Issues a GET for `request`.
	fn get(&self, request: UpstreamRequest) -> TransportFuture<'_>;
}
impl<T> UpstreamTransport for Arc<T>
where
	T: UpstreamTransport,
{
	fn get(&self, request: UpstreamRequest) -> TransportFuture<'_> {
		(**self).get(request)
	}
}

/// Outbound GET request.
#[derive(Clone, PartialEq, Eq)]
pub struct UpstreamRequest {
	/// Absolute URL including the query string.
	pub url: Url,
	/// Header name/value pairs; values may be secrets.
	pub headers: Vec<(&'static str, String)>,
}
impl UpstreamRequest {
	/// Returns the value of `name`, if present.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers
			.iter()
			.find(|(key, _)| key.eq_ignore_ascii_case(name))
			.map(|(_, value)| value.as_str())
	}
}
impl Debug for UpstreamRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let names = self.headers.iter().map(|(name, _)| *name).collect::<Vec<_>>();

		f.debug_struct("UpstreamRequest").field("url", &self.url.path()).field("headers", &names).finish()
	}
}

/// Response captured from the upstream API.
///
/// Additional fields may be added in future releases, so downstream code should construct
/// values using field names instead of struct update syntax.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UpstreamResponse {
	/// HTTP status code.
	pub status: u16,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl UpstreamResponse {
	/// Returns true for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Upstream metadata endpoints answer directly, so any custom [`ReqwestClient`] should carry a
/// request timeout; [`ReqwestTransport::with_timeout`] builds one.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client that aborts requests after `timeout`.
	pub fn with_timeout(timeout: std::time::Duration) -> Result<Self> {
		let client = ReqwestClient::builder()
			.timeout(timeout)
			.build()
			.map_err(crate::error::ConfigError::from)?;

		Ok(Self(client))
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl UpstreamTransport for ReqwestTransport {
	fn get(&self, request: UpstreamRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			let mut builder = self.0.get(request.url);

			for (name, value) in request.headers {
				builder = builder.header(name, value);
			}

			let response = builder.send().await?;
			let status = response.status().as_u16();
			let retry_after = parse_retry_after(response.headers());
			let body = response.bytes().await?.to_vec();

			Ok::<_, TransportError>(UpstreamResponse { status, retry_after, body })
		})
	}
}

#[cfg(feature = "reqwest")]
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return i64::try_from(secs).ok().map(Duration::seconds);
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}
