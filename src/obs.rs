//! Observability for upstream calls: the in-process metrics aggregator, optional global
//! recorder emission, and tracing spans.
//!
//! # Feature Flags
//!
//! - Spans named `nullbr.request` carry the `mode` and `endpoint` fields for every call.
//! - Enable `metrics` to additionally mirror every [`MetricEvent`] into the global `metrics`
//!   recorder (`nullbr_upstream_requests_total`, `nullbr_cache_lookups_total`,
//!   `nullbr_upstream_outcomes_total`).

mod metrics;
mod stats;
mod tracing;

pub use metrics::*;
pub use stats::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Upstream authentication modes; they decide headers, caching, and metric buckets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
	/// Side-effect-free metadata reads; `X-APP-ID` only, cache-eligible.
	Meta,
	/// Quota-consuming resource listings; both headers, never cached.
	Res,
	/// Account-scoped reads (subscription and quota); both headers, never cached.
	User,
}
impl AuthMode {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			AuthMode::Meta => "meta",
			AuthMode::Res => "res",
			AuthMode::User => "user",
		}
	}

	/// Whether the call carries the secret `X-API-KEY` header.
	pub const fn sends_api_key(self) -> bool {
		matches!(self, AuthMode::Res | AuthMode::User)
	}

	/// Whether responses may be served from the response cache.
	pub const fn is_cacheable(self) -> bool {
		matches!(self, AuthMode::Meta)
	}
}
impl Display for AuthMode {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Mutually exclusive classification of a call that reached the network.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallOutcome {
	/// 2xx response.
	Success,
	/// HTTP 429.
	RateLimited,
	/// Any other non-2xx response.
	HttpError,
	/// No response was received.
	TransportError,
}
impl CallOutcome {
	/// Classifies an HTTP status code.
	pub const fn from_status(status: u16) -> Self {
		match status {
			200..=299 => CallOutcome::Success,
			429 => CallOutcome::RateLimited,
			_ => CallOutcome::HttpError,
		}
	}

	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CallOutcome::Success => "success",
			CallOutcome::RateLimited => "rate_limited",
			CallOutcome::HttpError => "http_error",
			CallOutcome::TransportError => "transport_error",
		}
	}
}
impl Display for CallOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
