//! Access-layer error types shared across the rotator, caches, stores, and upstream client.

// self
use crate::_prelude::*;

/// Access-layer result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical access-layer error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Credential store failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Identifier validation failure.
	#[error(transparent)]
	Identifier(#[from] crate::auth::IdentifierError),
	/// Transport failure (DNS, TCP, TLS, timeout); no response was received.
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Neither the credential store nor the static configuration yielded a credential pair.
	#[error("No upstream credentials are available; authentication is unavailable.")]
	NoCredentialsAvailable,
	/// Upstream answered with a non-2xx status.
	#[error("Upstream returned HTTP {status} for {endpoint}.")]
	UpstreamHttp {
		/// Endpoint path that failed.
		endpoint: String,
		/// HTTP status code.
		status: u16,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Upstream answered 2xx with a body that is not valid JSON.
	#[error("Upstream returned malformed JSON for {endpoint}.")]
	Decode {
		/// Endpoint path whose body failed to parse.
		endpoint: String,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// The subject is protected and cannot be removed from the whitelist.
	#[error("Subject {subject} is protected and cannot be revoked.")]
	ProtectedSubject {
		/// Protected subject identifier.
		subject: String,
	},
	/// The background metrics reporter could not be joined.
	#[cfg(feature = "reporter")]
	#[error("Metrics reporter task failed to join.")]
	Reporter(#[source] tokio::task::JoinError),
}
impl Error {
	/// Returns true when upstream rejected the call with HTTP 429.
	pub fn is_rate_limited(&self) -> bool {
		matches!(self, Self::UpstreamHttp { status: 429, .. })
	}

	/// Returns true for failures the caller may reasonably retry later.
	///
	/// The access layer itself never retries.
	pub fn is_transient(&self) -> bool {
		match self {
			Self::Transport(_) => true,
			Self::UpstreamHttp { status, .. } => *status == 429 || *status >= 500,
			_ => false,
		}
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Base URL cannot be parsed or joined with an endpoint.
	#[error("Upstream URL is invalid.")]
	InvalidUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// An environment variable carries a value that cannot be parsed.
	#[error("Environment variable `{key}` has an invalid value: {value}.")]
	InvalidValue {
		/// Variable name.
		key: &'static str,
		/// Raw value that failed to parse.
		value: String,
	},
	/// Only one half of the static credential pair was configured.
	#[error("Static credential requires both an app id and an api key.")]
	IncompleteStaticCredential,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<url::ParseError> for ConfigError {
	fn from(source: url::ParseError) -> Self {
		Self::InvalidUrl { source }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO, timeout).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the upstream API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The request did not complete before the configured timeout.
	#[error("Upstream API call timed out.")]
	Timeout,
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the upstream API.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::Timeout } else { Self::network(e) }
	}
}
