//! Request fingerprints used to address response cache entries.

// std
use std::sync::OnceLock;
// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD_NO_PAD};
use sha2::{Digest, Sha256};
// self
use crate::_prelude::*;

const DIGEST_TAG_LEN: usize = 12;

/// Ordered list of query parameters attached to an upstream request.
///
/// Insertion order is preserved for the wire; [`Fingerprint`] sorts independently.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, String)>);
impl QueryParams {
	/// Creates an empty parameter list.
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends a parameter.
	pub fn with(mut self, key: impl Into<String>, value: impl Display) -> Self {
		self.0.push((key.into(), value.to_string()));

		self
	}

	/// Returns true when no parameters are present.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Iterator over `(key, value)` pairs in insertion order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
	}
}
impl<K, V> FromIterator<(K, V)> for QueryParams
where
	K: Into<String>,
	V: Into<String>,
{
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
	}
}

/// Deterministic cache key: the endpoint plus every parameter, sorted by key.
///
/// The canonical form is `endpoint` for parameterless requests and
/// `endpoint?k1=v1&k2=v2` otherwise, so parameter sets that differ only in order collide.
#[derive(Clone)]
pub struct Fingerprint {
	canonical: String,
	digest_cache: OnceLock<String>,
}
impl Fingerprint {
	/// Builds the fingerprint for `endpoint` and `params`.
	pub fn new(endpoint: &str, params: &QueryParams) -> Self {
		Self { canonical: canonicalize(endpoint, params), digest_cache: OnceLock::new() }
	}

	/// Canonical string form.
	pub fn as_str(&self) -> &str {
		&self.canonical
	}

	/// Short base64 SHA-256 tag of the canonical form, safe to put in log fields.
	pub fn digest(&self) -> &str {
		self.digest_cache.get_or_init(|| {
			let digest = Sha256::digest(self.canonical.as_bytes());
			let mut tag = STANDARD_NO_PAD.encode(digest);

			tag.truncate(DIGEST_TAG_LEN);

			tag
		})
	}
}
impl PartialEq for Fingerprint {
	fn eq(&self, other: &Self) -> bool {
		self.canonical == other.canonical
	}
}
impl Eq for Fingerprint {}
impl Hash for Fingerprint {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.canonical.hash(state);
	}
}
impl Debug for Fingerprint {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("Fingerprint").field(&self.digest()).finish()
	}
}
impl Display for Fingerprint {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.canonical)
	}
}

fn canonicalize(endpoint: &str, params: &QueryParams) -> String {
	if params.is_empty() {
		return endpoint.to_owned();
	}

	let mut pairs: Vec<_> = params.iter().collect();

	pairs.sort();

	let mut buf = String::with_capacity(endpoint.len() + pairs.len() * 16);

	buf.push_str(endpoint);
	buf.push('?');

	for (idx, (k, v)) in pairs.into_iter().enumerate() {
		if idx > 0 {
			buf.push('&');
		}

		buf.push_str(k);
		buf.push('=');
		buf.push_str(v);
	}

	buf
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn parameter_order_does_not_matter() {
		let a = QueryParams::new().with("query", "batman").with("page", 2);
		let b = QueryParams::new().with("page", 2).with("query", "batman");
		let fa = Fingerprint::new("/search", &a);
		let fb = Fingerprint::new("/search", &b);

		assert_eq!(fa, fb);
		assert_eq!(fa.as_str(), "/search?page=2&query=batman");
		assert_eq!(fa.digest(), fb.digest());
	}

	#[test]
	fn parameterless_fingerprint_is_endpoint() {
		let fingerprint = Fingerprint::new("/movie/1726", &QueryParams::new());

		assert_eq!(fingerprint.as_str(), "/movie/1726");
	}

	#[test]
	fn every_parameter_participates() {
		let base = QueryParams::new().with("query", "batman");
		let extended = base.clone().with("page", 1);

		assert_ne!(Fingerprint::new("/search", &base), Fingerprint::new("/search", &extended));
		assert_ne!(
			Fingerprint::new("/search", &base),
			Fingerprint::new("/search", &QueryParams::new().with("query", "superman")),
		);
	}

	#[test]
	fn debug_shows_digest_only() {
		let fingerprint =
			Fingerprint::new("/search", &QueryParams::new().with("query", "private words"));
		let rendered = format!("{fingerprint:?}");

		assert!(!rendered.contains("private"));
		assert_eq!(fingerprint.digest().len(), DIGEST_TAG_LEN);
	}
}
