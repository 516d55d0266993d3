//! Ephemeral, token-addressed search sessions with sliding idle expiry.
//!
//! A [`SessionToken`] is a bearer capability: whoever presents it may read or mutate the
//! session. Tokens are drawn from the thread-local CSPRNG and never derived from counters.

// std
use std::borrow::Borrow;
// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
// self
use crate::{_prelude::*, cache::TtlMap};

const TOKEN_BYTES: usize = 16;

/// Opaque session handle; `Debug` output is redacted.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionToken(String);
impl SessionToken {
	/// Mints a fresh token from 128 random bits, base64url-encoded without padding.
	pub fn generate() -> Self {
		let mut bytes = [0_u8; TOKEN_BYTES];

		rand::rng().fill_bytes(&mut bytes);

		Self(URL_SAFE_NO_PAD.encode(bytes))
	}

	/// Token text to embed in client-facing payloads.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl Borrow<str> for SessionToken {
	fn borrow(&self) -> &str {
		&self.0
	}
}
impl Debug for SessionToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("SessionToken").field(&"<redacted>").finish()
	}
}

/// Result-type filter applied to a search.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchFilter {
	/// Every media type.
	#[default]
	All,
	/// Movies only.
	Movie,
	/// TV shows only.
	Tv,
	/// People only.
	Person,
	/// Collections only.
	Collection,
}
impl SearchFilter {
	/// Returns a stable label matching the upstream `media_type` values.
	pub const fn as_str(self) -> &'static str {
		match self {
			SearchFilter::All => "all",
			SearchFilter::Movie => "movie",
			SearchFilter::Tv => "tv",
			SearchFilter::Person => "person",
			SearchFilter::Collection => "collection",
		}
	}

	/// Whether an item with upstream `media_type` passes this filter.
	pub fn admits(self, media_type: &str) -> bool {
		self == SearchFilter::All || self.as_str() == media_type
	}
}
impl Display for SearchFilter {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for SearchFilter {
	type Err = UnknownFilter;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"all" => Ok(Self::All),
			"movie" => Ok(Self::Movie),
			"tv" => Ok(Self::Tv),
			"person" => Ok(Self::Person),
			"collection" => Ok(Self::Collection),
			other => Err(UnknownFilter(other.to_owned())),
		}
	}
}

/// Error returned when parsing an unknown [`SearchFilter`] label.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Unknown search filter `{0}`.")]
pub struct UnknownFilter(pub String);

/// In-progress search state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchSession {
	/// Handle addressing this session.
	pub token: SessionToken,
	/// Original query text.
	pub query: String,
	/// Active result filter.
	pub filter: SearchFilter,
	/// Current page, starting at 1.
	pub page: u32,
	/// Last read or mutation.
	pub last_touched: OffsetDateTime,
}

/// Session map bounded by idle time and count.
#[derive(Debug)]
pub struct SearchSessionStore {
	sessions: Mutex<TtlMap<SessionToken, SearchSession>>,
}
impl SearchSessionStore {
	/// Default idle timeout.
	pub const DEFAULT_TTL: Duration = Duration::seconds(300);
	/// Default maximum number of live sessions.
	pub const DEFAULT_CAPACITY: usize = 200;

	/// Creates an empty store.
	pub fn new(ttl: Duration, capacity: usize) -> Self {
		Self { sessions: Mutex::new(TtlMap::new(ttl, capacity)) }
	}

	/// Starts a session for `query` with the `all` filter on page 1.
	pub fn create(&self, query: impl Into<String>) -> SessionToken {
		self.create_at(query, OffsetDateTime::now_utc())
	}

	/// [`create`](Self::create) with an explicit clock reading.
	pub fn create_at(&self, query: impl Into<String>, now: OffsetDateTime) -> SessionToken {
		let token = SessionToken::generate();
		let session = SearchSession {
			token: token.clone(),
			query: query.into(),
			filter: SearchFilter::All,
			page: 1,
			last_touched: now,
		};
		let mut sessions = self.sessions.lock();
		let expired = sessions.purge_expired_at(now);
		let evicted = sessions.insert_at(token.clone(), session, now).len();

		drop(sessions);

		if expired > 0 || evicted > 0 {
			tracing::debug!(expired, evicted, "search sessions reclaimed");
		}

		token
	}

	/// Returns the live session and refreshes its idle timer; `None` means "expired".
	pub fn get(&self, token: &str) -> Option<SearchSession> {
		self.get_at(token, OffsetDateTime::now_utc())
	}

	/// [`get`](Self::get) with an explicit clock reading.
	pub fn get_at(&self, token: &str, now: OffsetDateTime) -> Option<SearchSession> {
		self.mutate_at(token, now, |session| session.clone())
	}

	/// Applies `f` to the live session, refreshing its idle timer.
	///
	/// The session's token and `last_touched` are owned by the store; changes `f` makes to
	/// either are discarded.
	pub fn mutate<R>(&self, token: &str, f: impl FnOnce(&mut SearchSession) -> R) -> Option<R> {
		self.mutate_at(token, OffsetDateTime::now_utc(), f)
	}

	/// [`mutate`](Self::mutate) with an explicit clock reading.
	pub fn mutate_at<R>(
		&self,
		token: &str,
		now: OffsetDateTime,
		f: impl FnOnce(&mut SearchSession) -> R,
	) -> Option<R> {
		let mut sessions = self.sessions.lock();
		let entry = sessions.touch_at(token, now)?;
		let key = entry.value.token.clone();

		entry.value.last_touched = now;

		let output = f(&mut entry.value);

		entry.value.token = key;
		entry.value.last_touched = now;

		Some(output)
	}

	/// Ends a session early.
	pub fn remove(&self, token: &str) -> Option<SearchSession> {
		self.sessions.lock().remove(token)
	}

	/// Physically present sessions, including idle ones not yet swept.
	pub fn len(&self) -> usize {
		self.sessions.lock().len()
	}

	/// Returns true when no session is stored.
	pub fn is_empty(&self) -> bool {
		self.sessions.lock().is_empty()
	}
}
impl Default for SearchSessionStore {
	fn default() -> Self {
		Self::new(Self::DEFAULT_TTL, Self::DEFAULT_CAPACITY)
	}
}
