//! Strongly typed identifiers for upstream applications and whitelisted subjects.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Creates a new identifier after validation.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let view = value.as_ref();

				validate_view($kind, view)?;

				Ok(Self(view.to_owned()))
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				validate_view($kind, &value)?;

				Ok(Self(value))
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
	};
}

const IDENTIFIER_MAX_LEN: usize = 128;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty or whitespace.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (application, subject).
		kind: &'static str,
	},
	/// The identifier contains whitespace characters.
	#[error("{kind} identifier contains whitespace.")]
	ContainsWhitespace {
		/// Kind of identifier (application, subject).
		kind: &'static str,
	},
	/// The identifier exceeded the allowed character count.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Kind of identifier (application, subject).
		kind: &'static str,
		/// Maximum permitted character count.
		max: usize,
	},
}

def_id! { AppId, "Upstream application identifier sent as `X-APP-ID`.", "App" }
def_id! { SubjectId, "Chat or user identifier that may appear on the whitelist.", "Subject" }

fn validate_view(kind: &'static str, view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if view.chars().any(char::is_whitespace) {
		return Err(IdentifierError::ContainsWhitespace { kind });
	}
	if view.len() > IDENTIFIER_MAX_LEN {
		return Err(IdentifierError::TooLong { kind, max: IDENTIFIER_MAX_LEN });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn identifiers_reject_whitespace_and_empty() {
		assert!(AppId::new(" app-1").is_err(), "Leading whitespace must be rejected.");
		assert!(AppId::new("app-1 ").is_err(), "Trailing whitespace must be rejected.");
		assert!(SubjectId::new("").is_err());

		let group = SubjectId::new("-1001234567890").expect("Group chat ids should be valid.");

		assert_eq!(group.as_ref(), "-1001234567890");
		assert_eq!(format!("{group:?}"), "Subject(-1001234567890)");
	}

	#[test]
	fn serde_enforces_validation() {
		let app: AppId = serde_json::from_str("\"app-42\"").expect("App id should deserialize.");

		assert_eq!(app.as_ref(), "app-42");
		assert!(serde_json::from_str::<AppId>("\"with space\"").is_err());
	}

	#[test]
	fn length_limit_is_enforced() {
		SubjectId::new("1".repeat(IDENTIFIER_MAX_LEN)).expect("Exact length should succeed.");

		let err = SubjectId::new("1".repeat(IDENTIFIER_MAX_LEN + 1))
			.expect_err("Overlong identifiers should fail.");

		assert_eq!(err, IdentifierError::TooLong { kind: "Subject", max: IDENTIFIER_MAX_LEN });
	}

	#[test]
	fn borrow_supports_fast_lookup() {
		let set: HashSet<SubjectId> =
			HashSet::from_iter([SubjectId::new("42").expect("Subject fixture should be valid.")]);

		assert!(set.contains("42"));
		assert!(!set.contains("43"));
	}
}
