//! Requested scope and its cache identity.
//!
//! The authorization request carries the scope exactly as configured, but two sessions whose
//! scopes differ only in case, ordering, or repeated entries share one persisted credential set.
//! [`ScopeSet`] is that shared identity.

// std
use std::collections::BTreeSet;
// self
use crate::_prelude::*;

/// Errors emitted when a scope string cannot identify a credential set.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ScopeValidationError {
	/// The scope consisted of whitespace only.
	#[error("Scope cannot be blank.")]
	Blank,
	/// A single entry carried embedded whitespace.
	#[error("Scope entry contains whitespace: {entry}.")]
	ContainsWhitespace {
		/// The offending entry.
		entry: String,
	},
}

/// Lower-cased, deduplicated, sorted scope entries.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct ScopeSet(Arc<[String]>);
impl ScopeSet {
	/// Builds the identity from individual entries.
	pub fn new<I, S>(entries: I) -> Result<Self, ScopeValidationError>
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let mut identity = BTreeSet::new();

		for entry in entries {
			let entry = entry.as_ref();

			if entry.chars().any(char::is_whitespace) {
				return Err(ScopeValidationError::ContainsWhitespace { entry: entry.to_owned() });
			}
			if !entry.is_empty() {
				identity.insert(entry.to_lowercase());
			}
		}

		Ok(Self(identity.into_iter().collect()))
	}

	/// Returns true when no entries were requested; such sessions are never cached.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Case-insensitive membership check.
	pub fn contains(&self, entry: &str) -> bool {
		self.0.binary_search(&entry.to_lowercase()).is_ok()
	}

	/// Normalized entries in sort order.
	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.0.iter().map(String::as_str)
	}

	/// Space-joined normalized form used in cache keys.
	pub fn normalized(&self) -> String {
		self.0.join(" ")
	}
}
impl Debug for ScopeSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "ScopeSet({})", self.normalized())
	}
}
impl Display for ScopeSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.normalized())
	}
}
impl FromStr for ScopeSet {
	type Err = ScopeValidationError;

	/// Parses a space-delimited scope; the empty string yields an empty set.
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		if !s.is_empty() && s.trim().is_empty() {
			return Err(ScopeValidationError::Blank);
		}

		Self::new(s.split_whitespace())
	}
}
