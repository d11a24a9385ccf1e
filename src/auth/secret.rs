//! Redacting wrapper for bearer tokens.

// self
use crate::_prelude::*;

/// Access, ID, or refresh token.
///
/// `Debug` and `Display` never print the value; read it with [`TokenSecret::expose`] only at
/// the point where it goes on the wire or into the confidential store.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps `value`.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Token text.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Returns true for the empty token, which never counts as a credential.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("TokenSecret(<redacted>)")
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}
