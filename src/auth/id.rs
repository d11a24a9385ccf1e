//! Validated identifiers sent to the identity provider.

// std
use std::ops::Deref;
// self
use crate::_prelude::*;

macro_rules! identifier {
	($(#[$meta:meta])* $name:ident, $label:literal) => {
		$(#[$meta])*
		#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Validates `value` as a query-safe identifier.
			pub fn new(value: impl Into<String>) -> Result<Self, IdentifierError> {
				let value = value.into();

				check($label, &value)?;

				Ok(Self(value))
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(id: $name) -> Self {
				id.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				Self::new(value)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, "{}({})", stringify!($name), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
	};
}

const MAX_LEN: usize = 256;

/// Reasons an identifier is rejected.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum IdentifierError {
	/// Nothing was supplied.
	#[error("{label} is empty.")]
	Empty {
		/// Which identifier failed.
		label: &'static str,
	},
	/// Whitespace would be mangled by query encoding and cache keys.
	#[error("{label} contains whitespace.")]
	ContainsWhitespace {
		/// Which identifier failed.
		label: &'static str,
	},
	/// Longer than any provider accepts.
	#[error("{label} is longer than 256 bytes.")]
	TooLong {
		/// Which identifier failed.
		label: &'static str,
	},
}

identifier! {
	/// Client identifier registered with the identity provider; also the confidential-store
	/// service name.
	ClientId, "Client id"
}
identifier! {
	/// Host-supplied device identifier forwarded as `device_id` on authorization requests.
	DeviceId, "Device id"
}

fn check(label: &'static str, value: &str) -> Result<(), IdentifierError> {
	if value.is_empty() {
		Err(IdentifierError::Empty { label })
	} else if value.chars().any(char::is_whitespace) {
		Err(IdentifierError::ContainsWhitespace { label })
	} else if value.len() > MAX_LEN {
		Err(IdentifierError::TooLong { label })
	} else {
		Ok(())
	}
}
