//! Storage contracts for persisted credentials and session metadata.
//!
//! Two collaborator traits model the platform stores: [`CredentialStore`] for bearer material
//! (the platform keychain) and [`MetadataStore`] for everything that is not a credential.
//! [`SecureTokenStore`] layers the caching policy on top of both.

pub mod file;
pub mod memory;
pub mod secure;

pub use file::FileMetadataStore;
pub use memory::{MemoryCredentialStore, MemoryMetadataStore};
pub use secure::*;

// self
use crate::{
	_prelude::*,
	auth::{ClientId, ScopeSet},
};

/// Confidential store for bearer credentials, keyed by `(service, key)`.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Writes or replaces the value stored under `(service, key)`.
	fn put(&self, service: &str, key: &str, value: &[u8]) -> Result<(), StoreError>;

	/// Reads the value stored under `(service, key)`, if present.
	fn get(&self, service: &str, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

	/// Removes the value stored under `(service, key)`; missing entries are not an error.
	fn delete(&self, service: &str, key: &str) -> Result<(), StoreError>;
}

/// Durable key-value store for non-credential session metadata.
pub trait MetadataStore
where
	Self: Send + Sync,
{
	/// Writes or replaces the value stored under `key`.
	fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

	/// Reads the value stored under `key`, if present.
	fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

	/// Removes the value stored under `key`; missing entries are not an error.
	fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Error type produced by store implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced while encoding or decoding stored values.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Kinds of confidential values kept per cache key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CredentialKind {
	/// Access token.
	AccessToken,
	/// ID token.
	IdToken,
	/// Refresh token.
	RefreshToken,
	/// `jti` claim of verified ID token info.
	TokenId,
	/// `sub` claim of verified ID token info.
	PartnerUserId,
}
impl CredentialKind {
	/// Token kinds persisted for a login session.
	pub const TOKENS: [CredentialKind; 3] =
		[CredentialKind::AccessToken, CredentialKind::IdToken, CredentialKind::RefreshToken];

	/// Returns the key prefix used in the confidential store.
	pub const fn as_str(self) -> &'static str {
		match self {
			CredentialKind::AccessToken => "accessToken",
			CredentialKind::IdToken => "idToken",
			CredentialKind::RefreshToken => "refreshToken",
			CredentialKind::TokenId => "tokenId",
			CredentialKind::PartnerUserId => "partnerUserId",
		}
	}
}

/// Identity of one persisted credential set: `client_id + "." + normalized(scope)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
	client_id: ClientId,
	scope: String,
}
impl CacheKey {
	/// Builds the key; returns `None` for an empty scope, which disables caching.
	pub fn new(client_id: &ClientId, scope: &ScopeSet) -> Option<Self> {
		if scope.is_empty() {
			return None;
		}

		Some(Self { client_id: client_id.clone(), scope: scope.normalized() })
	}

	/// Service name used for confidential store entries.
	pub fn service(&self) -> &str {
		&self.client_id
	}

	/// Key used for a confidential value of the given kind.
	pub fn credential_key(&self, kind: CredentialKind) -> String {
		format!("{}.{}", kind.as_str(), self.scope)
	}
}
impl Display for CacheKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}.{}", self.client_id, self.scope)
	}
}
