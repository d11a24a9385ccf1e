//! Caching policy for login credentials and verified ID token claims.
//!
//! Tokens go to the [`CredentialStore`]; everything else about a session goes to the
//! [`MetadataStore`] as JSON under the cache key. A credential set is only ever observed whole:
//! any failed write purges both halves, and a restore that finds metadata without an access
//! token purges the stray metadata.

// self
use crate::{
	_prelude::*,
	auth::{IdTokenInfo, TokenSecret},
	obs,
	store::{CacheKey, CredentialKind, CredentialStore, MetadataStore, StoreError},
};

/// Bearer credentials of one session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenSet {
	/// Access token; always non-empty when persisted.
	pub access_token: TokenSecret,
	/// ID token, if issued.
	pub id_token: Option<TokenSecret>,
	/// Refresh token, if issued.
	pub refresh_token: Option<TokenSecret>,
}

/// Non-credential session state persisted alongside a [`TokenSet`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetadata {
	/// Authorization code of the completed attempt.
	pub code: Option<String>,
	/// PKCE verifier of the completed attempt.
	pub code_verifier: Option<String>,
	/// State of the completed attempt.
	pub state: Option<String>,
	/// Nonce of the completed attempt.
	pub nonce: Option<String>,
	/// Token type reported by the token endpoint.
	pub token_type: Option<String>,
	/// Access token expiry.
	pub access_token_expires_at: Option<OffsetDateTime>,
	/// Discovery document URL the endpoints came from.
	pub service_discovery_url: String,
	/// Authorization endpoint.
	pub authorization_endpoint: String,
	/// Token endpoint.
	pub token_endpoint: String,
	/// Token-info endpoint.
	pub id_token_verification_endpoint: String,
	/// Client public info endpoint.
	pub client_public_info_endpoint: String,
}

/// One persisted credential set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredCredentials {
	/// Confidential half.
	pub tokens: TokenSet,
	/// Metadata half.
	pub metadata: SessionMetadata,
}

#[derive(Serialize, Deserialize)]
struct StoredIdTokenInfo {
	audience: String,
	service: String,
	not_valid_before: OffsetDateTime,
	expiration: OffsetDateTime,
	issue_date: OffsetDateTime,
	issuer: String,
	partner_id: String,
	nonce: String,
}

/// Credential cache built on the two collaborator stores.
#[derive(Clone)]
pub struct SecureTokenStore {
	credentials: Arc<dyn CredentialStore>,
	metadata: Arc<dyn MetadataStore>,
}
impl SecureTokenStore {
	/// Creates a cache over the provided confidential and metadata stores.
	pub fn new(credentials: Arc<dyn CredentialStore>, metadata: Arc<dyn MetadataStore>) -> Self {
		Self { credentials, metadata }
	}

	/// Persists a credential set, purging everything under `key` if any write fails.
	pub fn save(&self, key: &CacheKey, stored: &StoredCredentials) -> Result<(), StoreError> {
		let result = self.write_tokens(key, &stored.tokens).and_then(|_| {
			let payload = encode(&stored.metadata)?;

			self.metadata.put(&key.to_string(), &payload)
		});

		if let Err(e) = &result {
			obs::record_store_failure("save", e);

			self.purge(key);
		}

		result
	}

	/// Restores the credential set under `key`.
	///
	/// Returns `None` when nothing is cached. Unreadable metadata, or metadata whose access
	/// token is missing or empty, is purged before `None` is returned.
	pub fn load(&self, key: &CacheKey) -> Option<StoredCredentials> {
		let raw = match self.metadata.get(&key.to_string()) {
			Ok(Some(raw)) => raw,
			Ok(None) => return None,
			Err(e) => {
				obs::record_store_failure("load", &e);
				self.purge(key);

				return None;
			},
		};

		match self.read_credentials(key, &raw) {
			Ok(Some(stored)) => Some(stored),
			Ok(None) => {
				self.purge(key);

				None
			},
			Err(e) => {
				obs::record_store_failure("load", &e);
				self.purge(key);

				None
			},
		}
	}

	/// Removes the credential set under `key`; returns true if metadata existed.
	pub fn purge(&self, key: &CacheKey) -> bool {
		let metadata_key = key.to_string();
		let existed = matches!(self.metadata.get(&metadata_key), Ok(Some(_)));

		if let Err(e) = self.metadata.delete(&metadata_key) {
			obs::record_store_failure("purge", &e);
		}

		for kind in CredentialKind::TOKENS
			.into_iter()
			.chain([CredentialKind::TokenId, CredentialKind::PartnerUserId])
		{
			if let Err(e) = self.credentials.delete(key.service(), &key.credential_key(kind)) {
				obs::record_store_failure("purge", &e);
			}
		}

		existed
	}

	/// Persists verified ID token claims under their nonce.
	///
	/// `token_id` and `partner_user_id` go to the confidential store; the rest to metadata.
	pub fn save_id_token_info(&self, key: &CacheKey, info: &IdTokenInfo) -> Result<(), StoreError> {
		let result = self.write_id_token_info(key, info);

		if let Err(e) = &result {
			obs::record_store_failure("save_id_token_info", e);

			self.purge_id_token_info(&info.nonce);
		}

		result
	}

	/// Restores cached ID token claims for `nonce`, purging entries whose sensitive half is gone.
	pub fn load_id_token_info(&self, key: &CacheKey, nonce: &str) -> Option<IdTokenInfo> {
		let raw = match self.metadata.get(nonce) {
			Ok(Some(raw)) => raw,
			Ok(None) => return None,
			Err(e) => {
				obs::record_store_failure("load_id_token_info", &e);

				return None;
			},
		};
		let restored = decode::<StoredIdTokenInfo>(&raw).and_then(|stored| {
			let token_id = self.read_secret(key, CredentialKind::TokenId)?;
			let partner_user_id = self.read_secret(key, CredentialKind::PartnerUserId)?;

			Ok(token_id.zip(partner_user_id).map(|(token_id, partner_user_id)| IdTokenInfo {
				audience: stored.audience,
				service: stored.service,
				not_valid_before: stored.not_valid_before,
				expiration: stored.expiration,
				issue_date: stored.issue_date,
				issuer: stored.issuer,
				token_id,
				partner_id: stored.partner_id,
				partner_user_id,
				nonce: stored.nonce,
			}))
		});

		match restored {
			Ok(Some(info)) if info.nonce == nonce => Some(info),
			Ok(_) => {
				self.purge_id_token_info(nonce);

				None
			},
			Err(e) => {
				obs::record_store_failure("load_id_token_info", &e);
				self.purge_id_token_info(nonce);

				None
			},
		}
	}

	/// Drops cached ID token claims for `nonce`.
	pub fn purge_id_token_info(&self, nonce: &str) {
		if let Err(e) = self.metadata.delete(nonce) {
			obs::record_store_failure("purge_id_token_info", &e);
		}
	}

	fn write_tokens(&self, key: &CacheKey, tokens: &TokenSet) -> Result<(), StoreError> {
		let service = key.service();

		self.credentials.put(
			service,
			&key.credential_key(CredentialKind::AccessToken),
			tokens.access_token.expose().as_bytes(),
		)?;

		for (kind, secret) in [
			(CredentialKind::IdToken, tokens.id_token.as_ref()),
			(CredentialKind::RefreshToken, tokens.refresh_token.as_ref()),
		] {
			let credential_key = key.credential_key(kind);

			match secret.filter(|secret| !secret.is_empty()) {
				Some(secret) =>
					self.credentials.put(service, &credential_key, secret.expose().as_bytes())?,
				None => self.credentials.delete(service, &credential_key)?,
			}
		}

		Ok(())
	}

	fn read_credentials(
		&self,
		key: &CacheKey,
		raw: &[u8],
	) -> Result<Option<StoredCredentials>, StoreError> {
		let metadata = decode::<SessionMetadata>(raw)?;
		let Some(access_token) = self.read_secret(key, CredentialKind::AccessToken)? else {
			return Ok(None);
		};
		let id_token = self.read_secret(key, CredentialKind::IdToken)?;
		let refresh_token = self.read_secret(key, CredentialKind::RefreshToken)?;

		Ok(Some(StoredCredentials {
			tokens: TokenSet {
				access_token: TokenSecret::new(access_token),
				id_token: id_token.map(TokenSecret::new),
				refresh_token: refresh_token.map(TokenSecret::new),
			},
			metadata,
		}))
	}

	fn write_id_token_info(&self, key: &CacheKey, info: &IdTokenInfo) -> Result<(), StoreError> {
		let service = key.service();

		self.credentials.put(
			service,
			&key.credential_key(CredentialKind::TokenId),
			info.token_id.as_bytes(),
		)?;
		self.credentials.put(
			service,
			&key.credential_key(CredentialKind::PartnerUserId),
			info.partner_user_id.as_bytes(),
		)?;

		let payload = encode(&StoredIdTokenInfo {
			audience: info.audience.clone(),
			service: info.service.clone(),
			not_valid_before: info.not_valid_before,
			expiration: info.expiration,
			issue_date: info.issue_date,
			issuer: info.issuer.clone(),
			partner_id: info.partner_id.clone(),
			nonce: info.nonce.clone(),
		})?;

		self.metadata.put(&info.nonce, &payload)
	}

	/// Reads a confidential value; empty values read as absent.
	fn read_secret(
		&self,
		key: &CacheKey,
		kind: CredentialKind,
	) -> Result<Option<String>, StoreError> {
		let Some(bytes) = self.credentials.get(key.service(), &key.credential_key(kind))? else {
			return Ok(None);
		};
		let value = String::from_utf8(bytes).map_err(|e| StoreError::Serialization {
			message: format!("Stored {} is not UTF-8: {e}", kind.as_str()),
		})?;

		Ok(Some(value).filter(|value| !value.is_empty()))
	}
}
impl Debug for SecureTokenStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("SecureTokenStore(..)")
	}
}

fn encode<T>(value: &T) -> Result<Vec<u8>, StoreError>
where
	T: Serialize,
{
	serde_json::to_vec(value)
		.map_err(|e| StoreError::Serialization { message: format!("Failed to encode entry: {e}") })
}

fn decode<T>(raw: &[u8]) -> Result<T, StoreError>
where
	T: for<'de> Deserialize<'de>,
{
	serde_json::from_slice(raw)
		.map_err(|e| StoreError::Serialization { message: format!("Failed to decode entry: {e}") })
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;
	use crate::{
		auth::{ClientId, ScopeSet},
		store::{MemoryCredentialStore, MemoryMetadataStore},
	};

	struct FailingCredentialStore;
	impl CredentialStore for FailingCredentialStore {
		fn put(&self, _: &str, _: &str, _: &[u8]) -> Result<(), StoreError> {
			Err(StoreError::Backend { message: "keychain locked".into() })
		}

		fn get(&self, _: &str, _: &str) -> Result<Option<Vec<u8>>, StoreError> {
			Ok(None)
		}

		fn delete(&self, _: &str, _: &str) -> Result<(), StoreError> {
			Ok(())
		}
	}

	fn key() -> CacheKey {
		let client = ClientId::new("partner-client").expect("Client fixture should be valid.");
		let scope = ScopeSet::from_str("openid profile").expect("Scope fixture should parse.");

		CacheKey::new(&client, &scope).expect("Scoped fixture should produce a key.")
	}

	const EXPIRES_AT: OffsetDateTime = datetime!(2030-01-01 00:00 UTC);

	fn stored() -> StoredCredentials {
		StoredCredentials {
			tokens: TokenSet {
				access_token: TokenSecret::new("at-secret"),
				id_token: Some(TokenSecret::new("id")),
				refresh_token: None,
			},
			metadata: SessionMetadata {
				nonce: Some("nonce-1".into()),
				state: Some("state-1".into()),
				access_token_expires_at: Some(EXPIRES_AT),
				token_endpoint: "https://idp/token".into(),
				..Default::default()
			},
		}
	}

	fn memory() -> (SecureTokenStore, MemoryCredentialStore, MemoryMetadataStore) {
		let credentials = MemoryCredentialStore::default();
		let metadata = MemoryMetadataStore::default();
		let store =
			SecureTokenStore::new(Arc::new(credentials.clone()), Arc::new(metadata.clone()));

		(store, credentials, metadata)
	}

	#[test]
	fn save_splits_tokens_from_metadata() {
		let (store, credentials, metadata) = memory();
		let key = key();

		store.save(&key, &stored()).expect("Save should succeed.");

		assert!(credentials.contains("partner-client", "accessToken.openid profile"));
		assert!(credentials.contains("partner-client", "idToken.openid profile"));
		assert!(!credentials.contains("partner-client", "refreshToken.openid profile"));

		let raw = metadata
			.get("partner-client.openid profile")
			.expect("Metadata read should succeed.")
			.expect("Metadata should be stored under the cache key.");
		let text = String::from_utf8(raw).expect("Metadata should be UTF-8 JSON.");

		assert!(!text.contains("at-secret"), "Metadata must never carry bearer credentials.");
		assert_eq!(store.load(&key), Some(stored()));
	}

	#[test]
	fn confidential_write_failure_purges_metadata() {
		let metadata = MemoryMetadataStore::default();
		let store =
			SecureTokenStore::new(Arc::new(FailingCredentialStore), Arc::new(metadata.clone()));
		let key = key();

		metadata.put(&key.to_string(), b"{}").expect("Seeding stray metadata should succeed.");

		let err = store.save(&key, &stored()).expect_err("Locked keychain must fail the save.");

		assert!(matches!(err, StoreError::Backend { .. }));
		assert!(metadata.is_empty(), "Failed saves must not leave partial state behind.");
	}

	#[test]
	fn load_purges_metadata_without_access_token() {
		let (store, credentials, metadata) = memory();
		let key = key();

		store.save(&key, &stored()).expect("Save should succeed.");
		credentials
			.delete("partner-client", "accessToken.openid profile")
			.expect("Removing the access token should succeed.");

		assert_eq!(store.load(&key), None);
		assert!(metadata.is_empty());
		assert!(credentials.is_empty());
	}

	#[test]
	fn purge_reports_whether_anything_was_cached() {
		let (store, credentials, _) = memory();
		let key = key();

		assert!(!store.purge(&key));

		store.save(&key, &stored()).expect("Save should succeed.");

		assert!(store.purge(&key));
		assert!(credentials.is_empty());
		assert!(!store.purge(&key));
	}

	#[test]
	fn id_token_info_round_trips_through_both_stores() {
		let (store, credentials, _) = memory();
		let key = key();
		let now = OffsetDateTime::now_utc();
		let info = IdTokenInfo {
			audience: "partner-client".into(),
			service: "PASSENGER".into(),
			not_valid_before: now,
			expiration: now + Duration::hours(1),
			issue_date: now,
			issuer: "https://idp".into(),
			token_id: "jti-1".into(),
			partner_id: "partner-1".into(),
			partner_user_id: "user-1".into(),
			nonce: "nonce-1".into(),
		};

		store.save_id_token_info(&key, &info).expect("Saving claims should succeed.");

		assert_eq!(store.load_id_token_info(&key, "nonce-1"), Some(info));

		credentials
			.delete("partner-client", "tokenId.openid profile")
			.expect("Removing the token id should succeed.");

		assert_eq!(store.load_id_token_info(&key, "nonce-1"), None);
		assert_eq!(store.load_id_token_info(&key, "nonce-1"), None, "Stray entries are purged.");
	}
}
