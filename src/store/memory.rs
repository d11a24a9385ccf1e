//! Thread-safe in-memory store implementations for local development and tests.

// self
use crate::{
	_prelude::*,
	store::{CredentialStore, MetadataStore, StoreError},
};

type CredentialMap = Arc<RwLock<HashMap<(String, String), Vec<u8>>>>;
type MetadataMap = Arc<RwLock<HashMap<String, Vec<u8>>>>;

/// In-process stand-in for the platform keychain.
#[derive(Clone, Debug, Default)]
pub struct MemoryCredentialStore(CredentialMap);
impl MemoryCredentialStore {
	/// Number of stored entries.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns true if nothing is stored.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	/// Returns true if an entry exists under `(service, key)`.
	pub fn contains(&self, service: &str, key: &str) -> bool {
		self.0.read().contains_key(&(service.to_owned(), key.to_owned()))
	}
}
impl CredentialStore for MemoryCredentialStore {
	fn put(&self, service: &str, key: &str, value: &[u8]) -> Result<(), StoreError> {
		self.0.write().insert((service.to_owned(), key.to_owned()), value.to_vec());

		Ok(())
	}

	fn get(&self, service: &str, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
		Ok(self.0.read().get(&(service.to_owned(), key.to_owned())).cloned())
	}

	fn delete(&self, service: &str, key: &str) -> Result<(), StoreError> {
		self.0.write().remove(&(service.to_owned(), key.to_owned()));

		Ok(())
	}
}

/// In-process durable-store stand-in for session metadata.
#[derive(Clone, Debug, Default)]
pub struct MemoryMetadataStore(MetadataMap);
impl MemoryMetadataStore {
	/// Number of stored entries.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns true if nothing is stored.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	/// Returns true if an entry exists under `key`.
	pub fn contains(&self, key: &str) -> bool {
		self.0.read().contains_key(key)
	}
}
impl MetadataStore for MemoryMetadataStore {
	fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
		self.0.write().insert(key.to_owned(), value.to_vec());

		Ok(())
	}

	fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
		Ok(self.0.read().get(key).cloned())
	}

	fn delete(&self, key: &str) -> Result<(), StoreError> {
		self.0.write().remove(key);

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn credential_entries_are_partitioned_by_service() {
		let store = MemoryCredentialStore::default();

		store.put("client-a", "accessToken.openid", b"a").expect("Put should succeed.");
		store.put("client-b", "accessToken.openid", b"b").expect("Put should succeed.");

		assert_eq!(
			store.get("client-a", "accessToken.openid").expect("Get should succeed."),
			Some(b"a".to_vec())
		);

		store.delete("client-a", "accessToken.openid").expect("Delete should succeed.");

		assert!(!store.contains("client-a", "accessToken.openid"));
		assert!(store.contains("client-b", "accessToken.openid"));
		assert_eq!(store.len(), 1);
	}

	#[test]
	fn deleting_missing_metadata_is_not_an_error() {
		let store = MemoryMetadataStore::default();

		store.delete("missing").expect("Deleting a missing key should succeed.");
		store.put("key", b"value").expect("Put should succeed.");

		assert!(store.contains("key"));
		assert_eq!(store.get("key").expect("Get should succeed."), Some(b"value".to_vec()));
	}
}
