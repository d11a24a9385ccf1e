//! JSON-file [`MetadataStore`] for hosts without a platform preferences store.

// std
use std::{
	fs::{self, File},
	io::{ErrorKind, Write},
	path::{Path, PathBuf},
};
// crates.io
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	store::{MetadataStore, StoreError},
};

/// Keeps every metadata entry in one JSON object on disk, rewritten after each mutation.
///
/// Session metadata and ID token claims are JSON already, so entries are embedded as JSON
/// values and the file stays readable; payloads that are not JSON are rejected.
#[derive(Clone, Debug)]
pub struct FileMetadataStore {
	path: PathBuf,
	entries: Arc<RwLock<BTreeMap<String, Value>>>,
}
impl FileMetadataStore {
	/// Opens the store at `path`, loading the existing snapshot if there is one.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();
		let entries = read_snapshot(&path)?;

		Ok(Self { path, entries: Arc::new(RwLock::new(entries)) })
	}

	/// Writes `entries` to a sibling temp file, syncs it, then renames it over the snapshot.
	fn write_snapshot(&self, entries: &BTreeMap<String, Value>) -> Result<(), StoreError> {
		let backend = |what: &str, path: &Path, e: std::io::Error| StoreError::Backend {
			message: format!("Failed to {what} {}: {e}", path.display()),
		};
		let bytes = serde_json::to_vec_pretty(entries).map_err(|e| StoreError::Serialization {
			message: format!("Failed to encode metadata snapshot: {e}"),
		})?;
		let staging = self.path.with_extension("tmp");

		if let Some(dir) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
			fs::create_dir_all(dir).map_err(|e| backend("create", dir, e))?;
		}

		let mut file = File::create(&staging).map_err(|e| backend("create", &staging, e))?;

		file.write_all(&bytes).map_err(|e| backend("write", &staging, e))?;
		file.sync_all().map_err(|e| backend("sync", &staging, e))?;
		drop(file);

		fs::rename(&staging, &self.path).map_err(|e| backend("replace", &self.path, e))
	}
}
impl MetadataStore for FileMetadataStore {
	fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
		let value: Value = serde_json::from_slice(value).map_err(|e| StoreError::Serialization {
			message: format!("Metadata for {key} is not JSON: {e}"),
		})?;
		let mut entries = self.entries.write();
		let previous = entries.insert(key.to_owned(), value);

		if let Err(e) = self.write_snapshot(&entries) {
			match previous {
				Some(previous) => entries.insert(key.to_owned(), previous),
				None => entries.remove(key),
			};

			return Err(e);
		}

		Ok(())
	}

	fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
		self.entries
			.read()
			.get(key)
			.map(|value| {
				serde_json::to_vec(value).map_err(|e| StoreError::Serialization {
					message: format!("Failed to encode metadata for {key}: {e}"),
				})
			})
			.transpose()
	}

	fn delete(&self, key: &str) -> Result<(), StoreError> {
		let mut entries = self.entries.write();

		match entries.remove(key) {
			Some(_) => self.write_snapshot(&entries),
			None => Ok(()),
		}
	}
}

fn read_snapshot(path: &Path) -> Result<BTreeMap<String, Value>, StoreError> {
	let bytes = match fs::read(path) {
		Ok(bytes) => bytes,
		Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
		Err(e) =>
			return Err(StoreError::Backend {
				message: format!("Failed to read {}: {e}", path.display()),
			}),
	};

	if bytes.is_empty() {
		return Ok(BTreeMap::new());
	}

	serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
		message: format!("Failed to parse {}: {e}", path.display()),
	})
}
