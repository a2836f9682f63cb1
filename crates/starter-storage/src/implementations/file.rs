//! File-based storage backend implementation.
//!
//! Each value lives in its own `.bin` file under the base directory, next to an
//! `.idx` file recording the key and the fields it was indexed with. Queries go
//! through one `<namespace>.index` JSON file per namespace, guarded by an
//! advisory `<namespace>.lock` file so that several processes sharing the same
//! directory never interleave index updates. A missing or corrupted namespace
//! index is rebuilt from the `.idx` files.

use crate::{namespace_of, QueryFilter, StorageError, StorageIndexes, StorageInterface};
use async_trait::async_trait;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use starter_types::{ConfigSchema, Field, FieldType, Schema, ValidationError};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tokio::fs;

const DEFAULT_STORAGE_PATH: &str = "./data/storage";
const ENTRY_EXTENSION: &str = "idx";

/// Index structure for a namespace.
///
/// Field values are keyed by their JSON text.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NamespaceIndex {
	/// Every key stored with indexes in this namespace.
	#[serde(default)]
	pub keys: BTreeSet<String>,
	/// Field -> Value -> Set of keys
	#[serde(default)]
	pub fields: HashMap<String, HashMap<String, BTreeSet<String>>>,
}

impl NamespaceIndex {
	fn remove_key(&mut self, key: &str) {
		self.keys.remove(key);
		for value_map in self.fields.values_mut() {
			for keys in value_map.values_mut() {
				keys.remove(key);
			}
		}
		self.fields.retain(|_, value_map| {
			value_map.retain(|_, keys| !keys.is_empty());
			!value_map.is_empty()
		});
	}

	fn insert_key(&mut self, key: &str, indexes: &StorageIndexes) {
		self.keys.insert(key.to_string());
		for (field, value) in &indexes.fields {
			self.fields
				.entry(field.clone())
				.or_default()
				.entry(value.to_string())
				.or_default()
				.insert(key.to_string());
		}
	}

	fn lookup(&self, field: &str, value: &serde_json::Value) -> impl Iterator<Item = &String> {
		self.fields
			.get(field)
			.and_then(|value_map| value_map.get(&value.to_string()))
			.into_iter()
			.flatten()
	}

	fn matching_keys(&self, filter: &QueryFilter) -> BTreeSet<String> {
		match filter {
			QueryFilter::All => self.keys.clone(),
			QueryFilter::Equals(field, value) => self.lookup(field, value).cloned().collect(),
			QueryFilter::In(field, values) => values
				.iter()
				.flat_map(|value| self.lookup(field, value))
				.cloned()
				.collect(),
		}
	}
}

/// Per-key record of the indexes a value was stored with.
#[derive(Debug, Serialize, Deserialize)]
struct IndexEntry {
	key: String,
	indexes: StorageIndexes,
}

/// File-based storage implementation.
pub struct FileStorage {
	/// Base directory path for storing files.
	base_path: PathBuf,
}

impl FileStorage {
	/// Creates a new FileStorage instance with the specified base path.
	pub fn new(base_path: PathBuf) -> Self {
		Self { base_path }
	}

	/// Converts a storage key to a filesystem-safe file path.
	fn get_file_path(&self, key: &str) -> PathBuf {
		let safe_key = key.replace(['/', ':'], "_");
		self.base_path.join(format!("{safe_key}.bin"))
	}

	fn get_entry_path(&self, key: &str) -> PathBuf {
		self.get_file_path(key).with_extension(ENTRY_EXTENSION)
	}

	fn get_index_path(&self, namespace: &str) -> PathBuf {
		self.base_path.join(format!("{namespace}.index"))
	}

	/// Executes an operation while holding the namespace lock file.
	///
	/// Writers take the lock exclusively, readers share it.
	async fn with_index_lock<F, Fut, R>(
		index_path: &Path,
		exclusive: bool,
		operation: F,
	) -> Result<R, StorageError>
	where
		F: FnOnce() -> Fut,
		Fut: std::future::Future<Output = Result<R, StorageError>>,
	{
		let lock_path = index_path.with_extension("lock");

		if let Some(parent) = lock_path.parent() {
			fs::create_dir_all(parent).await.map_err(|e| {
				StorageError::Backend(format!("Failed to create lock directory: {e}"))
			})?;
		}

		let _lock_file = tokio::task::spawn_blocking(move || {
			let lock_file = std::fs::OpenOptions::new()
				.create(true)
				.truncate(false)
				.read(true)
				.write(true)
				.open(&lock_path)
				.map_err(|e| StorageError::Backend(format!("Failed to open lock file: {e}")))?;

			let locked = if exclusive {
				FileExt::lock_exclusive(&lock_file)
			} else {
				FileExt::lock_shared(&lock_file)
			};
			locked.map_err(|e| StorageError::Backend(format!("Failed to acquire lock: {e}")))?;

			Ok::<_, StorageError>(lock_file)
		})
		.await
		.map_err(|e| StorageError::Backend(format!("Failed to spawn blocking task: {e}")))??;

		// Lock is released when _lock_file is dropped
		operation().await
	}

	/// Reads the namespace index, rebuilding it when missing or corrupted.
	async fn load_index(&self, namespace: &str) -> Result<NamespaceIndex, StorageError> {
		let index_path = self.get_index_path(namespace);
		let data = match fs::read(&index_path).await {
			Ok(data) => data,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				return self.rebuild_index(namespace).await
			},
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		match serde_json::from_slice(&data) {
			Ok(index) => Ok(index),
			Err(e) => {
				tracing::error!(path = %index_path.display(), "Corrupted index file: {}. Rebuilding.", e);
				self.rebuild_index(namespace).await
			},
		}
	}

	/// Reconstructs the index of `namespace` from the per-key entry files.
	async fn rebuild_index(&self, namespace: &str) -> Result<NamespaceIndex, StorageError> {
		let mut index = NamespaceIndex::default();
		let mut dir = match fs::read_dir(&self.base_path).await {
			Ok(dir) => dir,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(index),
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		while let Some(dir_entry) = dir
			.next_entry()
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?
		{
			let path = dir_entry.path();
			if path.extension().and_then(|ext| ext.to_str()) != Some(ENTRY_EXTENSION) {
				continue;
			}

			let entry = match fs::read(&path).await {
				Ok(data) => serde_json::from_slice::<IndexEntry>(&data).map_err(|e| e.to_string()),
				Err(e) => Err(e.to_string()),
			};
			match entry {
				Ok(entry) if namespace_of(&entry.key) == namespace => {
					index.insert_key(&entry.key, &entry.indexes)
				},
				Ok(_) => {},
				Err(e) => {
					tracing::warn!(path = %path.display(), "Skipping unreadable index entry: {}", e)
				},
			}
		}

		tracing::debug!(namespace, keys = index.keys.len(), "Rebuilt namespace index");
		Ok(index)
	}

	async fn write_index(index_path: &Path, index: &NamespaceIndex) -> Result<(), StorageError> {
		if index.keys.is_empty() {
			return remove_if_exists(index_path).await;
		}

		let bytes =
			serde_json::to_vec(index).map_err(|e| StorageError::Serialization(e.to_string()))?;
		write_atomic(index_path, &bytes).await
	}

	/// Replaces the index entries of `key`, or drops them when `indexes` is `None`.
	async fn update_indexes(
		&self,
		key: &str,
		indexes: Option<&StorageIndexes>,
	) -> Result<(), StorageError> {
		let entry_path = self.get_entry_path(key);
		match indexes {
			Some(indexes) => {
				let entry = IndexEntry {
					key: key.to_string(),
					indexes: indexes.clone(),
				};
				let bytes = serde_json::to_vec(&entry)
					.map_err(|e| StorageError::Serialization(e.to_string()))?;
				write_atomic(&entry_path, &bytes).await?;
			},
			None => {
				if !entry_path.exists() {
					return Ok(());
				}
				remove_if_exists(&entry_path).await?;
			},
		}

		let namespace = namespace_of(key);
		let index_path = self.get_index_path(namespace);
		Self::with_index_lock(&index_path, true, || async {
			let mut index = self.load_index(namespace).await?;
			index.remove_key(key);
			if let Some(indexes) = indexes {
				index.insert_key(key, indexes);
			}
			Self::write_index(&index_path, &index).await
		})
		.await
	}
}

/// Writes to a temporary sibling and renames it over `path`.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
	let mut temp_path = path.as_os_str().to_owned();
	temp_path.push(".tmp");
	let temp_path = PathBuf::from(temp_path);

	fs::write(&temp_path, bytes)
		.await
		.map_err(|e| StorageError::Backend(e.to_string()))?;
	fs::rename(&temp_path, path)
		.await
		.map_err(|e| StorageError::Backend(e.to_string()))
}

async fn remove_if_exists(path: &Path) -> Result<(), StorageError> {
	match fs::remove_file(path).await {
		Ok(()) => Ok(()),
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
		Err(e) => Err(StorageError::Backend(e.to_string())),
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let path = self.get_file_path(key);

		match fs::read(&path).await {
			Ok(data) => Ok(data),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				Err(StorageError::NotFound(key.to_string()))
			},
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn set_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		indexes: Option<StorageIndexes>,
	) -> Result<(), StorageError> {
		fs::create_dir_all(&self.base_path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		write_atomic(&self.get_file_path(key), &value).await?;
		self.update_indexes(key, indexes.as_ref()).await
	}

	async fn query(
		&self,
		namespace: &str,
		filter: QueryFilter,
	) -> Result<Vec<String>, StorageError> {
		let index_path = self.get_index_path(namespace);

		let index = if index_path.exists() {
			Self::with_index_lock(&index_path, false, || self.load_index(namespace)).await?
		} else {
			self.rebuild_index(namespace).await?
		};

		// Skip keys whose file was removed behind our back
		let mut keys = Vec::new();
		for key in index.matching_keys(&filter) {
			if self.get_file_path(&key).exists() {
				keys.push(key);
			}
		}

		Ok(keys)
	}

	async fn get_batch(&self, keys: &[String]) -> Result<Vec<(String, Vec<u8>)>, StorageError> {
		let mut results = Vec::new();

		for key in keys {
			match self.get_bytes(key).await {
				Ok(bytes) => results.push((key.clone(), bytes)),
				Err(StorageError::NotFound(_)) => continue,
				Err(e) => return Err(e),
			}
		}

		Ok(results)
	}
}

/// Configuration schema for FileStorage.
pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![
				Field::new("storage_path", FieldType::String).with_validator(|value| {
					match value.as_str() {
						Some(path) if !path.trim().is_empty() => Ok(()),
						_ => Err("storage_path cannot be empty".to_string()),
					}
				}),
			],
		);

		schema.validate(config)
	}
}

/// Factory function to create a file storage backend from configuration.
///
/// Configuration parameters:
/// - `storage_path`: Base directory for file storage (default: "./data/storage")
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	FileStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(format!("Invalid configuration: {e}")))?;

	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or(DEFAULT_STORAGE_PATH);

	Ok(Box::new(FileStorage::new(PathBuf::from(storage_path))))
}

/// Registry for the file storage implementation.
pub struct Registry;

impl starter_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = crate::StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;
	use std::sync::Arc;
	use tempfile::TempDir;

	fn create_test_storage() -> (FileStorage, TempDir) {
		let temp_dir = TempDir::new().unwrap();
		let storage = FileStorage::new(temp_dir.path().to_path_buf());
		(storage, temp_dir)
	}

	fn status(value: &str) -> Option<StorageIndexes> {
		Some(StorageIndexes::new().with_field("status", value))
	}

	#[tokio::test]
	async fn test_basic_operations() {
		let (storage, _temp_dir) = create_test_storage();

		let key = "test_key";
		let value = b"test_value".to_vec();

		assert!(matches!(
			storage.get_bytes(key).await,
			Err(StorageError::NotFound(_))
		));

		storage.set_bytes(key, value.clone(), None).await.unwrap();
		assert_eq!(storage.get_bytes(key).await.unwrap(), value);
	}

	#[tokio::test]
	async fn test_creates_base_directory() {
		let temp_dir = TempDir::new().unwrap();
		let storage = FileStorage::new(temp_dir.path().join("nested").join("storage"));

		storage
			.set_bytes("orchestrators:a", b"1".to_vec(), status("active"))
			.await
			.unwrap();
		assert_eq!(storage.get_bytes("orchestrators:a").await.unwrap(), b"1");
	}

	#[tokio::test]
	async fn test_indexing_operations() {
		let (storage, temp_dir) = create_test_storage();

		storage
			.set_bytes("orchestrators:a", b"a".to_vec(), status("active"))
			.await
			.unwrap();
		storage
			.set_bytes("orchestrators:b", b"b".to_vec(), status("inactive"))
			.await
			.unwrap();
		storage
			.set_bytes("orchestrators:c", b"c".to_vec(), status("active"))
			.await
			.unwrap();
		storage
			.set_bytes("orchestrators:d", b"d".to_vec(), Some(StorageIndexes::new()))
			.await
			.unwrap();

		assert!(temp_dir.path().join("orchestrators.index").exists());

		let active = storage
			.query(
				"orchestrators",
				QueryFilter::Equals("status".into(), json!("active")),
			)
			.await
			.unwrap();
		assert_eq!(active, vec!["orchestrators:a", "orchestrators:c"]);

		let either = storage
			.query(
				"orchestrators",
				QueryFilter::In("status".into(), vec![json!("inactive"), json!("unknown")]),
			)
			.await
			.unwrap();
		assert_eq!(either, vec!["orchestrators:b"]);

		let all = storage
			.query("orchestrators", QueryFilter::All)
			.await
			.unwrap();
		assert_eq!(all.len(), 4);

		let none = storage.query("missing", QueryFilter::All).await.unwrap();
		assert!(none.is_empty());
	}

	#[tokio::test]
	async fn test_reindex_on_overwrite() {
		let (storage, _temp_dir) = create_test_storage();

		storage
			.set_bytes("orchestrators:a", b"1".to_vec(), status("active"))
			.await
			.unwrap();
		storage
			.set_bytes("orchestrators:a", b"2".to_vec(), status("inactive"))
			.await
			.unwrap();

		let active = storage
			.query(
				"orchestrators",
				QueryFilter::Equals("status".into(), json!("active")),
			)
			.await
			.unwrap();
		assert!(active.is_empty());

		let inactive = storage
			.query(
				"orchestrators",
				QueryFilter::Equals("status".into(), json!("inactive")),
			)
			.await
			.unwrap();
		assert_eq!(inactive, vec!["orchestrators:a"]);
	}

	#[tokio::test]
	async fn test_unindexed_overwrite_drops_index_entries() {
		let (storage, temp_dir) = create_test_storage();
		let index_path = temp_dir.path().join("orchestrators.index");

		storage
			.set_bytes("orchestrators:a", b"a".to_vec(), status("active"))
			.await
			.unwrap();
		storage
			.set_bytes("orchestrators:b", b"b".to_vec(), status("active"))
			.await
			.unwrap();

		storage
			.set_bytes("orchestrators:a", b"a".to_vec(), None)
			.await
			.unwrap();
		let remaining = storage
			.query("orchestrators", QueryFilter::All)
			.await
			.unwrap();
		assert_eq!(remaining, vec!["orchestrators:b"]);
		assert!(index_path.exists());
		assert!(!temp_dir.path().join("orchestrators_a.idx").exists());

		storage
			.set_bytes("orchestrators:b", b"b".to_vec(), None)
			.await
			.unwrap();
		assert!(!index_path.exists());
		assert_eq!(storage.get_bytes("orchestrators:b").await.unwrap(), b"b");
	}

	#[tokio::test]
	async fn test_query_skips_files_removed_externally() {
		let (storage, temp_dir) = create_test_storage();

		storage
			.set_bytes("orchestrators:a", b"a".to_vec(), status("active"))
			.await
			.unwrap();
		std::fs::remove_file(temp_dir.path().join("orchestrators_a.bin")).unwrap();

		let all = storage
			.query("orchestrators", QueryFilter::All)
			.await
			.unwrap();
		assert!(all.is_empty());
	}

	#[tokio::test]
	async fn test_corrupted_index_is_rebuilt() {
		let (storage, temp_dir) = create_test_storage();
		let index_path = temp_dir.path().join("orchestrators.index");

		storage
			.set_bytes("orchestrators:a", b"a".to_vec(), status("active"))
			.await
			.unwrap();
		storage
			.set_bytes("orchestrators:b", b"b".to_vec(), status("inactive"))
			.await
			.unwrap();
		std::fs::write(&index_path, b"{broken").unwrap();

		// Reads see every stored key before the index is rewritten.
		let all = storage
			.query("orchestrators", QueryFilter::All)
			.await
			.unwrap();
		assert_eq!(all, vec!["orchestrators:a", "orchestrators:b"]);

		storage
			.set_bytes("orchestrators:c", b"c".to_vec(), status("active"))
			.await
			.unwrap();

		let all = storage
			.query("orchestrators", QueryFilter::All)
			.await
			.unwrap();
		assert_eq!(
			all,
			vec!["orchestrators:a", "orchestrators:b", "orchestrators:c"]
		);

		let active = storage
			.query(
				"orchestrators",
				QueryFilter::Equals("status".into(), json!("active")),
			)
			.await
			.unwrap();
		assert_eq!(active, vec!["orchestrators:a", "orchestrators:c"]);

		let rewritten: NamespaceIndex =
			serde_json::from_slice(&std::fs::read(&index_path).unwrap()).unwrap();
		assert_eq!(rewritten.keys.len(), 3);
	}

	#[tokio::test]
	async fn test_missing_index_is_rebuilt() {
		let (storage, temp_dir) = create_test_storage();

		storage
			.set_bytes("orchestrators:a", b"a".to_vec(), status("active"))
			.await
			.unwrap();
		storage
			.set_bytes("other:b", b"b".to_vec(), status("active"))
			.await
			.unwrap();
		std::fs::remove_file(temp_dir.path().join("orchestrators.index")).unwrap();

		let all = storage
			.query("orchestrators", QueryFilter::All)
			.await
			.unwrap();
		assert_eq!(all, vec!["orchestrators:a"]);

		// Unreadable entries are skipped rather than failing the rebuild.
		std::fs::write(temp_dir.path().join("orchestrators_x.idx"), b"nope").unwrap();
		storage
			.set_bytes("orchestrators:c", b"c".to_vec(), status("inactive"))
			.await
			.unwrap();
		let all = storage
			.query("orchestrators", QueryFilter::All)
			.await
			.unwrap();
		assert_eq!(all, vec!["orchestrators:a", "orchestrators:c"]);
	}

	#[tokio::test]
	async fn test_persists_across_instances() {
		let (storage, temp_dir) = create_test_storage();
		storage
			.set_bytes("orchestrators:a", b"a".to_vec(), status("active"))
			.await
			.unwrap();
		drop(storage);

		let reopened = FileStorage::new(temp_dir.path().to_path_buf());
		assert_eq!(reopened.get_bytes("orchestrators:a").await.unwrap(), b"a");
		assert_eq!(
			reopened
				.query("orchestrators", QueryFilter::All)
				.await
				.unwrap(),
			vec!["orchestrators:a"]
		);
	}

	#[tokio::test]
	async fn test_concurrent_index_operations() {
		let (storage, _temp_dir) = create_test_storage();
		let storage = Arc::new(storage);

		let mut handles = Vec::new();
		for i in 0..10 {
			let storage = storage.clone();
			handles.push(tokio::spawn(async move {
				storage
					.set_bytes(
						&format!("orchestrators:{i}"),
						vec![i as u8],
						Some(StorageIndexes::new().with_field("slot", i % 2)),
					)
					.await
			}));
		}
		for handle in handles {
			handle.await.unwrap().unwrap();
		}

		let all = storage
			.query("orchestrators", QueryFilter::All)
			.await
			.unwrap();
		assert_eq!(all.len(), 10);

		let even = storage
			.query(
				"orchestrators",
				QueryFilter::Equals("slot".into(), json!(0)),
			)
			.await
			.unwrap();
		assert_eq!(even.len(), 5);
	}

	#[test]
	fn test_config_schema_validation() {
		let schema = FileStorageSchema;

		let valid: toml::Value = toml::from_str(r#"storage_path = "/tmp/storage""#).unwrap();
		assert!(schema.validate(&valid).is_ok());

		let empty = toml::Value::Table(Default::default());
		assert!(schema.validate(&empty).is_ok());

		let blank: toml::Value = toml::from_str(r#"storage_path = "  ""#).unwrap();
		assert!(schema.validate(&blank).is_err());

		let wrong_type: toml::Value = toml::from_str("storage_path = 42").unwrap();
		assert!(schema.validate(&wrong_type).is_err());
	}

	#[tokio::test]
	async fn test_factory_function() {
		let temp_dir = TempDir::new().unwrap();
		let mut table = toml::map::Map::new();
		table.insert(
			"storage_path".to_string(),
			toml::Value::String(temp_dir.path().to_string_lossy().into_owned()),
		);

		let storage = create_storage(&toml::Value::Table(table)).unwrap();
		storage.set_bytes("k:1", b"v".to_vec(), None).await.unwrap();
		assert!(temp_dir.path().join("k_1.bin").exists());
	}
}
