//! Storage module for the node starter.
//!
//! This module provides abstractions for persisting bootstrap data, with
//! in-memory and file-based backends behind a common byte-level interface and
//! a typed service on top.
//!
//! # Orchestrator Records
//!
//! The [`orchestrator_store`] module stores on-chain registration records keyed
//! by address, so repeated syncs of the same account never duplicate a record.

pub mod orchestrator_store;

pub use orchestrator_store::{OrchestratorFilter, OrchestratorStore};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use starter_types::ImplementationRegistry;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod memory;
}

/// Query filter for storage operations.
///
/// Filters apply to the fields an item was indexed with when it was stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryFilter {
	/// Match items where field equals value.
	Equals(String, serde_json::Value),
	/// Match items where field is in list of values.
	In(String, Vec<serde_json::Value>),
	/// Match all indexed items.
	All,
}

impl QueryFilter {
	/// Checks whether an item with the given indexes satisfies this filter.
	pub fn matches(&self, indexes: &StorageIndexes) -> bool {
		match self {
			QueryFilter::All => true,
			QueryFilter::Equals(field, value) => indexes.fields.get(field) == Some(value),
			QueryFilter::In(field, values) => indexes
				.fields
				.get(field)
				.is_some_and(|value| values.contains(value)),
		}
	}
}

/// Index values for a stored item.
///
/// Provides field values that backends can use for querying.
/// Backends are responsible for maintaining their own index structures.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct StorageIndexes {
	/// Field name -> value for indexing.
	pub fields: HashMap<String, serde_json::Value>,
}

impl StorageIndexes {
	/// Creates a new empty StorageIndexes.
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a field to be indexed.
	pub fn with_field(mut self, name: impl Into<String>, value: impl Serialize) -> Self {
		self.fields.insert(
			name.into(),
			serde_json::to_value(value).unwrap_or(serde_json::Value::Null),
		);
		self
	}
}

/// Splits the namespace off a `namespace:id` key.
pub(crate) fn namespace_of(key: &str) -> &str {
	key.split(':').next().unwrap_or("")
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// Error that occurs when a requested item is not found.
	#[error("Not found: {0}")]
	NotFound(String),
	/// Error that occurs during serialization/deserialization.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Error that occurs in the storage backend.
	#[error("Backend error: {0}")]
	Backend(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Trait defining the low-level interface for storage backends.
///
/// Keys have the form `namespace:id`. Writes to an existing key replace the
/// previous value and its indexes.
#[async_trait]
#[cfg_attr(feature = "testing", mockall::automock)]
pub trait StorageInterface: Send + Sync {
	/// Retrieves raw bytes for the given key.
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Stores raw bytes with optional indexes.
	///
	/// The memory backend keeps indexes next to the value, the file backend
	/// maintains one index file per namespace.
	async fn set_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		indexes: Option<StorageIndexes>,
	) -> Result<(), StorageError>;

	/// Query items in a namespace based on indexed fields.
	///
	/// Returns list of keys matching the filter criteria.
	/// Only returns keys for items that have been indexed.
	async fn query(
		&self,
		namespace: &str,
		filter: QueryFilter,
	) -> Result<Vec<String>, StorageError>;

	/// Batch retrieve multiple values by keys.
	///
	/// Returns a vector of (key, value) pairs for keys that exist.
	/// Missing keys are silently skipped.
	async fn get_batch(&self, keys: &[String]) -> Result<Vec<(String, Vec<u8>)>, StorageError>;
}

/// Type alias for storage factory functions.
///
/// This is the function signature that all storage implementations must provide
/// to create instances of their storage interface.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

/// Get all registered storage implementations.
///
/// Returns a vector of (name, factory) tuples for all available storage implementations.
/// This is used by the factory registry to automatically register all implementations.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{file, memory};

	vec![
		(file::Registry::NAME, file::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

/// Storage backend selection outside of the node configuration file.
///
/// Used when the configuration has no `[storage]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
	/// Create a file-based storage
	File {
		/// Base directory path for storing files (e.g., "./data/storage")
		path: String,
	},
	/// Create an in-memory storage (useful for testing)
	Memory,
}

impl StoreConfig {
	/// Build a storage config from environment variables.
	///
	/// Supported backends:
	/// - STORAGE_BACKEND=file (default) uses STORAGE_PATH (default: "./data/storage")
	/// - STORAGE_BACKEND=memory
	pub fn from_env() -> Result<Self, StorageError> {
		let backend = std::env::var("STORAGE_BACKEND").unwrap_or_else(|_| "file".to_string());
		match backend.as_str() {
			"file" => {
				let path =
					std::env::var("STORAGE_PATH").unwrap_or_else(|_| "./data/storage".to_string());
				Ok(StoreConfig::File { path })
			},
			"memory" => Ok(StoreConfig::Memory),
			other => Err(StorageError::Configuration(format!(
				"Unsupported storage backend '{}'. Supported: file, memory",
				other
			))),
		}
	}
}

/// Creates a storage backend from the given configuration.
pub fn create_storage_backend(config: StoreConfig) -> Arc<dyn StorageInterface> {
	match config {
		StoreConfig::File { path } => Arc::new(implementations::file::FileStorage::new(
			std::path::PathBuf::from(path),
		)),
		StoreConfig::Memory => Arc::new(implementations::memory::MemoryStorage::new()),
	}
}

/// High-level storage service that provides typed operations.
///
/// The StorageService wraps a low-level storage backend and provides
/// convenient methods for storing and retrieving typed data with
/// automatic serialization/deserialization.
pub struct StorageService {
	/// The underlying storage backend implementation.
	backend: Arc<dyn StorageInterface>,
}

impl StorageService {
	/// Creates a new StorageService with the specified backend.
	pub fn new(backend: Arc<dyn StorageInterface>) -> Self {
		Self { backend }
	}

	/// Stores a serializable value with optional indexes.
	///
	/// The namespace and id are combined to form a unique key.
	/// The data is serialized to JSON before storage.
	pub async fn store<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
		indexes: Option<StorageIndexes>,
	) -> Result<(), StorageError> {
		let key = format!("{}:{}", namespace, id);
		let bytes =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend.set_bytes(&key, bytes, indexes).await
	}

	/// Retrieves and deserializes a value from storage.
	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<T, StorageError> {
		let key = format!("{}:{}", namespace, id);
		let bytes = self.backend.get_bytes(&key).await?;
		serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))
	}

	/// Query items in a namespace based on a filter.
	///
	/// Returns (id, item) pairs. Items that fail to deserialize are logged and skipped.
	pub async fn query<T: DeserializeOwned>(
		&self,
		namespace: &str,
		filter: QueryFilter,
	) -> Result<Vec<(String, T)>, StorageError> {
		let keys = self.backend.query(namespace, filter).await?;
		let results = self.backend.get_batch(&keys).await?;

		let mut items = Vec::new();
		for (key, bytes) in results {
			let id = key
				.split_once(':')
				.map(|(_, id)| id)
				.unwrap_or(&key)
				.to_string();
			match serde_json::from_slice::<T>(&bytes) {
				Ok(item) => items.push((id, item)),
				Err(e) => {
					tracing::warn!("Failed to deserialize item {}: {}", key, e);
				},
			}
		}

		Ok(items)
	}
}
