//! In-memory storage backend implementation.
//!
//! Data is lost on restart, so this backend suits tests and nodes that
//! re-sync their state on every start.

use crate::{namespace_of, QueryFilter, StorageError, StorageIndexes, StorageInterface};
use async_trait::async_trait;
use starter_types::{ConfigSchema, Schema, ValidationError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct MemoryState {
	values: HashMap<String, Vec<u8>>,
	/// Indexes of the keys that were stored with any.
	indexes: HashMap<String, StorageIndexes>,
}

/// In-memory storage implementation.
pub struct MemoryStorage {
	/// The in-memory store protected by a read-write lock.
	state: Arc<RwLock<MemoryState>>,
}

impl MemoryStorage {
	/// Creates a new MemoryStorage instance.
	pub fn new() -> Self {
		Self {
			state: Arc::new(RwLock::new(MemoryState::default())),
		}
	}
}

impl Default for MemoryStorage {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl StorageInterface for MemoryStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let state = self.state.read().await;
		state
			.values
			.get(key)
			.cloned()
			.ok_or_else(|| StorageError::NotFound(key.to_string()))
	}

	async fn set_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		indexes: Option<StorageIndexes>,
	) -> Result<(), StorageError> {
		let mut state = self.state.write().await;
		state.values.insert(key.to_string(), value);
		match indexes {
			Some(indexes) => state.indexes.insert(key.to_string(), indexes),
			None => state.indexes.remove(key),
		};
		Ok(())
	}

	async fn query(
		&self,
		namespace: &str,
		filter: QueryFilter,
	) -> Result<Vec<String>, StorageError> {
		let state = self.state.read().await;
		let mut keys: Vec<String> = state
			.indexes
			.iter()
			.filter(|(key, indexes)| namespace_of(key) == namespace && filter.matches(indexes))
			.map(|(key, _)| key.clone())
			.collect();
		keys.sort();
		Ok(keys)
	}

	async fn get_batch(&self, keys: &[String]) -> Result<Vec<(String, Vec<u8>)>, StorageError> {
		let state = self.state.read().await;
		Ok(keys
			.iter()
			.filter_map(|key| {
				state
					.values
					.get(key)
					.map(|value| (key.clone(), value.clone()))
			})
			.collect())
	}
}

/// Configuration schema for MemoryStorage.
pub struct MemoryStorageSchema;

impl ConfigSchema for MemoryStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		// Memory storage has no configuration
		Schema::new(vec![], vec![]).validate(config)
	}
}

/// Factory function to create a memory storage backend from configuration.
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	MemoryStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(format!("Invalid configuration: {}", e)))?;

	Ok(Box::new(MemoryStorage::new()))
}

/// Registry for the memory storage implementation.
pub struct Registry;

impl starter_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = crate::StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}
