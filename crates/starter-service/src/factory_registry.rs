//! Dynamic factory registry for backend implementations.
//!
//! Storage and chain query backends are selected by name from configuration.
//! This module maps those names to the factory functions each crate exports.

use starter_chain::{ChainError, ChainFactory, ChainService};
use starter_config::{ChainConfig, StorageConfig};
use starter_storage::{StorageError, StorageFactory, StorageInterface};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use thiserror::Error;

/// Errors that can occur while building backends from configuration.
#[derive(Debug, Error)]
pub enum RegistryError {
	/// A configured implementation name has no registered factory.
	#[error("Unknown {kind} implementation '{name}'. Available: [{available}]")]
	UnknownImplementation {
		kind: &'static str,
		name: String,
		available: String,
	},
	/// The storage factory rejected its configuration.
	#[error("Failed to create storage '{name}': {source}")]
	Storage {
		name: String,
		#[source]
		source: StorageError,
	},
	/// The chain query factory rejected its configuration.
	#[error("Failed to create chain query '{name}': {source}")]
	Chain {
		name: String,
		#[source]
		source: ChainError,
	},
}

/// Global registry for all implementation factories
#[derive(Default)]
pub struct FactoryRegistry {
	pub storage: HashMap<String, StorageFactory>,
	pub chain: HashMap<String, ChainFactory>,
}

impl FactoryRegistry {
	/// Create a new empty registry
	pub fn new() -> Self {
		Self::default()
	}

	/// Register a storage implementation
	pub fn register_storage(&mut self, name: impl Into<String>, factory: StorageFactory) {
		self.storage.insert(name.into(), factory);
	}

	/// Register a chain query implementation
	pub fn register_chain(&mut self, name: impl Into<String>, factory: ChainFactory) {
		self.chain.insert(name.into(), factory);
	}
}

// Global registry instance
static REGISTRY: OnceLock<FactoryRegistry> = OnceLock::new();

/// Initialize the global registry with all available implementations
pub fn initialize_registry() -> &'static FactoryRegistry {
	REGISTRY.get_or_init(|| {
		let mut registry = FactoryRegistry::new();

		for (name, factory) in starter_storage::get_all_implementations() {
			tracing::debug!("Registering storage implementation: {}", name);
			registry.register_storage(name, factory);
		}

		for (name, factory) in starter_chain::get_all_implementations() {
			tracing::debug!("Registering chain implementation: {}", name);
			registry.register_chain(name, factory);
		}

		registry
	})
}

/// Get the global factory registry
pub fn get_registry() -> &'static FactoryRegistry {
	initialize_registry()
}

/// Looks up the factory for every configured implementation and returns the
/// primary one.
///
/// Configured implementations that are never built must still name a known
/// factory, so typos in the configuration surface at startup.
fn select_factory<F: Copy>(
	available: &HashMap<String, F>,
	configured: &HashMap<String, toml::Value>,
	primary: &str,
	kind: &'static str,
) -> Result<F, RegistryError> {
	let unknown = |name: &str| {
		let mut names: Vec<_> = available.keys().cloned().collect();
		names.sort();
		RegistryError::UnknownImplementation {
			kind,
			name: name.to_string(),
			available: names.join(", "),
		}
	};

	for name in configured.keys() {
		if !available.contains_key(name) {
			return Err(unknown(name));
		}
	}

	available.get(primary).copied().ok_or_else(|| unknown(primary))
}

impl FactoryRegistry {
	/// Builds the primary storage backend named in `config`.
	pub fn build_storage(
		&self,
		config: &StorageConfig,
	) -> Result<Arc<dyn StorageInterface>, RegistryError> {
		let factory = select_factory(
			&self.storage,
			&config.implementations,
			&config.primary,
			"storage",
		)?;
		let implementation_config = config
			.implementations
			.get(&config.primary)
			.cloned()
			.unwrap_or_else(|| toml::Value::Table(Default::default()));

		let backend = factory(&implementation_config).map_err(|source| RegistryError::Storage {
			name: config.primary.clone(),
			source,
		})?;
		tracing::info!(implementation = %config.primary, "Created storage backend");
		Ok(Arc::from(backend))
	}

	/// Builds the primary chain query backend named in `config`.
	pub fn build_chain(&self, config: &ChainConfig) -> Result<ChainService, RegistryError> {
		let factory = select_factory(
			&self.chain,
			&config.implementations,
			&config.primary,
			"chain",
		)?;
		let implementation_config = config
			.implementations
			.get(&config.primary)
			.cloned()
			.unwrap_or_else(|| toml::Value::Table(Default::default()));

		let implementation =
			factory(&implementation_config).map_err(|source| RegistryError::Chain {
				name: config.primary.clone(),
				source,
			})?;
		tracing::info!(implementation = %config.primary, "Created chain query backend");
		Ok(ChainService::new(Arc::from(implementation)))
	}
}
