//! Configuration module for the node starter.
//!
//! The node is configured from a TOML file. String values may reference
//! environment variables as `${VAR}` or `${VAR:-default}`; references are
//! substituted before parsing and the result is validated as a whole.
//!
//! ```toml
//! [node]
//! eth_keystore_path = "${HOME}/.lpData/keystore"
//! orchestrator = true
//! service_addr = "https://orchestrator.example.com:8935"
//!
//! [storage]
//! primary = "file"
//! [storage.implementations.file]
//! storage_path = "./data/storage"
//!
//! [chain]
//! primary = "alloy"
//! [chain.implementations.alloy]
//! rpc_url = "${ETH_URL}"
//! bonding_manager = "0x35Bcf3c30594191d53231E4FF333E8A770453e40"
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use starter_types::Address;
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Only the message; the error's Display repeats the offending input
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the node starter.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Operator identity and node role.
	pub node: NodeConfig,
	/// Storage backend. Selected from the environment when absent.
	#[serde(default)]
	pub storage: Option<StorageConfig>,
	/// Chain query backend. Required when running as an orchestrator.
	#[serde(default)]
	pub chain: Option<ChainConfig>,
}

/// Operator identity and node role.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NodeConfig {
	/// Keystore directory or single key file.
	pub eth_keystore_path: String,
	/// Account to run as. Must match the key file when one is given.
	#[serde(default)]
	pub eth_acct_addr: Option<Address>,
	/// Publicly advertised service URI.
	#[serde(default)]
	pub service_addr: Option<String>,
	/// Per-broadcaster price caps, inline JSON or a path to a JSON file.
	#[serde(default)]
	pub max_price_per_unit_for_broadcaster: Option<String>,
	/// Whether this node runs as an orchestrator.
	#[serde(default)]
	pub orchestrator: bool,
	/// Bound on hostname resolution when classifying `service_addr`.
	#[serde(default = "default_resolve_timeout_ms")]
	pub resolve_timeout_ms: u64,
}

fn default_resolve_timeout_ms() -> u64 {
	2000
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for the chain query backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChainConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of chain query implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

static ENV_VAR: Lazy<Regex> = Lazy::new(|| {
	Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}").expect("static env regex")
});

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let mut result = String::with_capacity(input.len());
	let mut last = 0;
	for cap in ENV_VAR.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};

		let value = match (std::env::var(var_name.as_str()), cap.get(2)) {
			(Ok(value), _) => value,
			(Err(_), Some(default)) => default.as_str().to_string(),
			(Err(_), None) => {
				return Err(ConfigError::Validation(format!(
					"Environment variable '{}' not found",
					var_name.as_str()
				)))
			},
		};

		result.push_str(&input[last..full_match.start()]);
		result.push_str(&value);
		last = full_match.end();
	}
	result.push_str(&input[last..]);

	Ok(result)
}

fn validate_implementations(
	section: &str,
	primary: &str,
	implementations: &HashMap<String, toml::Value>,
) -> Result<(), ConfigError> {
	if implementations.is_empty() {
		return Err(ConfigError::Validation(format!(
			"At least one {section} implementation must be configured"
		)));
	}
	if primary.is_empty() {
		return Err(ConfigError::Validation(format!(
			"{section} primary implementation cannot be empty"
		)));
	}
	if !implementations.contains_key(primary) {
		return Err(ConfigError::Validation(format!(
			"Primary {section} '{primary}' not found in implementations"
		)));
	}
	Ok(())
}

impl Config {
	/// Loads configuration from a file, resolving environment variables.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let content = tokio::fs::read_to_string(path).await?;
		content.parse()
	}

	/// Validates cross-field constraints that serde cannot express.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.node.eth_keystore_path.trim().is_empty() {
			return Err(ConfigError::Validation(
				"node.eth_keystore_path cannot be empty".into(),
			));
		}
		if self.node.resolve_timeout_ms == 0 || self.node.resolve_timeout_ms > 60_000 {
			return Err(ConfigError::Validation(
				"node.resolve_timeout_ms must be between 1 and 60000".into(),
			));
		}

		if let Some(storage) = &self.storage {
			validate_implementations("storage", &storage.primary, &storage.implementations)?;
		}

		match &self.chain {
			Some(chain) => {
				validate_implementations("chain", &chain.primary, &chain.implementations)?
			},
			None if self.node.orchestrator => {
				return Err(ConfigError::Validation(
					"[chain] must be configured when node.orchestrator is enabled".into(),
				));
			},
			None => {},
		}

		Ok(())
	}
}

/// Parses configuration from a TOML string.
///
/// Environment variables are resolved first and the configuration is
/// validated after parsing.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
