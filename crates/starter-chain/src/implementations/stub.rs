//! Deterministic chain query implementation.
//!
//! Serves registration state from memory, for development networks without a
//! deployed protocol and for tests that need to control what the chain
//! reports, failures included.

use crate::{ChainError, ChainQueryInterface};
use alloy_primitives::U256;
use async_trait::async_trait;
use starter_types::{
	Address, ConfigSchema, Field, FieldType, OrchestratorInfo, Schema, ValidationError,
};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory chain query.
///
/// Addresses without an explicit record report the default rounds, which are
/// zero unless configured otherwise.
#[derive(Default)]
pub struct StubChainQuery {
	default_rounds: (U256, U256),
	orchestrators: RwLock<HashMap<Address, OrchestratorInfo>>,
	error: RwLock<Option<ChainError>>,
}

impl StubChainQuery {
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets the rounds reported for addresses without an explicit record.
	pub fn with_default_rounds(mut self, activation_round: U256, deactivation_round: U256) -> Self {
		self.default_rounds = (activation_round, deactivation_round);
		self
	}

	/// Registers or replaces the state reported for `info.address`.
	pub async fn set_orchestrator(&self, info: OrchestratorInfo) {
		self.orchestrators.write().await.insert(info.address, info);
	}

	/// Makes every query fail with `error` until cleared with `None`.
	pub async fn set_error(&self, error: Option<ChainError>) {
		*self.error.write().await = error;
	}
}

#[async_trait]
impl ChainQueryInterface for StubChainQuery {
	async fn get_orchestrator(&self, address: &Address) -> Result<OrchestratorInfo, ChainError> {
		if let Some(error) = self.error.read().await.clone() {
			return Err(error);
		}

		let orchestrators = self.orchestrators.read().await;
		Ok(orchestrators
			.get(address)
			.cloned()
			.unwrap_or_else(|| OrchestratorInfo {
				address: *address,
				activation_round: self.default_rounds.0,
				deactivation_round: self.default_rounds.1,
			}))
	}
}

/// Configuration schema for the stub chain query.
pub struct StubChainSchema;

impl ConfigSchema for StubChainSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let round = || FieldType::Integer {
			min: Some(0),
			max: None,
		};
		let schema = Schema::new(
			vec![],
			vec![
				Field::new("activation_round", round()),
				Field::new("deactivation_round", round()),
			],
		);

		schema.validate(config)
	}
}

/// Factory function to create a stub chain query from configuration.
///
/// Configuration parameters:
/// - `activation_round`: round reported for every address (default: 0)
/// - `deactivation_round`: round reported for every address (default: 0)
pub fn create_chain_query(
	config: &toml::Value,
) -> Result<Box<dyn crate::ChainQueryInterface>, ChainError> {
	StubChainSchema
		.validate(config)
		.map_err(|e| ChainError::Configuration(format!("Invalid configuration: {}", e)))?;

	// Non-negative after validation.
	let round = |name: &str| {
		config
			.get(name)
			.and_then(|v| v.as_integer())
			.map_or(U256::ZERO, |v| U256::from(v.unsigned_abs()))
	};

	tracing::warn!("Using stub chain query; registration state is not read from the chain");
	Ok(Box::new(StubChainQuery::new().with_default_rounds(
		round("activation_round"),
		round("deactivation_round"),
	)))
}

/// Registry for the stub chain query implementation.
pub struct Registry;

impl starter_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "stub";
	type Factory = crate::ChainFactory;

	fn factory() -> Self::Factory {
		create_chain_query
	}
}
