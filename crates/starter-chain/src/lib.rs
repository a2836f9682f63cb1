//! Chain query module for the node starter.
//!
//! This module reads orchestrator registration state from the protocol
//! contracts. Implementations are selected by name from configuration: a
//! networked one backed by an Alloy provider, and a deterministic stub for
//! development networks and tests.

use async_trait::async_trait;
use starter_types::{Address, ImplementationRegistry, OrchestratorInfo};
use std::sync::Arc;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod alloy;
	pub mod stub;
}

/// Errors that can occur while querying the chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
	/// Error that occurs during network communication.
	#[error("Network error: {0}")]
	Network(String),
	/// Error that occurs when a contract call reverts or returns undecodable data.
	#[error("Contract call failed: {0}")]
	ContractCall(String),
	/// Error that occurs when the implementation is misconfigured.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Trait defining the interface for chain query implementations.
#[async_trait]
#[cfg_attr(feature = "testing", mockall::automock)]
pub trait ChainQueryInterface: Send + Sync {
	/// Fetches the registration state of `address`.
	///
	/// Accounts that never registered report zero rounds rather than an error.
	async fn get_orchestrator(&self, address: &Address) -> Result<OrchestratorInfo, ChainError>;
}

/// Type alias for chain query factory functions.
pub type ChainFactory = fn(&toml::Value) -> Result<Box<dyn ChainQueryInterface>, ChainError>;

/// Get all registered chain query implementations.
pub fn get_all_implementations() -> Vec<(&'static str, ChainFactory)> {
	use implementations::{alloy, stub};

	vec![
		(alloy::Registry::NAME, alloy::Registry::factory()),
		(stub::Registry::NAME, stub::Registry::factory()),
	]
}

/// Service wrapping the selected chain query implementation.
#[derive(Clone)]
pub struct ChainService {
	implementation: Arc<dyn ChainQueryInterface>,
}

impl ChainService {
	pub fn new(implementation: Arc<dyn ChainQueryInterface>) -> Self {
		Self { implementation }
	}

	/// Fetches the registration state of `address`.
	///
	/// Errors from the implementation are returned as-is.
	pub async fn get_orchestrator(&self, address: &Address) -> Result<OrchestratorInfo, ChainError> {
		let info = self.implementation.get_orchestrator(address).await?;
		tracing::debug!(
			%address,
			activation_round = %info.activation_round,
			deactivation_round = %info.deactivation_round,
			"Fetched orchestrator registration"
		);
		Ok(info)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use implementations::stub::StubChainQuery;

	#[test]
	fn test_all_implementations_registered() {
		let names: Vec<&str> = get_all_implementations()
			.into_iter()
			.map(|(name, _)| name)
			.collect();
		assert_eq!(names, vec!["alloy", "stub"]);
	}

	#[tokio::test]
	async fn test_service_passes_errors_through() {
		let stub = Arc::new(StubChainQuery::new());
		let service = ChainService::new(stub.clone());

		stub.set_error(Some(ChainError::Network("GetTranscoder error".into())))
			.await;
		assert_eq!(
			service.get_orchestrator(&Address::ZERO).await,
			Err(ChainError::Network("GetTranscoder error".into()))
		);
	}

	#[test]
	fn test_error_display() {
		assert_eq!(
			ChainError::ContractCall("reverted".into()).to_string(),
			"Contract call failed: reverted"
		);
	}
}
