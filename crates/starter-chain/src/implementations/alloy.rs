//! Alloy-backed chain queries.
//!
//! Registration state is read with an `eth_call` of `getTranscoder(address)` on
//! the protocol's BondingManager contract.

use crate::{ChainError, ChainQueryInterface};
use alloy_primitives::{Bytes, TxKind};
use alloy_provider::{DynProvider, Provider};
use alloy_rpc_types::eth::transaction::TransactionRequest;
use alloy_sol_types::{sol, SolCall};
use async_trait::async_trait;
use starter_types::{
	create_http_provider, Address, ConfigSchema, Field, FieldType, OrchestratorInfo, Schema,
	ValidationError,
};

sol! {
	interface IBondingManager {
		function getTranscoder(address _transcoder) external view returns (
			uint256 lastRewardRound,
			uint256 rewardCut,
			uint256 feeShare,
			uint256 lastActiveStakeUpdateRound,
			uint256 activationRound,
			uint256 deactivationRound,
			uint256 activeCumulativeRewards,
			uint256 cumulativeRewards,
			uint256 cumulativeFees,
			uint256 lastFeeRound
		);
	}
}

/// Chain query implementation talking to an RPC endpoint.
pub struct AlloyChainQuery {
	provider: DynProvider,
	bonding_manager: Address,
}

impl AlloyChainQuery {
	pub fn new(provider: DynProvider, bonding_manager: Address) -> Self {
		Self {
			provider,
			bonding_manager,
		}
	}
}

/// Decodes `getTranscoder` return data into the rounds of `address`.
fn decode_transcoder(address: &Address, data: &Bytes) -> Result<OrchestratorInfo, ChainError> {
	let transcoder = IBondingManager::getTranscoderCall::abi_decode_returns(data).map_err(|e| {
		ChainError::ContractCall(format!("Failed to decode getTranscoder result: {}", e))
	})?;

	Ok(OrchestratorInfo {
		address: *address,
		activation_round: transcoder.activationRound,
		deactivation_round: transcoder.deactivationRound,
	})
}

#[async_trait]
impl ChainQueryInterface for AlloyChainQuery {
	async fn get_orchestrator(&self, address: &Address) -> Result<OrchestratorInfo, ChainError> {
		let call = IBondingManager::getTranscoderCall {
			_transcoder: (*address).into(),
		};

		let request = TransactionRequest {
			to: Some(TxKind::Call(self.bonding_manager.into())),
			input: call.abi_encode().into(),
			..Default::default()
		};

		let result = self.provider.call(request).await.map_err(|e| {
			ChainError::Network(format!("Failed to call getTranscoder for {}: {}", address, e))
		})?;

		decode_transcoder(address, &result)
	}
}

/// Configuration schema for the Alloy chain query implementation.
pub struct AlloyChainSchema;

impl ConfigSchema for AlloyChainSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![
				Field::new("rpc_url", FieldType::String).with_validator(|value| {
					match value.as_str() {
						Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
							Ok(())
						},
						_ => Err("rpc_url must be an http(s) URL".to_string()),
					}
				}),
				Field::new("bonding_manager", FieldType::String).with_validator(|value| {
					value
						.as_str()
						.unwrap_or_default()
						.parse::<Address>()
						.map(|_| ())
						.map_err(|e| e.to_string())
				}),
			],
			vec![],
		);

		schema.validate(config)
	}
}

/// Factory function to create an Alloy chain query from configuration.
///
/// Configuration parameters:
/// - `rpc_url`: HTTP(S) endpoint of the chain node
/// - `bonding_manager`: address of the BondingManager contract
pub fn create_chain_query(
	config: &toml::Value,
) -> Result<Box<dyn crate::ChainQueryInterface>, ChainError> {
	AlloyChainSchema
		.validate(config)
		.map_err(|e| ChainError::Configuration(format!("Invalid configuration: {}", e)))?;

	// Both fields are present and well-formed after validation.
	let rpc_url = config
		.get("rpc_url")
		.and_then(|v| v.as_str())
		.unwrap_or_default();
	let bonding_manager = config
		.get("bonding_manager")
		.and_then(|v| v.as_str())
		.unwrap_or_default()
		.parse::<Address>()
		.map_err(|e| ChainError::Configuration(e.to_string()))?;

	let provider =
		create_http_provider(rpc_url).map_err(|e| ChainError::Configuration(e.to_string()))?;

	tracing::info!(%rpc_url, %bonding_manager, "Created Alloy chain query");
	Ok(Box::new(AlloyChainQuery::new(provider, bonding_manager)))
}

/// Registry for the Alloy chain query implementation.
pub struct Registry;

impl starter_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "alloy";
	type Factory = crate::ChainFactory;

	fn factory() -> Self::Factory {
		create_chain_query
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const BONDING_MANAGER: &str = "0x35bcf3c30594191d53231e4ff333e8a770453e40";

	fn config(rpc_url: &str, bonding_manager: &str) -> toml::Value {
		toml::Value::Table({
			let mut table = toml::map::Map::new();
			table.insert("rpc_url".to_string(), toml::Value::String(rpc_url.into()));
			table.insert(
				"bonding_manager".to_string(),
				toml::Value::String(bonding_manager.into()),
			);
			table
		})
	}

	/// ABI encoding of ten uint256 words with the given activation and
	/// deactivation rounds at positions 4 and 5.
	fn transcoder_return(activation: u64, deactivation: u64) -> Bytes {
		let mut data = vec![0u8; 32 * 10];
		data[4 * 32 + 24..5 * 32].copy_from_slice(&activation.to_be_bytes());
		data[5 * 32 + 24..6 * 32].copy_from_slice(&deactivation.to_be_bytes());
		Bytes::from(data)
	}

	#[test]
	fn test_decode_transcoder() {
		let address = Address([1u8; 20]);
		let info = decode_transcoder(&address, &transcoder_return(5, 10)).unwrap();

		assert_eq!(info.address, address);
		assert_eq!(info.activation_round, alloy_primitives::U256::from(5u64));
		assert_eq!(info.deactivation_round, alloy_primitives::U256::from(10u64));
	}

	#[test]
	fn test_decode_transcoder_short_data() {
		let result = decode_transcoder(&Address::ZERO, &Bytes::from(vec![0u8; 64]));
		assert!(matches!(result, Err(ChainError::ContractCall(_))));
	}

	#[test]
	fn test_call_encoding_carries_address() {
		let address = Address([0xab; 20]);
		let call = IBondingManager::getTranscoderCall {
			_transcoder: address.into(),
		};
		let encoded = call.abi_encode();

		// selector + one left-padded address word
		assert_eq!(encoded.len(), 4 + 32);
		assert_eq!(&encoded[..4], IBondingManager::getTranscoderCall::SELECTOR.as_slice());
		assert_eq!(&encoded[16..], address.as_slice());
	}

	#[test]
	fn test_config_schema_validation() {
		let schema = AlloyChainSchema;
		assert!(schema
			.validate(&config("http://localhost:8545", BONDING_MANAGER))
			.is_ok());

		let err = schema
			.validate(&config("ws://localhost:8546", BONDING_MANAGER))
			.unwrap_err();
		assert!(err.to_string().contains("rpc_url must be an http(s) URL"));

		assert!(schema
			.validate(&config("http://localhost:8545", "0x1234"))
			.is_err());

		let missing = toml::Value::Table(toml::map::Map::new());
		assert!(matches!(
			schema.validate(&missing),
			Err(ValidationError::MissingField(_))
		));
	}

	#[tokio::test]
	async fn test_create_chain_query() {
		let query = create_chain_query(&config("http://127.0.0.1:8545", BONDING_MANAGER));
		assert!(query.is_ok());

		let invalid = create_chain_query(&config("http://127.0.0.1:8545", "not-an-address"));
		assert!(matches!(invalid, Err(ChainError::Configuration(_))));
	}

	#[test]
	fn test_registry_name() {
		assert_eq!(
			<Registry as starter_types::ImplementationRegistry>::NAME,
			"alloy"
		);
	}
}
