//! Provider utilities for creating Alloy providers.

use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use alloy_rpc_client::RpcClient;
use alloy_transport::layers::RetryBackoffLayer;
use thiserror::Error;

/// Errors that can occur during provider creation.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
	/// The RPC URL could not be parsed.
	#[error("Invalid URL: {0}")]
	InvalidUrl(String),
}

/// Creates an HTTP provider for the given RPC endpoint.
///
/// The transport retries rate-limited requests with exponential backoff
/// (up to 5 attempts, 1000ms initial backoff, 10 compute units per second).
pub fn create_http_provider(rpc_url: &str) -> Result<DynProvider, ProviderError> {
	let url = rpc_url
		.parse()
		.map_err(|e| ProviderError::InvalidUrl(format!("Invalid HTTP RPC URL {rpc_url}: {e}")))?;

	let retry_layer = RetryBackoffLayer::new(5, 1000, 10);
	let client = RpcClient::builder().layer(retry_layer).http(url);

	let provider = ProviderBuilder::new().connect_client(client);
	Ok(provider.erased())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_create_http_provider_rejects_invalid_url() {
		let result = create_http_provider("not a url");
		assert!(matches!(result, Err(ProviderError::InvalidUrl(_))));
	}

	#[tokio::test]
	async fn test_create_http_provider_accepts_http_url() {
		assert!(create_http_provider("http://127.0.0.1:8545").is_ok());
	}
}
