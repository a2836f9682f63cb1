//! Node startup sequence.
//!
//! Resolves the operator's keystore and account, syncs the on-chain
//! registration when running as an orchestrator, checks the advertised
//! service address and loads broadcaster price caps.

use crate::endpoint::{is_local_url_resolved, UrlError};
use crate::factory_registry::{get_registry, RegistryError};
use crate::orchestrator::{setup_orchestrator, SyncError};
use starter_chain::ChainService;
use starter_config::Config;
use starter_keystore::{resolve_keystore_path, KeystoreError, KeystoreLocation};
use starter_pricing::{load_broadcaster_prices, BroadcasterPriceTable, PricingError};
use starter_storage::{
	create_storage_backend, OrchestratorStore, StorageError, StorageInterface, StorageService,
	StoreConfig,
};
use starter_types::{Address, OrchestratorRecord};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors that can abort node startup.
#[derive(Debug, Error)]
pub enum BootstrapError {
	#[error(transparent)]
	Keystore(#[from] KeystoreError),
	#[error(transparent)]
	Registry(#[from] RegistryError),
	/// Storage selected from the environment could not be configured.
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
	#[error("A chain query backend is required when running as an orchestrator")]
	MissingChain,
	#[error("An account address is required when running as an orchestrator")]
	MissingAccount,
	#[error(transparent)]
	Sync(#[from] SyncError),
	#[error("Invalid service address: {0}")]
	ServiceAddr(#[from] UrlError),
	#[error(transparent)]
	Pricing(#[from] PricingError),
}

/// Backends the startup sequence runs against.
pub struct Backends {
	/// Chain query backend, when one is configured.
	pub chain: Option<ChainService>,
	pub storage: Arc<dyn StorageInterface>,
}

impl Backends {
	/// Builds the configured backends through the factory registry.
	///
	/// Without a `[storage]` section the backend is selected from the
	/// `STORAGE_BACKEND` and `STORAGE_PATH` environment variables.
	pub fn from_config(config: &Config) -> Result<Self, BootstrapError> {
		let registry = get_registry();

		let storage = match &config.storage {
			Some(storage) => registry.build_storage(storage)?,
			None => {
				let store_config = StoreConfig::from_env()?;
				tracing::info!(?store_config, "Using storage backend from environment");
				create_storage_backend(store_config)
			},
		};

		let chain = config
			.chain
			.as_ref()
			.map(|chain| registry.build_chain(chain))
			.transpose()?;

		Ok(Self { chain, storage })
	}
}

/// Everything resolved at startup.
pub struct NodeContext {
	pub keystore: KeystoreLocation,
	/// Directory handed to the keystore manager.
	pub keystore_dir: PathBuf,
	/// Account the node runs as, when known.
	pub account: Option<Address>,
	pub chain: Option<ChainService>,
	pub orchestrators: OrchestratorStore,
	/// This node's registration, synced when running as an orchestrator.
	pub orchestrator: Option<OrchestratorRecord>,
	/// Whether `service_addr` points at this host; `None` when unset.
	pub service_addr_is_local: Option<bool>,
	pub broadcaster_prices: BroadcasterPriceTable,
}

/// Runs the startup sequence against backends built from `config`.
pub async fn bootstrap(config: &Config) -> Result<NodeContext, BootstrapError> {
	let backends = Backends::from_config(config)?;
	bootstrap_with(config, backends).await
}

/// Runs the startup sequence against the given backends.
pub async fn bootstrap_with(
	config: &Config,
	backends: Backends,
) -> Result<NodeContext, BootstrapError> {
	let node = &config.node;

	let keystore_path = Path::new(&node.eth_keystore_path);
	let keystore = resolve_keystore_path(keystore_path)?;
	let keystore_dir = keystore.keystore_dir(keystore_path);
	let account = keystore.check_account(node.eth_acct_addr)?;
	tracing::info!(
		keystore_dir = %keystore_dir.display(),
		account = ?account.map(|a| a.to_string()),
		"Resolved keystore"
	);

	let orchestrators = OrchestratorStore::new(Arc::new(StorageService::new(backends.storage)));

	let orchestrator = if node.orchestrator {
		let chain = backends.chain.as_ref().ok_or(BootstrapError::MissingChain)?;
		let address = account.ok_or(BootstrapError::MissingAccount)?;
		Some(setup_orchestrator(chain, &orchestrators, &address).await?)
	} else {
		None
	};

	let service_addr_is_local = match &node.service_addr {
		Some(service_addr) => {
			let timeout = Duration::from_millis(node.resolve_timeout_ms);
			let local = is_local_url_resolved(service_addr, timeout).await?;
			if local {
				tracing::warn!(
					%service_addr,
					"Service address is local; broadcasters on other hosts cannot reach this node"
				);
			}
			Some(local)
		},
		None => None,
	};

	let broadcaster_prices = match &node.max_price_per_unit_for_broadcaster {
		Some(input) => BroadcasterPriceTable::from_prices(&load_broadcaster_prices(input)?),
		None => BroadcasterPriceTable::default(),
	};
	if !broadcaster_prices.is_empty() {
		tracing::info!(
			broadcasters = broadcaster_prices.len(),
			"Loaded broadcaster price caps"
		);
	}

	Ok(NodeContext {
		keystore,
		keystore_dir,
		account,
		chain: backends.chain,
		orchestrators,
		orchestrator,
		service_addr_is_local,
		broadcaster_prices,
	})
}
