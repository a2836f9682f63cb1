//! Orchestrator registration sync.

use starter_chain::{ChainError, ChainService};
use starter_storage::{OrchestratorStore, StorageError};
use starter_types::{Address, OrchestratorRecord};
use thiserror::Error;

/// Errors that can occur while syncing an orchestrator registration.
#[derive(Debug, Error)]
pub enum SyncError {
	/// The chain query failed; carries the query error unchanged.
	#[error(transparent)]
	Chain(#[from] ChainError),
	/// The record could not be stored.
	#[error("Failed to store orchestrator record: {0}")]
	Storage(#[from] StorageError),
}

/// Fetches the on-chain registration of `address` and upserts it locally.
///
/// A failed chain query is returned as-is and leaves the store untouched.
/// Rounds beyond `i64::MAX` saturate.
pub async fn setup_orchestrator(
	chain: &ChainService,
	store: &OrchestratorStore,
	address: &Address,
) -> Result<OrchestratorRecord, SyncError> {
	let info = chain.get_orchestrator(address).await?;
	let record = OrchestratorRecord::from(&info);

	store.upsert(&record).await?;

	tracing::info!(
		%address,
		activation_round = record.activation_round,
		deactivation_round = record.deactivation_round,
		"Synced orchestrator registration"
	);
	Ok(record)
}
