//! Orchestrator registration records.
//!
//! Records are stored under the `orchestrators` namespace with the address as
//! id, and indexed by address so they can be selected in bulk.

use crate::{QueryFilter, StorageError, StorageIndexes, StorageService};
use starter_types::{Address, OrchestratorRecord, StorageKey};
use std::sync::Arc;

const ADDRESS_FIELD: &str = "address";

/// Selection criteria for [`OrchestratorStore::select`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrchestratorFilter {
	/// Addresses to select; empty selects every record.
	pub addresses: Vec<Address>,
}

impl OrchestratorFilter {
	pub fn by_address(address: Address) -> Self {
		Self {
			addresses: vec![address],
		}
	}
}

/// Typed access to persisted orchestrator records.
#[derive(Clone)]
pub struct OrchestratorStore {
	storage: Arc<StorageService>,
}

impl OrchestratorStore {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	/// Inserts the record or replaces the one stored for the same address.
	pub async fn upsert(&self, record: &OrchestratorRecord) -> Result<(), StorageError> {
		let id = record.address.to_string();
		let indexes = StorageIndexes::new().with_field(ADDRESS_FIELD, &id);

		self.storage
			.store(StorageKey::Orchestrators.as_str(), &id, record, Some(indexes))
			.await?;

		tracing::debug!(
			address = %record.address,
			activation_round = record.activation_round,
			deactivation_round = record.deactivation_round,
			"Stored orchestrator record"
		);
		Ok(())
	}

	/// Returns the records matching `filter`, ordered by address.
	pub async fn select(
		&self,
		filter: &OrchestratorFilter,
	) -> Result<Vec<OrchestratorRecord>, StorageError> {
		let query = if filter.addresses.is_empty() {
			QueryFilter::All
		} else {
			QueryFilter::In(
				ADDRESS_FIELD.to_string(),
				filter
					.addresses
					.iter()
					.map(|address| serde_json::Value::String(address.to_string()))
					.collect(),
			)
		};

		let mut records: Vec<OrchestratorRecord> = self
			.storage
			.query(StorageKey::Orchestrators.as_str(), query)
			.await?
			.into_iter()
			.map(|(_, record)| record)
			.collect();
		records.sort_by_key(|record| record.address);
		Ok(records)
	}

	/// Looks up the record for a single address.
	pub async fn get(&self, address: &Address) -> Result<Option<OrchestratorRecord>, StorageError> {
		match self
			.storage
			.retrieve(StorageKey::Orchestrators.as_str(), &address.to_string())
			.await
		{
			Ok(record) => Ok(Some(record)),
			Err(StorageError::NotFound(_)) => Ok(None),
			Err(e) => Err(e),
		}
	}
}
