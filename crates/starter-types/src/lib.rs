//! Common types module for the node starter.
//!
//! This module defines the data types shared by every bootstrap component:
//! account addresses, orchestrator registration records, broadcaster price
//! entries, storage namespaces and the configuration validation framework.

/// Account addresses.
pub mod account;
/// Orchestrator registration types, on-chain and persisted.
pub mod orchestrator;
/// Broadcaster price schedule types.
pub mod pricing;
/// Provider utilities for creating Alloy providers.
pub mod provider;
/// Registry trait for self-registering implementations.
pub mod registry;
/// Storage namespaces.
pub mod storage;
/// Utility functions for common conversions.
pub mod utils;
/// Configuration validation types for backend tables.
pub mod validation;

pub use account::{Address, AddressError};
pub use orchestrator::{OrchestratorInfo, OrchestratorRecord};
pub use pricing::{BroadcasterPrice, PriceRatio};
pub use provider::{create_http_provider, ProviderError};
pub use registry::ImplementationRegistry;
pub use storage::StorageKey;
pub use utils::{parse_address, round_to_i64, without_0x_prefix};
pub use validation::*;
