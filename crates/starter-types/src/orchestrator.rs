//! Orchestrator registration types.
//!
//! [`OrchestratorInfo`] is what the chain reports for an account, with rounds
//! as arbitrary-precision integers. [`OrchestratorRecord`] is the fixed-width
//! form persisted locally and read back by node startup.

use crate::utils::round_to_i64;
use crate::Address;
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

/// Registration state of an orchestrator as reported by the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorInfo {
	/// Account the registration belongs to.
	pub address: Address,
	/// Round in which the registration becomes active.
	pub activation_round: U256,
	/// Round in which the registration becomes inactive.
	pub deactivation_round: U256,
}

/// Locally persisted orchestrator registration, unique by address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorRecord {
	pub address: Address,
	pub activation_round: i64,
	pub deactivation_round: i64,
}

impl From<&OrchestratorInfo> for OrchestratorRecord {
	/// Round numbers above `i64::MAX` saturate.
	fn from(info: &OrchestratorInfo) -> Self {
		let (activation_round, activation_saturated) = round_to_i64(info.activation_round);
		let (deactivation_round, deactivation_saturated) = round_to_i64(info.deactivation_round);

		if activation_saturated || deactivation_saturated {
			tracing::warn!(
				address = %info.address,
				activation_round = %info.activation_round,
				deactivation_round = %info.deactivation_round,
				"Round number exceeds i64 range, saturating"
			);
		}

		Self {
			address: info.address,
			activation_round,
			deactivation_round,
		}
	}
}
