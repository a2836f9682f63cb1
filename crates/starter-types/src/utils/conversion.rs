//! Conversion utilities shared by the bootstrap components.

use crate::{Address, AddressError};
use alloy_primitives::U256;

/// Parses a hex string (with or without "0x") into an [`Address`].
pub fn parse_address(hex_str: &str) -> Result<Address, AddressError> {
	hex_str.trim().parse()
}

/// Converts an on-chain round number to the fixed-width form used in storage.
///
/// Values above `i64::MAX` saturate to `i64::MAX`. Returns the converted value
/// and whether saturation happened so callers can report it.
pub fn round_to_i64(value: U256) -> (i64, bool) {
	if value > U256::from(i64::MAX as u64) {
		(i64::MAX, true)
	} else {
		(value.to::<u64>() as i64, false)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_address_trims_whitespace() {
		let addr = parse_address("  0x0000000000000000000000000000000000000001\n").unwrap();
		assert_eq!(addr.0[19], 1);
	}

	#[test]
	fn test_parse_address_rejects_garbage() {
		assert!(parse_address("not-an-address").is_err());
		assert!(parse_address("").is_err());
	}

	#[test]
	fn test_round_to_i64_in_range() {
		assert_eq!(round_to_i64(U256::ZERO), (0, false));
		assert_eq!(round_to_i64(U256::from(5u64)), (5, false));
		assert_eq!(
			round_to_i64(U256::from(i64::MAX as u64)),
			(i64::MAX, false)
		);
	}

	#[test]
	fn test_round_to_i64_saturates() {
		assert_eq!(
			round_to_i64(U256::from(i64::MAX as u64) + U256::from(1u64)),
			(i64::MAX, true)
		);
		assert_eq!(round_to_i64(U256::MAX), (i64::MAX, true));
	}
}
