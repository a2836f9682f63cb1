//! Account address type for the node starter.
//!
//! Every component that names an operator or a counterpart (keystore files,
//! chain queries, price schedules, persisted orchestrator records) uses this
//! 20-byte representation, so hex with or without a `0x` prefix always
//! normalizes to the same value.

use crate::utils::without_0x_prefix;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur when parsing an address from hex.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
	/// The input contains characters that are not hexadecimal.
	#[error("Invalid hex address: {0}")]
	InvalidHex(String),
	/// The decoded input is not exactly 20 bytes.
	#[error("Invalid address length: expected 20 bytes, got {0}")]
	InvalidLength(usize),
}

/// 20-byte account identifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub [u8; 20]);

impl Address {
	/// Length of an address in bytes.
	pub const LEN: usize = 20;

	/// The all-zero address.
	pub const ZERO: Address = Address([0u8; 20]);

	/// Returns the raw bytes of the address.
	pub fn as_slice(&self) -> &[u8] {
		&self.0
	}

	/// Builds an address from a slice, which must be exactly 20 bytes long.
	pub fn from_slice(bytes: &[u8]) -> Result<Self, AddressError> {
		let array: [u8; 20] = bytes
			.try_into()
			.map_err(|_| AddressError::InvalidLength(bytes.len()))?;
		Ok(Address(array))
	}
}

impl FromStr for Address {
	type Err = AddressError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let bytes =
			hex::decode(without_0x_prefix(s)).map_err(|e| AddressError::InvalidHex(e.to_string()))?;
		Address::from_slice(&bytes)
	}
}

impl fmt::Display for Address {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "0x{}", hex::encode(self.0))
	}
}

impl From<[u8; 20]> for Address {
	fn from(bytes: [u8; 20]) -> Self {
		Address(bytes)
	}
}

impl From<alloy_primitives::Address> for Address {
	fn from(addr: alloy_primitives::Address) -> Self {
		Address(addr.0 .0)
	}
}

impl From<Address> for alloy_primitives::Address {
	fn from(addr: Address) -> Self {
		alloy_primitives::Address::from(addr.0)
	}
}

/// Serializes as a lowercase hex string with 0x prefix.
impl Serialize for Address {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&self.to_string())
	}
}

/// Accepts hex strings with or without the 0x prefix.
impl<'de> Deserialize<'de> for Address {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let s = String::deserialize(deserializer)?;
		s.parse().map_err(serde::de::Error::custom)
	}
}
