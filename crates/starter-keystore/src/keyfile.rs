//! Address extraction from Ethereum keystore files.
//!
//! Key files follow the go-ethereum naming convention
//! `UTC--<timestamp>--<address>` and carry the account address in their JSON
//! body next to the encrypted key material. Only the address is read here.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use starter_types::{parse_address, Address};

static KEYFILE_NAME: Lazy<Regex> = Lazy::new(|| {
	Regex::new(r"^UTC--\S+--(?:0[xX])?([0-9a-fA-F]{40})$").expect("static keyfile regex")
});

/// Body of a key file. Cipher, KDF parameters and MAC are left opaque.
#[derive(Debug, Deserialize)]
struct KeyFile {
	address: Option<String>,
}

/// Extracts the account address from a key file name.
///
/// Returns `None` unless the whole name matches `UTC--<timestamp>--<address>`
/// with exactly 40 hex characters of address, optionally `0x` prefixed.
pub fn address_from_filename(file_name: &str) -> Option<Address> {
	let captures = KEYFILE_NAME.captures(file_name)?;
	parse_address(captures.get(1)?.as_str()).ok()
}

/// Extracts the account address from the JSON content of a key file.
pub fn address_from_keyfile(contents: &[u8]) -> Option<Address> {
	let key_file: KeyFile = match serde_json::from_slice(contents) {
		Ok(key_file) => key_file,
		Err(e) => {
			tracing::debug!(error = %e, "Key file is not valid JSON");
			return None;
		},
	};

	parse_address(key_file.address.as_deref()?).ok()
}

#[cfg(test)]
mod tests {
	use super::*;

	const ADDR: &str = "0000000000000000000000000000000000000001";

	fn expected() -> Address {
		ADDR.parse().unwrap()
	}

	#[test]
	fn test_filename_without_prefix() {
		let name = format!("UTC--2023-01-05T00-46-15.503776013Z--{ADDR}");
		assert_eq!(address_from_filename(&name), Some(expected()));
	}

	#[test]
	fn test_filename_with_prefix() {
		let name = format!("UTC--2023-01-05T00-46-15.503776013Z--0x{ADDR}");
		assert_eq!(address_from_filename(&name), Some(expected()));
	}

	#[test]
	fn test_filename_with_trailing_characters() {
		let name = format!("UTC--2023-01-05T00-46-15.503776013Z--0x{ADDR}123456");
		assert_eq!(address_from_filename(&name), None);
	}

	#[test]
	fn test_filename_without_convention() {
		assert_eq!(address_from_filename("keyfile.json"), None);
		assert_eq!(address_from_filename(&format!("UTC--{ADDR}")), None);
		assert_eq!(address_from_filename(""), None);
	}

	#[test]
	fn test_keyfile_content() {
		let body = format!(
			r#"{{"address":"{ADDR}","crypto":{{"cipher":"1","kdf":"scrypt","mac":"1"}},"id":"1","version":3}}"#
		);
		assert_eq!(address_from_keyfile(body.as_bytes()), Some(expected()));

		let prefixed = format!(r#"{{"address":"0x{ADDR}"}}"#);
		assert_eq!(address_from_keyfile(prefixed.as_bytes()), Some(expected()));
	}

	#[test]
	fn test_keyfile_content_without_address() {
		assert_eq!(address_from_keyfile(br#"{"version":3}"#), None);
		assert_eq!(address_from_keyfile(br#"{"address":"0x1234"}"#), None);
		assert_eq!(address_from_keyfile(br#"{"address":42}"#), None);
	}

	#[test]
	fn test_keyfile_content_malformed() {
		let body = format!(r#"{{{{"address_broken_json":"0x{ADDR}"}}"#);
		assert_eq!(address_from_keyfile(body.as_bytes()), None);
		assert_eq!(address_from_keyfile(b""), None);
	}
}
