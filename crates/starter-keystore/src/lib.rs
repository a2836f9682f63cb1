//! Keystore resolution for the node starter.
//!
//! The operator names a keystore either as a directory, which is handed as-is to the
//! external keystore manager, or as a single key file whose account address is
//! discovered from the file name or, failing that, from the file's JSON body.
//! Nothing here decrypts or unlocks key material.

use starter_types::Address;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Key file name and content parsing.
pub mod keyfile;

pub use keyfile::{address_from_filename, address_from_keyfile};

/// Errors that can occur while resolving a keystore path.
#[derive(Debug, Error)]
pub enum KeystoreError {
	/// The configured path does not exist.
	#[error("provided -ethKeystorePath was not found")]
	NotFound(PathBuf),
	/// Neither the file name nor the file content yielded an address.
	#[error("error parsing address from keyfile")]
	Parse(PathBuf),
	/// The key file belongs to a different account than the one configured.
	#[error("keyfile address {found} does not match configured account {configured}")]
	AddressMismatch { configured: Address, found: Address },
}

/// Outcome of resolving a keystore path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeystoreLocation {
	/// A keystore directory, left for the keystore manager to scan.
	Directory(PathBuf),
	/// A single key file belonging to this account.
	Address(Address),
}

impl KeystoreLocation {
	/// Directory to hand to the keystore manager.
	///
	/// For a key file this is the directory containing `original`, the path the
	/// location was resolved from.
	pub fn keystore_dir(&self, original: &Path) -> PathBuf {
		match self {
			KeystoreLocation::Directory(dir) => dir.clone(),
			KeystoreLocation::Address(_) => match original.parent() {
				Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
				_ => PathBuf::from("."),
			},
		}
	}

	/// Returns the account to run as.
	///
	/// A key file pins the account, so a configured account must agree with it.
	/// A directory defers to the configured account, if any.
	pub fn check_account(
		&self,
		configured: Option<Address>,
	) -> Result<Option<Address>, KeystoreError> {
		match (self, configured) {
			(KeystoreLocation::Address(found), Some(configured)) if *found != configured => {
				Err(KeystoreError::AddressMismatch {
					configured,
					found: *found,
				})
			},
			(KeystoreLocation::Address(found), _) => Ok(Some(*found)),
			(KeystoreLocation::Directory(_), configured) => Ok(configured),
		}
	}
}

/// Two-field view of a resolved keystore; exactly one field is set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeystoreInfo {
	pub path: Option<PathBuf>,
	pub address: Option<Address>,
}

impl From<KeystoreLocation> for KeystoreInfo {
	fn from(location: KeystoreLocation) -> Self {
		match location {
			KeystoreLocation::Directory(path) => KeystoreInfo {
				path: Some(path),
				address: None,
			},
			KeystoreLocation::Address(address) => KeystoreInfo {
				path: None,
				address: Some(address),
			},
		}
	}
}

/// Resolves a keystore path to a directory or to the address of a key file.
///
/// For a file, the name is tried first (`UTC--<timestamp>--<address>`), then the
/// `address` field of its JSON content.
pub fn resolve_keystore_path(path: impl AsRef<Path>) -> Result<KeystoreLocation, KeystoreError> {
	let path = path.as_ref();
	let metadata = std::fs::metadata(path).map_err(|e| {
		tracing::debug!(path = %path.display(), error = %e, "Keystore path not accessible");
		KeystoreError::NotFound(path.to_path_buf())
	})?;

	if metadata.is_dir() {
		tracing::debug!(path = %path.display(), "Using keystore directory");
		return Ok(KeystoreLocation::Directory(path.to_path_buf()));
	}

	let file_name = path.file_name().and_then(|name| name.to_str());
	if let Some(address) = file_name.and_then(address_from_filename) {
		tracing::debug!(path = %path.display(), %address, "Parsed address from keyfile name");
		return Ok(KeystoreLocation::Address(address));
	}

	let contents = std::fs::read(path).map_err(|e| {
		tracing::debug!(path = %path.display(), error = %e, "Failed to read keyfile");
		KeystoreError::Parse(path.to_path_buf())
	})?;

	match address_from_keyfile(&contents) {
		Some(address) => {
			tracing::debug!(path = %path.display(), %address, "Parsed address from keyfile content");
			Ok(KeystoreLocation::Address(address))
		},
		None => Err(KeystoreError::Parse(path.to_path_buf())),
	}
}
