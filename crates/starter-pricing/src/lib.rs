//! Broadcaster price lists.
//!
//! Orchestrators can cap the price they accept from specific broadcasters with
//! a JSON document of the form
//! `{"broadcasters":[{"ethaddress":"0x..","priceperunit":1000,"pixelsperunit":1}]}`,
//! given either inline or as a path to a file.

use serde::Deserialize;
use starter_types::{Address, BroadcasterPrice, PriceRatio};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while reading a price list.
#[derive(Debug, Error)]
pub enum PricingError {
	/// The price list file exists but could not be read.
	#[error("Failed to read price list {path}: {source}")]
	Io {
		path: String,
		#[source]
		source: std::io::Error,
	},
	/// The document is not a valid price list.
	#[error("Invalid price list: {0}")]
	Parse(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct PriceListDocument {
	broadcasters: Vec<PriceListEntry>,
}

#[derive(Debug, Deserialize)]
struct PriceListEntry {
	ethaddress: String,
	priceperunit: i64,
	pixelsperunit: i64,
}

impl PriceListEntry {
	fn into_price(self) -> Option<BroadcasterPrice> {
		match self.ethaddress.parse::<Address>() {
			Ok(address) => Some(BroadcasterPrice {
				address,
				price_per_unit: self.priceperunit,
				pixels_per_unit: self.pixelsperunit,
			}),
			Err(e) => {
				tracing::warn!(
					ethaddress = %self.ethaddress,
					error = %e,
					"Skipping broadcaster price with invalid address"
				);
				None
			},
		}
	}
}

/// Parses a price list, keeping entries in document order.
///
/// Values are copied as-is; zero or negative `pixelsperunit` is left for the
/// caller to reject. An entry whose `ethaddress` is not a 20-byte hex address
/// is skipped; the rest of the list is kept.
pub fn try_parse_broadcaster_prices(json: &str) -> Result<Vec<BroadcasterPrice>, PricingError> {
	let document: PriceListDocument = serde_json::from_str(json)?;
	Ok(document
		.broadcasters
		.into_iter()
		.filter_map(PriceListEntry::into_price)
		.collect())
}

/// Parses a price list, returning an empty list when the document is malformed.
pub fn parse_broadcaster_prices(json: &str) -> Vec<BroadcasterPrice> {
	try_parse_broadcaster_prices(json).unwrap_or_else(|e| {
		tracing::warn!(error = %e, "Ignoring malformed broadcaster price list");
		Vec::new()
	})
}

/// Loads a price list from a file path or, when no such file exists, from the
/// input itself as inline JSON.
///
/// Malformed content is handled as by [`parse_broadcaster_prices`]; only an
/// existing but unreadable file is an error.
pub fn load_broadcaster_prices(input: &str) -> Result<Vec<BroadcasterPrice>, PricingError> {
	let path = Path::new(input);
	if path.is_file() {
		let content = std::fs::read_to_string(path).map_err(|source| PricingError::Io {
			path: input.to_string(),
			source,
		})?;
		return Ok(parse_broadcaster_prices(&content));
	}

	Ok(parse_broadcaster_prices(input))
}

/// Maximum accepted price per pixel, by broadcaster.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcasterPriceTable {
	prices: HashMap<Address, PriceRatio>,
}

impl BroadcasterPriceTable {
	/// Builds a table from a parsed price list.
	///
	/// Later entries for the same broadcaster replace earlier ones. Entries with
	/// zero `pixels_per_unit` have no price and are skipped.
	pub fn from_prices(prices: &[BroadcasterPrice]) -> Self {
		let mut table = HashMap::new();
		for price in prices {
			match price.price_ratio() {
				Some(ratio) => {
					tracing::debug!(
						address = %price.address,
						price = %ratio,
						price_per_pixel = ?ratio.to_decimal(),
						"Set max price for broadcaster"
					);
					table.insert(price.address, ratio);
				},
				None => tracing::warn!(
					address = %price.address,
					price_per_unit = price.price_per_unit,
					"Skipping broadcaster price with zero pixels per unit"
				),
			}
		}
		Self { prices: table }
	}

	/// Maximum price per pixel for `address`, if one was configured.
	pub fn get(&self, address: &Address) -> Option<PriceRatio> {
		self.prices.get(address).copied()
	}

	pub fn len(&self) -> usize {
		self.prices.len()
	}

	pub fn is_empty(&self) -> bool {
		self.prices.is_empty()
	}
}
