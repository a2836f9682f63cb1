//! Broadcaster price schedule types.

use crate::Address;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum price a counterpart broadcaster advertises, per unit of pixels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcasterPrice {
	/// Broadcaster account.
	pub address: Address,
	/// Price charged per unit.
	pub price_per_unit: i64,
	/// Pixels that make up one unit.
	pub pixels_per_unit: i64,
}

impl BroadcasterPrice {
	/// Effective price per pixel as an exact ratio.
	///
	/// Returns `None` when `pixels_per_unit` is zero.
	pub fn price_ratio(&self) -> Option<PriceRatio> {
		PriceRatio::new(self.price_per_unit, self.pixels_per_unit)
	}
}

/// Exact rational price, always in lowest terms with a positive denominator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PriceRatio {
	numer: i64,
	denom: i64,
}

impl PriceRatio {
	/// Creates a reduced ratio.
	///
	/// Returns `None` for a zero denominator, or when the reduced value cannot be
	/// represented (only `i64::MIN / -1`).
	pub fn new(numer: i64, denom: i64) -> Option<Self> {
		if denom == 0 {
			return None;
		}

		let (mut n, mut d) = (numer as i128, denom as i128);
		if d < 0 {
			n = -n;
			d = -d;
		}

		let divisor = gcd(n.unsigned_abs(), d.unsigned_abs()) as i128;
		let (n, d) = (n / divisor, d / divisor);

		Some(Self {
			numer: i64::try_from(n).ok()?,
			denom: i64::try_from(d).ok()?,
		})
	}

	pub fn numer(&self) -> i64 {
		self.numer
	}

	pub fn denom(&self) -> i64 {
		self.denom
	}

	/// Decimal approximation for display and logging.
	pub fn to_decimal(&self) -> Option<Decimal> {
		Decimal::from(self.numer).checked_div(Decimal::from(self.denom))
	}
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
	while b != 0 {
		(a, b) = (b, a % b);
	}
	a.max(1)
}

impl fmt::Display for PriceRatio {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}", self.numer, self.denom)
	}
}
