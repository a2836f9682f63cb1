//! Utility functions for the node starter types.

pub mod conversion;
pub mod formatting;

pub use conversion::{parse_address, round_to_i64};
pub use formatting::without_0x_prefix;
