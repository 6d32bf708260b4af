//! Customer and billing rate records.
//!
//! Both are owned by systems outside this service and are consumed read-only
//! through the directory in the core crate.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A customer that retrieval orders are raised for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Customer {
	pub id: String,
	pub name: String,
}

/// Billing rates applied to a retrieval order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rate {
	/// Flat charge per retrieved item.
	pub document_retrieval_rate: Decimal,
	/// Charge per scanned page.
	pub scanning_rate_per_page: Decimal,
}

impl Rate {
	/// Estimated charge for `items` items totalling `pages` pages.
	pub fn estimate(&self, items: u32, pages: u64) -> Decimal {
		self.document_retrieval_rate * Decimal::from(items)
			+ self.scanning_rate_per_page * Decimal::from(pages)
	}
}
