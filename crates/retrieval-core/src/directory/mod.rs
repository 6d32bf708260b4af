//! Read-only customer and rate lookups.
//!
//! Customers and rates are owned by other systems. The service consumes them
//! through these traits; [`ConfigDirectory`] serves them from configuration.

use async_trait::async_trait;
use retrieval_config::Config;
use retrieval_types::{Customer, Rate};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DirectoryError {
	#[error("Directory unavailable: {0}")]
	Unavailable(String),
}

#[async_trait]
pub trait CustomerDirectory: Send + Sync {
	/// Looks up a customer. `Ok(None)` means the customer does not exist.
	async fn get_customer(&self, customer_id: &str) -> Result<Option<Customer>, DirectoryError>;
}

#[async_trait]
pub trait RateProvider: Send + Sync {
	/// Rate that applies to the customer, if any is configured.
	async fn rate_for(&self, customer_id: &str) -> Result<Option<Rate>, DirectoryError>;
}

/// Directory backed by the `[[customers]]` and `[rates]` configuration sections.
#[derive(Debug, Clone, Default)]
pub struct ConfigDirectory {
	customers: HashMap<String, Customer>,
	default_rate: Option<Rate>,
	customer_rates: HashMap<String, Rate>,
}

impl ConfigDirectory {
	pub fn new(customers: impl IntoIterator<Item = Customer>) -> Self {
		Self {
			customers: customers.into_iter().map(|c| (c.id.clone(), c)).collect(),
			default_rate: None,
			customer_rates: HashMap::new(),
		}
	}

	pub fn from_config(config: &Config) -> Self {
		Self {
			customers: config
				.customers
				.iter()
				.map(|c| (c.id.clone(), c.clone()))
				.collect(),
			default_rate: config.rates.default.clone(),
			customer_rates: config.rates.customers.clone(),
		}
	}

	pub fn with_default_rate(mut self, rate: Rate) -> Self {
		self.default_rate = Some(rate);
		self
	}

	pub fn with_customer_rate(mut self, customer_id: impl Into<String>, rate: Rate) -> Self {
		self.customer_rates.insert(customer_id.into(), rate);
		self
	}
}

#[async_trait]
impl CustomerDirectory for ConfigDirectory {
	async fn get_customer(&self, customer_id: &str) -> Result<Option<Customer>, DirectoryError> {
		Ok(self.customers.get(customer_id).cloned())
	}
}

#[async_trait]
impl RateProvider for ConfigDirectory {
	async fn rate_for(&self, customer_id: &str) -> Result<Option<Rate>, DirectoryError> {
		Ok(self
			.customer_rates
			.get(customer_id)
			.or(self.default_rate.as_ref())
			.cloned())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use retrieval_config::ConfigBuilder;
	use rust_decimal::Decimal;

	fn rate(retrieval: i64) -> Rate {
		Rate {
			document_retrieval_rate: Decimal::new(retrieval, 2),
			scanning_rate_per_page: Decimal::new(10, 2),
		}
	}

	#[tokio::test]
	async fn test_customer_rate_wins_over_default() {
		let config = ConfigBuilder::new()
			.customer("acme", "Acme Holdings")
			.customer("globex", "Globex")
			.default_rate(rate(500))
			.customer_rate("acme", rate(350))
			.build();
		let directory = ConfigDirectory::from_config(&config);

		assert_eq!(directory.rate_for("acme").await.unwrap(), Some(rate(350)));
		assert_eq!(directory.rate_for("globex").await.unwrap(), Some(rate(500)));
		assert!(directory.get_customer("acme").await.unwrap().is_some());
		assert!(directory.get_customer("initech").await.unwrap().is_none());
	}

	#[tokio::test]
	async fn test_no_rate_configured() {
		let directory = ConfigDirectory::new(vec![Customer {
			id: "acme".into(),
			name: "Acme".into(),
		}]);
		assert_eq!(directory.rate_for("acme").await.unwrap(), None);
	}
}
