//! Configuration builder for tests and local development.

use crate::{
	ApiConfig, AuditConfig, AuditSink, Config, EscalationConfig, OrdersConfig, RatesConfig,
	ServiceConfig, StorageConfig,
};
use retrieval_types::{Customer, Rate};
use std::collections::HashMap;

/// Builder for `Config` with defaults suitable for tests: in-memory storage,
/// storage-backed audit, no customers and no rates.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	service_id: String,
	storage_primary: String,
	storage_implementations: HashMap<String, toml::Value>,
	storage_cleanup_interval_seconds: u64,
	orders: OrdersConfig,
	escalation: EscalationConfig,
	audit_sink: AuditSink,
	customers: Vec<Customer>,
	rates: RatesConfig,
	api: Option<ApiConfig>,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	pub fn new() -> Self {
		let mut storage_implementations = HashMap::new();
		storage_implementations.insert(
			"memory".to_string(),
			toml::Value::Table(toml::map::Map::new()),
		);

		Self {
			service_id: "test-retrieval".to_string(),
			storage_primary: "memory".to_string(),
			storage_implementations,
			storage_cleanup_interval_seconds: 60,
			orders: OrdersConfig::default(),
			escalation: EscalationConfig::default(),
			audit_sink: AuditSink::Storage,
			customers: Vec::new(),
			rates: RatesConfig::default(),
			api: None,
		}
	}

	pub fn service_id(mut self, id: impl Into<String>) -> Self {
		self.service_id = id.into();
		self
	}

	/// Selects the primary storage backend and its configuration table.
	pub fn storage(mut self, primary: impl Into<String>, config: toml::Value) -> Self {
		let primary = primary.into();
		self.storage_implementations.insert(primary.clone(), config);
		self.storage_primary = primary;
		self
	}

	pub fn storage_cleanup_interval_seconds(mut self, interval: u64) -> Self {
		self.storage_cleanup_interval_seconds = interval;
		self
	}

	pub fn reference_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.orders.reference_prefix = prefix.into();
		self
	}

	pub fn reference_padding(mut self, padding: usize) -> Self {
		self.orders.reference_padding = padding;
		self
	}

	pub fn escalation_enabled(mut self, enabled: bool) -> Self {
		self.escalation.enabled = enabled;
		self
	}

	pub fn escalation_interval_seconds(mut self, interval: u64) -> Self {
		self.escalation.interval_seconds = interval;
		self
	}

	pub fn audit_sink(mut self, sink: AuditSink) -> Self {
		self.audit_sink = sink;
		self
	}

	/// Adds a customer to the directory.
	pub fn customer(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
		self.customers.push(Customer {
			id: id.into(),
			name: name.into(),
		});
		self
	}

	pub fn default_rate(mut self, rate: Rate) -> Self {
		self.rates.default = Some(rate);
		self
	}

	pub fn customer_rate(mut self, customer_id: impl Into<String>, rate: Rate) -> Self {
		self.rates.customers.insert(customer_id.into(), rate);
		self
	}

	pub fn api(mut self, api: Option<ApiConfig>) -> Self {
		self.api = api;
		self
	}

	/// Builds the `Config`. No validation is performed.
	pub fn build(self) -> Config {
		Config {
			service: ServiceConfig {
				id: self.service_id,
			},
			storage: StorageConfig {
				primary: self.storage_primary,
				implementations: self.storage_implementations,
				cleanup_interval_seconds: self.storage_cleanup_interval_seconds,
			},
			orders: self.orders,
			escalation: self.escalation,
			audit: AuditConfig {
				sink: self.audit_sink,
			},
			customers: self.customers,
			rates: self.rates,
			api: self.api,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rust_decimal::Decimal;

	#[test]
	fn test_builder_defaults() {
		let config = ConfigBuilder::new().build();
		assert_eq!(config.storage.primary, "memory");
		assert!(config.storage.implementations.contains_key("memory"));
		assert_eq!(config.orders.reference_prefix, "RET");
		assert_eq!(config.audit.sink, AuditSink::Storage);
	}

	#[test]
	fn test_builder_customers_and_rates() {
		let rate = Rate {
			document_retrieval_rate: Decimal::new(350, 2),
			scanning_rate_per_page: Decimal::new(10, 2),
		};
		let config = ConfigBuilder::new()
			.customer("acme", "Acme Holdings")
			.customer_rate("acme", rate.clone())
			.build();

		assert_eq!(config.customers.len(), 1);
		assert_eq!(config.rate_for("acme"), Some(&rate));
		assert_eq!(config.rate_for("other"), None);
	}
}
