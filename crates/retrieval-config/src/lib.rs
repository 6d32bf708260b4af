//! Configuration module for the records retrieval service.
//!
//! Configuration is read from TOML files. Values may reference environment
//! variables with `${VAR}` or `${VAR:-default}`, and the result is validated
//! before it is handed to the engine.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files:
//! - Use `include = ["storage.toml", "customers.toml"]` to include other files
//! - Each top-level section must be unique across all files (no duplicates allowed)

pub mod builders {
	pub mod config;
}
mod loader;

pub use builders::config::ConfigBuilder;

use regex::Regex;
use retrieval_types::{Customer, Rate};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep only the message; the full error embeds the whole input.
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the retrieval service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Identity of this service instance.
	pub service: ServiceConfig,
	/// Storage backend selection and backend tables.
	pub storage: StorageConfig,
	/// Order numbering.
	#[serde(default)]
	pub orders: OrdersConfig,
	/// SLA escalation sweep.
	#[serde(default)]
	pub escalation: EscalationConfig,
	/// Where audit notes go.
	#[serde(default)]
	pub audit: AuditConfig,
	/// Read-only customer directory.
	#[serde(default)]
	pub customers: Vec<Customer>,
	/// Billing rates used for cost estimates.
	#[serde(default)]
	pub rates: RatesConfig,
	/// Configuration for the HTTP API server.
	pub api: Option<ApiConfig>,
}

/// Configuration specific to the service instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
	/// Unique identifier for this instance, used in logs.
	pub id: String,
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
	/// Interval in seconds for cleaning up expired storage entries.
	pub cleanup_interval_seconds: u64,
}

/// Reference number format: `{reference_prefix}/{year}/{counter}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OrdersConfig {
	#[serde(default = "default_reference_prefix")]
	pub reference_prefix: String,
	/// Width the counter is zero-padded to.
	#[serde(default = "default_reference_padding")]
	pub reference_padding: usize,
}

impl Default for OrdersConfig {
	fn default() -> Self {
		Self {
			reference_prefix: default_reference_prefix(),
			reference_padding: default_reference_padding(),
		}
	}
}

fn default_reference_prefix() -> String {
	"RET".to_string()
}

fn default_reference_padding() -> usize {
	5
}

/// Configuration for the escalation sweep.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EscalationConfig {
	/// Whether the engine runs the sweep at all.
	#[serde(default = "default_true")]
	pub enabled: bool,
	/// Seconds between two sweeps.
	#[serde(default = "default_escalation_interval")]
	pub interval_seconds: u64,
}

impl Default for EscalationConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			interval_seconds: default_escalation_interval(),
		}
	}
}

fn default_true() -> bool {
	true
}

/// Returns the default sweep interval of 5 minutes.
fn default_escalation_interval() -> u64 {
	300
}

/// Audit sink selection.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuditSink {
	/// Persist notes next to the order so they can be read back.
	#[default]
	Storage,
	/// Write notes to the log only.
	Log,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AuditConfig {
	#[serde(default)]
	pub sink: AuditSink,
}

/// Billing rates. A customer-specific rate wins over the default.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RatesConfig {
	pub default: Option<Rate>,
	#[serde(default)]
	pub customers: HashMap<String, Rate>,
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	/// Whether the API server is enabled.
	#[serde(default)]
	pub enabled: bool,
	/// Host address to bind the server to.
	#[serde(default = "default_api_host")]
	pub host: String,
	/// Port to bind the server to.
	#[serde(default = "default_api_port")]
	pub port: u16,
}

impl Default for ApiConfig {
	fn default() -> Self {
		Self {
			enabled: false,
			host: default_api_host(),
			port: default_api_port(),
		}
	}
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	3000
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last_end = 0;

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let default_value = cap.get(2).map(|m| m.as_str());

		let value = match std::env::var(var_name.as_str()) {
			Ok(v) => v,
			Err(_) => match default_value {
				Some(default) => default.to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)))
				},
			},
		};

		result.push_str(&input[last_end..full_match.start()]);
		result.push_str(&value);
		last_end = full_match.end();
	}
	result.push_str(&input[last_end..]);

	Ok(result)
}

impl Config {
	/// Loads configuration from a file, following `include` directives.
	///
	/// Each top-level section must be unique across all configuration files.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Rate that applies to `customer_id`, falling back to the default rate.
	pub fn rate_for(&self, customer_id: &str) -> Option<&Rate> {
		self.rates
			.customers
			.get(customer_id)
			.or(self.rates.default.as_ref())
	}

	/// Validates the configuration to ensure all values are usable.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.service.id.trim().is_empty() {
			return Err(ConfigError::Validation("Service ID cannot be empty".into()));
		}

		// Storage
		if self.storage.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one storage implementation must be configured".into(),
			));
		}
		if self.storage.primary.is_empty() {
			return Err(ConfigError::Validation(
				"Storage primary implementation cannot be empty".into(),
			));
		}
		if !self
			.storage
			.implementations
			.contains_key(&self.storage.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary storage '{}' not found in implementations",
				self.storage.primary
			)));
		}
		if self.storage.cleanup_interval_seconds == 0 {
			return Err(ConfigError::Validation(
				"Storage cleanup_interval_seconds must be greater than 0".into(),
			));
		}
		if self.storage.cleanup_interval_seconds > 86400 {
			return Err(ConfigError::Validation(
				"Storage cleanup_interval_seconds cannot exceed 86400 (24 hours)".into(),
			));
		}

		// Orders
		if self.orders.reference_prefix.trim().is_empty() {
			return Err(ConfigError::Validation(
				"orders.reference_prefix cannot be empty".into(),
			));
		}
		if self.orders.reference_prefix.contains(['/', ':']) {
			return Err(ConfigError::Validation(
				"orders.reference_prefix cannot contain '/' or ':'".into(),
			));
		}
		if !(1..=12).contains(&self.orders.reference_padding) {
			return Err(ConfigError::Validation(
				"orders.reference_padding must be between 1 and 12".into(),
			));
		}

		// Escalation
		if self.escalation.interval_seconds == 0 {
			return Err(ConfigError::Validation(
				"escalation.interval_seconds must be greater than 0".into(),
			));
		}
		if self.escalation.interval_seconds > 86400 {
			return Err(ConfigError::Validation(
				"escalation.interval_seconds cannot exceed 86400 (24 hours)".into(),
			));
		}

		// Customers
		let mut customer_ids = HashSet::new();
		for customer in &self.customers {
			if customer.id.trim().is_empty() {
				return Err(ConfigError::Validation("Customer ID cannot be empty".into()));
			}
			if !customer_ids.insert(customer.id.as_str()) {
				return Err(ConfigError::Validation(format!(
					"Duplicate customer '{}'",
					customer.id
				)));
			}
		}

		// Rates
		if let Some(rate) = &self.rates.default {
			validate_rate("rates.default", rate)?;
		}
		for (customer_id, rate) in &self.rates.customers {
			if !customer_ids.contains(customer_id.as_str()) {
				return Err(ConfigError::Validation(format!(
					"Rate configured for unknown customer '{}'",
					customer_id
				)));
			}
			validate_rate(&format!("rates.customers.{}", customer_id), rate)?;
		}

		// API
		if let Some(api) = &self.api {
			if api.enabled && api.host.trim().is_empty() {
				return Err(ConfigError::Validation("API host cannot be empty".into()));
			}
		}

		Ok(())
	}
}

fn validate_rate(section: &str, rate: &Rate) -> Result<(), ConfigError> {
	if rate.document_retrieval_rate.is_sign_negative()
		|| rate.scanning_rate_per_page.is_sign_negative()
	{
		return Err(ConfigError::Validation(format!(
			"{}: rates cannot be negative",
			section
		)));
	}
	Ok(())
}

/// Parses a TOML string, resolving environment variables first and
/// validating the result.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
