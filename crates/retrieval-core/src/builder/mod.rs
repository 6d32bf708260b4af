//! Builder for constructing retrieval engines.
//!
//! Storage backends are created through factory functions keyed by
//! implementation name, the same names used under `[storage.implementations]`
//! in the configuration. Everything else is wired from the configuration
//! directly.

use crate::audit::{AuditLog, StorageAuditLog, TracingAuditLog};
use crate::clock::{Clock, SystemClock};
use crate::directory::ConfigDirectory;
use crate::engine::{event_bus::EventBus, RetrievalEngine};
use crate::monitoring::EscalationMonitor;
use crate::state::OrderStateMachine;
use retrieval_config::{AuditSink, Config};
use retrieval_storage::{StorageError, StorageInterface, StorageService};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during engine construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Builder for a [`RetrievalEngine`] with a pluggable storage backend.
pub struct EngineBuilder {
	config: Config,
	clock: Option<Arc<dyn Clock>>,
}

impl EngineBuilder {
	pub fn new(config: Config) -> Self {
		Self {
			config,
			clock: None,
		}
	}

	/// Replaces the system clock. Used by tests to control SLA time.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = Some(clock);
		self
	}

	pub fn build<SF>(
		self,
		storage_factories: HashMap<String, SF>,
	) -> Result<RetrievalEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
	{
		let mut storage_impls = HashMap::new();
		for (name, config) in &self.config.storage.implementations {
			if let Some(factory) = storage_factories.get(name) {
				match factory(config) {
					Ok(implementation) => {
						storage_impls.insert(name.clone(), implementation);
						let is_primary = &self.config.storage.primary == name;
						tracing::info!(component = "storage", implementation = %name, enabled = %is_primary, "Loaded");
					},
					Err(e) => {
						tracing::error!(
							component = "storage",
							implementation = %name,
							error = %e,
							"Failed to create storage implementation"
						);
						return Err(BuilderError::Config(format!(
							"Failed to create storage implementation '{}': {}",
							name, e
						)));
					},
				}
			} else {
				tracing::warn!(component = "storage", implementation = %name, "Unknown implementation, skipped");
			}
		}

		if storage_impls.is_empty() {
			return Err(BuilderError::Config(
				"No valid storage implementations available".into(),
			));
		}

		let primary_storage = &self.config.storage.primary;
		let storage_backend = storage_impls.remove(primary_storage).ok_or_else(|| {
			BuilderError::MissingComponent(format!(
				"Primary storage '{}' failed to load or has invalid configuration",
				primary_storage
			))
		})?;

		let storage = Arc::new(StorageService::new(storage_backend));

		let audit: Arc<dyn AuditLog> = match self.config.audit.sink {
			AuditSink::Storage => Arc::new(StorageAuditLog::new(storage.clone())),
			AuditSink::Log => Arc::new(TracingAuditLog),
		};
		tracing::info!(component = "audit", sink = ?self.config.audit.sink, "Loaded");

		let directory = Arc::new(ConfigDirectory::from_config(&self.config));
		tracing::info!(
			component = "directory",
			customers = self.config.customers.len(),
			"Loaded"
		);

		let clock: Arc<dyn Clock> = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
		let event_bus = EventBus::new(1000);

		let state_machine = Arc::new(OrderStateMachine::new(
			storage.clone(),
			clock,
			audit,
			directory.clone(),
			directory,
			event_bus.clone(),
			&self.config.orders,
		));
		let monitor = Arc::new(EscalationMonitor::new(state_machine.clone()));

		Ok(RetrievalEngine::new(
			self.config,
			storage,
			state_machine,
			monitor,
			event_bus,
		))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use retrieval_config::ConfigBuilder;
	use retrieval_storage::implementations::memory;

	type Factory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

	fn memory_factories() -> HashMap<String, Factory> {
		let mut factories: HashMap<String, Factory> = HashMap::new();
		factories.insert("memory".to_string(), memory::create_storage);
		factories
	}

	#[test]
	fn test_build_with_memory_storage() {
		let config = ConfigBuilder::new().customer("acme", "Acme Ltd").build();
		let engine = EngineBuilder::new(config).build(memory_factories());
		assert!(engine.is_ok());
	}

	#[test]
	fn test_primary_without_factory() {
		let config = ConfigBuilder::new()
			.storage("file", toml::Value::Table(toml::map::Map::new()))
			.build();
		let result = EngineBuilder::new(config).build(memory_factories());
		assert!(matches!(result, Err(BuilderError::MissingComponent(_))));
	}

	#[test]
	fn test_factory_error_is_reported() {
		let config = ConfigBuilder::new().build();
		let mut factories: HashMap<String, Factory> = HashMap::new();
		factories.insert("memory".to_string(), |_| {
			Err(StorageError::Configuration("broken".into()))
		});
		let result = EngineBuilder::new(config).build(factories);
		match result {
			Err(BuilderError::Config(msg)) => assert!(msg.contains("broken")),
			_ => panic!("expected configuration error"),
		}
	}
}
