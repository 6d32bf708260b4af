//! Retrieval engine: owns the long-running background work.
//!
//! The engine runs the escalation sweep and the storage TTL cleanup on their
//! configured intervals and logs order events until it is told to stop.

pub mod event_bus;
pub mod lifecycle;

use crate::monitoring::EscalationMonitor;
use crate::state::OrderStateMachine;
use retrieval_config::Config;
use retrieval_storage::StorageService;
use retrieval_types::{truncate_id, OrderEvent};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;

/// Errors that can occur while running the engine.
#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Service error: {0}")]
	Service(String),
}

/// Main retrieval engine.
#[derive(Clone)]
pub struct RetrievalEngine {
	pub(crate) config: Config,
	pub(crate) storage: Arc<StorageService>,
	pub(crate) state_machine: Arc<OrderStateMachine>,
	pub(crate) monitor: Arc<EscalationMonitor>,
	pub(crate) event_bus: event_bus::EventBus,
}

impl RetrievalEngine {
	pub fn new(
		config: Config,
		storage: Arc<StorageService>,
		state_machine: Arc<OrderStateMachine>,
		monitor: Arc<EscalationMonitor>,
		event_bus: event_bus::EventBus,
	) -> Self {
		Self {
			config,
			storage,
			state_machine,
			monitor,
			event_bus,
		}
	}

	/// Runs until Ctrl+C.
	pub async fn run(&self) -> Result<(), EngineError> {
		self.run_until(async {
			if let Err(e) = tokio::signal::ctrl_c().await {
				tracing::error!("Failed to listen for shutdown signal: {}", e);
			}
		})
		.await
	}

	/// Runs until `shutdown` completes.
	pub async fn run_until<F>(&self, shutdown: F) -> Result<(), EngineError>
	where
		F: Future<Output = ()>,
	{
		self.initialize().await?;

		let mut event_receiver = self.event_bus.subscribe();

		// Storage cleanup task
		let storage = self.storage.clone();
		let mut cleanup_interval = tokio::time::interval(Duration::from_secs(
			self.config.storage.cleanup_interval_seconds,
		));
		let cleanup_handle = tokio::spawn(async move {
			loop {
				cleanup_interval.tick().await;
				match storage.cleanup_expired().await {
					Ok(count) if count > 0 => {
						tracing::debug!("Storage cleanup: removed {} expired entries", count);
					},
					Err(e) => {
						tracing::warn!("Storage cleanup failed: {}", e);
					},
					_ => {},
				}
			}
		});

		// Escalation sweep task
		let escalation_handle = if self.config.escalation.enabled {
			let monitor = self.monitor.clone();
			let mut sweep_interval = tokio::time::interval(Duration::from_secs(
				self.config.escalation.interval_seconds,
			));
			Some(tokio::spawn(async move {
				loop {
					sweep_interval.tick().await;
					if let Err(e) = monitor.sweep().await {
						tracing::error!("Escalation sweep failed: {}", e);
					}
				}
			}))
		} else {
			tracing::info!("Escalation sweep disabled");
			None
		};

		tokio::pin!(shutdown);
		loop {
			tokio::select! {
				event = event_receiver.recv() => {
					match event {
						Ok(event) => log_event(&event),
						Err(RecvError::Lagged(skipped)) => {
							tracing::warn!(skipped, "Event log fell behind");
						},
						Err(RecvError::Closed) => break,
					}
				}

				_ = &mut shutdown => {
					break;
				}
			}
		}

		cleanup_handle.abort();
		if let Some(handle) = escalation_handle {
			handle.abort();
		}

		self.shutdown().await
	}

	pub fn event_bus(&self) -> &event_bus::EventBus {
		&self.event_bus
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn storage(&self) -> &Arc<StorageService> {
		&self.storage
	}

	pub fn state_machine(&self) -> &Arc<OrderStateMachine> {
		&self.state_machine
	}

	pub fn monitor(&self) -> &Arc<EscalationMonitor> {
		&self.monitor
	}
}

fn log_event(event: &OrderEvent) {
	let order_id = truncate_id(event.order_id());
	match event {
		OrderEvent::Created { reference, .. } => {
			tracing::debug!(order_id = %order_id, reference = %reference, "Order created");
		},
		OrderEvent::Transitioned { action, from, to, .. } => {
			tracing::debug!(
				order_id = %order_id,
				action = %action,
				from = %from,
				to = %to,
				"Order transitioned"
			);
		},
		OrderEvent::Escalated {
			from,
			to,
			automatic,
			..
		} => {
			tracing::info!(order_id = %order_id, from = %from, to = %to, automatic, "Order escalated");
		},
		OrderEvent::Archived { .. } => {
			tracing::debug!(order_id = %order_id, "Order archived");
		},
		OrderEvent::Purged { .. } => {
			tracing::info!(order_id = %order_id, "Order purged");
		},
	}
}

#[cfg(test)]
mod tests {
	use crate::builder::EngineBuilder;
	use crate::clock::ManualClock;
	use chrono::{Duration as ChronoDuration, TimeZone, Utc};
	use retrieval_config::{Config, ConfigBuilder};
	use retrieval_storage::implementations::{file, memory};
	use retrieval_storage::{StorageError, StorageInterface};
	use retrieval_types::{NewRetrievalOrder, OrderState, Priority, SlaPolicy};
	use std::collections::HashMap;
	use std::sync::Arc;
	use std::time::Duration;

	type Factory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

	fn factories() -> HashMap<String, Factory> {
		let mut factories: HashMap<String, Factory> = HashMap::new();
		factories.insert("memory".to_string(), memory::create_storage);
		factories.insert("file".to_string(), file::create_storage);
		factories
	}

	fn clock() -> Arc<ManualClock> {
		Arc::new(ManualClock::new(
			Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap(),
		))
	}

	fn express(priority: Priority) -> NewRetrievalOrder {
		NewRetrievalOrder {
			customer_id: "acme".into(),
			requested_by: "clerk".into(),
			sla_policy: SlaPolicy::Express,
			priority,
			..Default::default()
		}
	}

	fn file_config(path: &std::path::Path) -> Config {
		let mut table = toml::map::Map::new();
		table.insert(
			"storage_path".to_string(),
			toml::Value::String(path.display().to_string()),
		);
		ConfigBuilder::new()
			.storage("file", toml::Value::Table(table))
			.customer("acme", "Acme Ltd")
			.build()
	}

	#[tokio::test(start_paused = true)]
	async fn test_run_until_sweeps_breached_orders() {
		let clock = clock();
		let config = ConfigBuilder::new()
			.customer("acme", "Acme Ltd")
			.escalation_interval_seconds(60)
			.build();
		let engine = EngineBuilder::new(config)
			.with_clock(clock.clone())
			.build(factories())
			.unwrap();

		let order = engine
			.state_machine()
			.create_order(express(Priority::Low))
			.await
			.unwrap();
		clock.advance(ChronoDuration::hours(3));

		engine
			.run_until(tokio::time::sleep(Duration::from_secs(90)))
			.await
			.unwrap();

		let order = engine.state_machine().get_order(&order.id).await.unwrap();
		assert_eq!(order.priority, Priority::Normal);
		assert!(order.auto_escalated);
	}

	#[tokio::test(start_paused = true)]
	async fn test_disabled_escalation_leaves_orders_alone() {
		let clock = clock();
		let config = ConfigBuilder::new()
			.customer("acme", "Acme Ltd")
			.escalation_enabled(false)
			.build();
		let engine = EngineBuilder::new(config)
			.with_clock(clock.clone())
			.build(factories())
			.unwrap();

		let order = engine
			.state_machine()
			.create_order(express(Priority::Low))
			.await
			.unwrap();
		clock.advance(ChronoDuration::hours(3));

		engine
			.run_until(tokio::time::sleep(Duration::from_secs(600)))
			.await
			.unwrap();

		let order = engine.state_machine().get_order(&order.id).await.unwrap();
		assert_eq!(order.priority, Priority::Low);
		assert!(!order.auto_escalated);
	}

	#[tokio::test]
	async fn test_file_backed_orders_survive_restart() {
		let dir = tempfile::tempdir().unwrap();
		let clock = clock();

		let engine = EngineBuilder::new(file_config(dir.path()))
			.with_clock(clock.clone())
			.build(factories())
			.unwrap();
		let order = engine
			.state_machine()
			.create_order(express(Priority::High))
			.await
			.unwrap();
		engine
			.state_machine()
			.confirm(&order.id, "clerk")
			.await
			.unwrap();

		clock.advance(ChronoDuration::hours(3));
		let report = engine.monitor().sweep().await.unwrap();
		assert_eq!(report.escalated, 1);
		drop(engine);

		let restarted = EngineBuilder::new(file_config(dir.path()))
			.with_clock(clock.clone())
			.build(factories())
			.unwrap();
		let reloaded = restarted.state_machine().get_order(&order.id).await.unwrap();
		assert_eq!(reloaded.state, OrderState::Confirmed);
		assert_eq!(reloaded.priority, Priority::Urgent);
		assert!(reloaded.auto_escalated);

		let second = restarted
			.state_machine()
			.create_order(express(Priority::Normal))
			.await
			.unwrap();
		assert_eq!(second.reference, "RET/2026/00002");

		let trail = restarted.state_machine().audit_trail(&order.id).await.unwrap();
		assert_eq!(trail.len(), 3);
	}
}
