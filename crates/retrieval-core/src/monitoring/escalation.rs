//! SLA escalation sweep.

use crate::sla;
use crate::state::OrderStateMachine;
use retrieval_types::truncate_id;
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

#[derive(Debug, Error)]
pub enum MonitorError {
	#[error("Failed to list orders: {0}")]
	Listing(String),
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EscalationReport {
	/// Orders looked at.
	pub scanned: usize,
	/// Orders whose priority was raised.
	pub escalated: usize,
	/// Selected orders that no longer qualified once locked.
	pub skipped: usize,
	/// Orders that could not be loaded or written.
	pub failed: usize,
}

/// Raises the priority of breached orders that have not been escalated yet.
///
/// Selection: `breached && !auto_escalated && !terminal && active`. The
/// predicate is evaluated again under the order lock, so an order completed
/// or cancelled in between is left alone. A failure on one order is logged
/// and the sweep moves on.
pub struct EscalationMonitor {
	state_machine: Arc<OrderStateMachine>,
}

impl EscalationMonitor {
	pub fn new(state_machine: Arc<OrderStateMachine>) -> Self {
		Self { state_machine }
	}

	#[instrument(skip_all)]
	pub async fn sweep(&self) -> Result<EscalationReport, MonitorError> {
		let ids = self
			.state_machine
			.list_order_ids()
			.await
			.map_err(|e| MonitorError::Listing(e.to_string()))?;

		let mut report = EscalationReport {
			scanned: ids.len(),
			..Default::default()
		};

		for order_id in ids {
			let order = match self.state_machine.get_order(&order_id).await {
				Ok(order) => order,
				Err(e) => {
					tracing::warn!(
						order_id = %truncate_id(&order_id),
						error = %e,
						"Failed to load order during escalation sweep"
					);
					report.failed += 1;
					continue;
				},
			};

			let now = self.state_machine.clock().now();
			if !sla::needs_auto_escalation(&order, now) {
				continue;
			}

			match self.state_machine.auto_escalate(&order_id).await {
				Ok(Some(_)) => report.escalated += 1,
				Ok(None) => report.skipped += 1,
				Err(e) => {
					tracing::error!(
						order_id = %truncate_id(&order_id),
						error = %e,
						"Failed to escalate order"
					);
					report.failed += 1;
				},
			}
		}

		if report.escalated > 0 || report.failed > 0 {
			tracing::info!(
				scanned = report.scanned,
				escalated = report.escalated,
				skipped = report.skipped,
				failed = report.failed,
				"Escalation sweep finished"
			);
		} else {
			tracing::debug!(scanned = report.scanned, "Escalation sweep found nothing to do");
		}

		Ok(report)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::audit::StorageAuditLog;
	use crate::clock::{Clock, ManualClock};
	use crate::directory::ConfigDirectory;
	use crate::engine::event_bus::EventBus;
	use chrono::{Duration, TimeZone, Utc};
	use retrieval_config::OrdersConfig;
	use retrieval_storage::implementations::memory::MemoryStorage;
	use retrieval_storage::StorageService;
	use retrieval_types::{
		Customer, NewRetrievalOrder, OrderEvent, Priority, SlaPolicy, StorageKey,
	};

	struct Setup {
		monitor: EscalationMonitor,
		machine: Arc<OrderStateMachine>,
		clock: Arc<ManualClock>,
		bus: EventBus,
		storage: Arc<StorageService>,
	}

	fn setup() -> Setup {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		let clock = Arc::new(ManualClock::new(
			Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap(),
		));
		let directory = Arc::new(ConfigDirectory::new(vec![Customer {
			id: "acme".into(),
			name: "Acme Holdings".into(),
		}]));
		let event_bus = EventBus::new(64);
		let machine = Arc::new(OrderStateMachine::new(
			storage.clone(),
			clock.clone(),
			Arc::new(StorageAuditLog::new(storage.clone())),
			directory.clone(),
			directory,
			event_bus.clone(),
			&OrdersConfig::default(),
		));
		Setup {
			monitor: EscalationMonitor::new(machine.clone()),
			machine,
			clock,
			bus: event_bus,
			storage,
		}
	}

	fn express_low() -> NewRetrievalOrder {
		NewRetrievalOrder {
			customer_id: "acme".into(),
			requested_by: "clerk".into(),
			sla_policy: SlaPolicy::Express,
			priority: Priority::Low,
			..Default::default()
		}
	}

	#[tokio::test]
	async fn test_sweep_escalates_once() {
		let Setup {
			monitor,
			machine,
			clock,
			..
		} = setup();
		let order = machine.create_order(express_low()).await.unwrap();

		clock.advance(Duration::hours(3));
		let report = monitor.sweep().await.unwrap();
		assert_eq!(report.scanned, 1);
		assert_eq!(report.escalated, 1);

		let escalated = machine.get_order(&order.id).await.unwrap();
		assert_eq!(escalated.priority, Priority::Normal);
		assert!(escalated.auto_escalated);
		assert_eq!(
			escalated.escalation_reason.as_deref(),
			Some(crate::state::AUTO_ESCALATION_REASON)
		);

		clock.advance(Duration::hours(1));
		let report = monitor.sweep().await.unwrap();
		assert_eq!(report.escalated, 0);
		let unchanged = machine.get_order(&order.id).await.unwrap();
		assert_eq!(unchanged.priority, Priority::Normal);
		assert_eq!(unchanged.updated_at, escalated.updated_at);

		let trail = machine.audit_trail(&order.id).await.unwrap();
		assert_eq!(trail.last().unwrap().actor, retrieval_types::SYSTEM_ACTOR);
	}

	#[tokio::test]
	async fn test_sweep_ignores_orders_within_sla() {
		let Setup {
			monitor,
			machine,
			clock,
			..
		} = setup();
		machine.create_order(express_low()).await.unwrap();

		clock.advance(Duration::minutes(90));
		let report = monitor.sweep().await.unwrap();
		assert_eq!(report, EscalationReport {
			scanned: 1,
			..Default::default()
		});
	}

	#[tokio::test]
	async fn test_sweep_skips_terminal_and_archived_orders() {
		let Setup {
			monitor,
			machine,
			clock,
			..
		} = setup();
		let cancelled = machine.create_order(express_low()).await.unwrap();
		machine.cancel(&cancelled.id, "clerk").await.unwrap();
		let archived = machine.create_order(express_low()).await.unwrap();
		machine.archive(&archived.id, "admin").await.unwrap();

		clock.advance(Duration::hours(5));
		let report = monitor.sweep().await.unwrap();
		assert_eq!(report.scanned, 2);
		assert_eq!(report.escalated, 0);
		assert_eq!(
			machine.get_order(&archived.id).await.unwrap().priority,
			Priority::Low
		);
	}

	#[tokio::test]
	async fn test_sweep_publishes_escalation_event() {
		let Setup {
			monitor,
			machine,
			clock,
			bus,
			..
		} = setup();
		let mut events = bus.subscribe();
		let order = machine.create_order(express_low()).await.unwrap();

		clock.set(clock.now() + Duration::hours(2) + Duration::seconds(1));
		monitor.sweep().await.unwrap();

		let mut escalations = Vec::new();
		while let Ok(event) = events.try_recv() {
			if let OrderEvent::Escalated { automatic, to, .. } = event {
				escalations.push((automatic, to));
			}
		}
		assert_eq!(escalations, vec![(true, Priority::Normal)]);
		assert!(machine.get_order(&order.id).await.unwrap().auto_escalated);
	}

	#[tokio::test]
	async fn test_sweep_continues_past_unreadable_order() {
		let Setup {
			monitor,
			machine,
			clock,
			storage,
			..
		} = setup();
		storage
			.store(StorageKey::Orders.as_str(), "corrupt", &"not an order")
			.await
			.unwrap();
		let order = machine.create_order(express_low()).await.unwrap();

		clock.advance(Duration::hours(3));
		let report = monitor.sweep().await.unwrap();
		assert_eq!(report.scanned, 2);
		assert_eq!(report.failed, 1);
		assert_eq!(report.escalated, 1);
		assert_eq!(
			machine.get_order(&order.id).await.unwrap().priority,
			Priority::Normal
		);
	}
}
