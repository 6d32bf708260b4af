//! Retrieval order state machine.
//!
//! Orders move `draft -> confirmed -> locating -> retrieving -> quality ->
//! packaging -> delivering -> delivered -> completed`, and may be cancelled
//! from any state before `delivered`. Each action checks the current state
//! before touching the record; a rejected action leaves the stored order
//! untouched. Successful mutations append an audit note and publish an event,
//! neither of which can fail the mutation.

use super::reference::ReferenceSequence;
use crate::audit::AuditLog;
use crate::clock::Clock;
use crate::directory::{CustomerDirectory, RateProvider};
use crate::engine::event_bus::EventBus;
use crate::sla;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use retrieval_config::OrdersConfig;
use retrieval_storage::{StorageError, StorageService};
use retrieval_types::{
	format_duration, truncate_id, AuditEntry, LineStatus, NewRetrievalLine, NewRetrievalOrder,
	OrderAction, OrderEvent, OrderResponse, OrderState, Priority, RetrievalOrder, SlaPolicy,
	StorageKey, SYSTEM_ACTOR,
};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::instrument;
use uuid::Uuid;

/// Reason recorded by the escalation sweep.
pub const AUTO_ESCALATION_REASON: &str = "Auto escalation due to SLA breach";
const MANUAL_ESCALATION_REASON: &str = "Manual escalation due to SLA breach";

/// Errors returned by order operations.
#[derive(Debug, Error)]
pub enum OrderStateError {
	/// The action is not allowed in the order's current state.
	#[error("Cannot {action} order in state '{actual}', requires {}", join_states(.required))]
	StateTransition {
		action: String,
		actual: OrderState,
		required: Vec<OrderState>,
	},
	/// Malformed input or a reference to something that does not exist.
	#[error("Validation error: {0}")]
	Validation(String),
	/// The operation is not meaningful for this order right now.
	#[error("Invalid operation: {0}")]
	InvalidOperation(String),
	#[error("Order not found: {0}")]
	OrderNotFound(String),
	#[error("Directory error: {0}")]
	Directory(String),
	#[error("Storage error: {0}")]
	Storage(String),
}

fn join_states(states: &[OrderState]) -> String {
	states
		.iter()
		.map(|s| format!("'{}'", s))
		.collect::<Vec<_>>()
		.join(" or ")
}

struct Transition {
	from: &'static [OrderState],
	to: OrderState,
}

/// Static action table: required source states and target state per action.
static TRANSITIONS: Lazy<HashMap<OrderAction, Transition>> = Lazy::new(|| {
	use OrderState::*;

	HashMap::from([
		(
			OrderAction::Confirm,
			Transition {
				from: &[Draft],
				to: Confirmed,
			},
		),
		(
			OrderAction::StartLocating,
			Transition {
				from: &[Confirmed],
				to: Locating,
			},
		),
		(
			OrderAction::StartRetrieving,
			Transition {
				from: &[Locating],
				to: Retrieving,
			},
		),
		(
			OrderAction::QualityCheck,
			Transition {
				from: &[Retrieving],
				to: Quality,
			},
		),
		(
			OrderAction::StartPackaging,
			Transition {
				from: &[Quality],
				to: Packaging,
			},
		),
		(
			OrderAction::StartDelivery,
			Transition {
				from: &[Packaging],
				to: Delivering,
			},
		),
		(
			OrderAction::MarkDelivered,
			Transition {
				from: &[Delivering],
				to: Delivered,
			},
		),
		(
			OrderAction::Complete,
			Transition {
				from: &[Delivered],
				to: Completed,
			},
		),
		(
			OrderAction::Cancel,
			Transition {
				from: &OrderState::CANCELLABLE,
				to: Cancelled,
			},
		),
	])
});

fn require_state(
	order: &RetrievalOrder,
	action: &str,
	allowed: &[OrderState],
) -> Result<(), OrderStateError> {
	if allowed.contains(&order.state) {
		Ok(())
	} else {
		Err(OrderStateError::StateTransition {
			action: action.to_string(),
			actual: order.state,
			required: allowed.to_vec(),
		})
	}
}

fn require_active(order: &RetrievalOrder) -> Result<(), OrderStateError> {
	if order.active {
		Ok(())
	} else {
		Err(OrderStateError::InvalidOperation(format!(
			"Order {} is archived",
			order.reference
		)))
	}
}

fn require_not_terminal(order: &RetrievalOrder, what: &str) -> Result<(), OrderStateError> {
	if order.is_terminal() {
		Err(OrderStateError::InvalidOperation(format!(
			"Cannot {} order in terminal state '{}'",
			what, order.state
		)))
	} else {
		Ok(())
	}
}

fn validate_line(line: &NewRetrievalLine) -> Result<(), OrderStateError> {
	if line.description.trim().is_empty() {
		return Err(OrderStateError::Validation(
			"Line description cannot be empty".into(),
		));
	}
	Ok(())
}

fn storage_error(order_id: &str, e: StorageError) -> OrderStateError {
	match e {
		StorageError::NotFound => OrderStateError::OrderNotFound(order_id.to_string()),
		other => OrderStateError::Storage(other.to_string()),
	}
}

type LockMap = DashMap<String, Arc<Mutex<()>>>;

/// Exclusive hold on one order's record.
///
/// Dropping it releases the mutex and forgets the map entry when no other
/// task is holding or waiting for it, so the map only tracks orders that are
/// being worked on.
struct OrderGuard<'a> {
	locks: &'a LockMap,
	order_id: String,
	guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for OrderGuard<'_> {
	fn drop(&mut self) {
		drop(self.guard.take());
		self.locks
			.remove_if(&self.order_id, |_, lock| Arc::strong_count(lock) == 1);
	}
}

/// Controller for retrieval orders and the only writer of order records.
pub struct OrderStateMachine {
	storage: Arc<StorageService>,
	clock: Arc<dyn Clock>,
	audit: Arc<dyn AuditLog>,
	customers: Arc<dyn CustomerDirectory>,
	rates: Arc<dyn RateProvider>,
	event_bus: EventBus,
	references: ReferenceSequence,
	locks: LockMap,
}

impl OrderStateMachine {
	pub fn new(
		storage: Arc<StorageService>,
		clock: Arc<dyn Clock>,
		audit: Arc<dyn AuditLog>,
		customers: Arc<dyn CustomerDirectory>,
		rates: Arc<dyn RateProvider>,
		event_bus: EventBus,
		orders: &OrdersConfig,
	) -> Self {
		let references = ReferenceSequence::new(
			storage.clone(),
			orders.reference_prefix.clone(),
			orders.reference_padding,
		);

		Self {
			storage,
			clock,
			audit,
			customers,
			rates,
			event_bus,
			references,
			locks: DashMap::new(),
		}
	}

	pub fn clock(&self) -> &Arc<dyn Clock> {
		&self.clock
	}

	async fn lock_order(&self, order_id: &str) -> OrderGuard<'_> {
		let lock = self.locks.entry(order_id.to_string()).or_default().clone();
		OrderGuard {
			locks: &self.locks,
			order_id: order_id.to_string(),
			guard: Some(lock.lock_owned().await),
		}
	}

	async fn load(&self, order_id: &str) -> Result<RetrievalOrder, OrderStateError> {
		self.storage
			.retrieve(StorageKey::Orders.as_str(), order_id)
			.await
			.map_err(|e| storage_error(order_id, e))
	}

	async fn save(&self, order: &RetrievalOrder) -> Result<(), OrderStateError> {
		self.storage
			.update(StorageKey::Orders.as_str(), &order.id, order)
			.await
			.map_err(|e| storage_error(&order.id, e))
	}

	/// Loads an order under its lock, applies `updater` and persists the result.
	///
	/// If `updater` fails nothing is written. `updated_at` is set to the
	/// instant passed to `updater`.
	async fn update_order_with<F>(
		&self,
		order_id: &str,
		updater: F,
	) -> Result<RetrievalOrder, OrderStateError>
	where
		F: FnOnce(&mut RetrievalOrder, DateTime<Utc>) -> Result<(), OrderStateError>,
	{
		let _guard = self.lock_order(order_id).await;

		let mut order = self.load(order_id).await?;
		let now = self.clock.now();
		updater(&mut order, now)?;
		order.updated_at = now;
		self.save(&order).await?;

		Ok(order)
	}

	/// Appends an audit note. Failures are logged and swallowed.
	async fn note(&self, order_id: &str, actor: &str, at: DateTime<Utc>, message: String) {
		let entry = AuditEntry::new(order_id, at, actor, message);
		if let Err(e) = self.audit.record(entry).await {
			tracing::warn!(
				order_id = %truncate_id(order_id),
				error = %e,
				"Failed to record audit note"
			);
		}
	}

	fn publish(&self, event: OrderEvent) {
		self.event_bus.publish(event).ok();
	}

	async fn require_customer(&self, customer_id: &str) -> Result<(), OrderStateError> {
		match self.customers.get_customer(customer_id).await {
			Ok(Some(_)) => Ok(()),
			Ok(None) => Err(OrderStateError::Validation(format!(
				"Unknown customer '{}'",
				customer_id
			))),
			Err(e) => Err(OrderStateError::Directory(e.to_string())),
		}
	}

	/// Creates an order in `draft`.
	///
	/// The customer must exist. No record is written if any check fails.
	#[instrument(skip_all, fields(customer_id = %request.customer_id))]
	pub async fn create_order(
		&self,
		request: NewRetrievalOrder,
	) -> Result<RetrievalOrder, OrderStateError> {
		if request.customer_id.trim().is_empty() {
			return Err(OrderStateError::Validation("customer_id is required".into()));
		}
		if request.requested_by.trim().is_empty() {
			return Err(OrderStateError::Validation(
				"requested_by is required".into(),
			));
		}
		for line in &request.lines {
			validate_line(line)?;
		}
		self.require_customer(&request.customer_id).await?;

		let now = self.clock.now();
		let reference = self
			.references
			.next(now)
			.await
			.map_err(|e| OrderStateError::Storage(e.to_string()))?;

		let mut order = RetrievalOrder {
			id: Uuid::new_v4().to_string(),
			reference,
			customer_id: request.customer_id,
			requested_at: now,
			requested_by: request.requested_by,
			sla_policy: request.sla_policy,
			sla_deadline: sla::sla_deadline(now, request.sla_policy),
			priority: request.priority,
			state: OrderState::Draft,
			lines: Vec::new(),
			auto_escalated: false,
			escalation_reason: None,
			actual_start_date: None,
			actual_completion_date: None,
			active: true,
			updated_at: now,
			next_line_seq: 0,
		};
		for line in request.lines {
			order.push_line(line);
		}

		self.storage
			.store(StorageKey::Orders.as_str(), &order.id, &order)
			.await
			.map_err(|e| OrderStateError::Storage(e.to_string()))?;

		tracing::info!(
			order_id = %truncate_id(&order.id),
			reference = %order.reference,
			sla = %order.sla_policy,
			"Order created"
		);
		self.note(
			&order.id,
			&order.requested_by,
			now,
			format!(
				"Order {} created with {} SLA, deadline {}",
				order.reference, order.sla_policy, order.sla_deadline
			),
		)
		.await;
		self.publish(OrderEvent::Created {
			order_id: order.id.clone(),
			reference: order.reference.clone(),
		});

		Ok(order)
	}

	/// Runs one workflow action.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id), action = %action))]
	pub async fn apply(
		&self,
		order_id: &str,
		action: OrderAction,
		actor: &str,
	) -> Result<RetrievalOrder, OrderStateError> {
		let transition = TRANSITIONS.get(&action).ok_or_else(|| {
			OrderStateError::InvalidOperation(format!("Unsupported action '{}'", action))
		})?;

		let mut from = OrderState::Draft;
		let order = self
			.update_order_with(order_id, |order, now| {
				require_state(order, action.as_str(), transition.from)?;
				require_active(order)?;

				from = order.state;
				order.state = transition.to;
				match action {
					OrderAction::StartLocating => order.actual_start_date = Some(now),
					OrderAction::Complete => order.actual_completion_date = Some(now),
					_ => {},
				}
				Ok(())
			})
			.await?;

		tracing::info!(from = %from, to = %order.state, "Order transitioned");
		self.note(
			&order.id,
			actor,
			order.updated_at,
			format!("State changed from {} to {} ({})", from, order.state, action),
		)
		.await;
		self.publish(OrderEvent::Transitioned {
			order_id: order.id.clone(),
			action,
			from,
			to: order.state,
		});

		Ok(order)
	}

	pub async fn confirm(
		&self,
		order_id: &str,
		actor: &str,
	) -> Result<RetrievalOrder, OrderStateError> {
		self.apply(order_id, OrderAction::Confirm, actor).await
	}

	/// Also records the actual start date.
	pub async fn start_locating(
		&self,
		order_id: &str,
		actor: &str,
	) -> Result<RetrievalOrder, OrderStateError> {
		self.apply(order_id, OrderAction::StartLocating, actor).await
	}

	pub async fn start_retrieving(
		&self,
		order_id: &str,
		actor: &str,
	) -> Result<RetrievalOrder, OrderStateError> {
		self.apply(order_id, OrderAction::StartRetrieving, actor).await
	}

	pub async fn quality_check(
		&self,
		order_id: &str,
		actor: &str,
	) -> Result<RetrievalOrder, OrderStateError> {
		self.apply(order_id, OrderAction::QualityCheck, actor).await
	}

	pub async fn start_packaging(
		&self,
		order_id: &str,
		actor: &str,
	) -> Result<RetrievalOrder, OrderStateError> {
		self.apply(order_id, OrderAction::StartPackaging, actor).await
	}

	pub async fn start_delivery(
		&self,
		order_id: &str,
		actor: &str,
	) -> Result<RetrievalOrder, OrderStateError> {
		self.apply(order_id, OrderAction::StartDelivery, actor).await
	}

	pub async fn mark_delivered(
		&self,
		order_id: &str,
		actor: &str,
	) -> Result<RetrievalOrder, OrderStateError> {
		self.apply(order_id, OrderAction::MarkDelivered, actor).await
	}

	/// Also records the actual completion date.
	pub async fn complete(
		&self,
		order_id: &str,
		actor: &str,
	) -> Result<RetrievalOrder, OrderStateError> {
		self.apply(order_id, OrderAction::Complete, actor).await
	}

	pub async fn cancel(
		&self,
		order_id: &str,
		actor: &str,
	) -> Result<RetrievalOrder, OrderStateError> {
		self.apply(order_id, OrderAction::Cancel, actor).await
	}

	/// Changes the SLA policy of a draft and recomputes its deadline.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id), sla = %policy))]
	pub async fn set_sla_policy(
		&self,
		order_id: &str,
		policy: SlaPolicy,
		actor: &str,
	) -> Result<RetrievalOrder, OrderStateError> {
		let mut previous = policy;
		let order = self
			.update_order_with(order_id, |order, _| {
				require_state(order, "set_sla_policy", &[OrderState::Draft])?;
				require_active(order)?;

				previous = order.sla_policy;
				order.sla_policy = policy;
				order.sla_deadline = sla::sla_deadline(order.requested_at, policy);
				Ok(())
			})
			.await?;

		self.note(
			&order.id,
			actor,
			order.updated_at,
			format!(
				"SLA policy changed from {} to {}, deadline {}",
				previous, policy, order.sla_deadline
			),
		)
		.await;

		Ok(order)
	}

	/// Moves a draft to another customer. The customer must exist.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id), customer_id = %customer_id))]
	pub async fn set_customer(
		&self,
		order_id: &str,
		customer_id: &str,
		actor: &str,
	) -> Result<RetrievalOrder, OrderStateError> {
		self.require_customer(customer_id).await?;

		let mut previous = String::new();
		let order = self
			.update_order_with(order_id, |order, _| {
				require_state(order, "set_customer", &[OrderState::Draft])?;
				require_active(order)?;

				previous = std::mem::replace(&mut order.customer_id, customer_id.to_string());
				Ok(())
			})
			.await?;

		self.note(
			&order.id,
			actor,
			order.updated_at,
			format!("Customer changed from {} to {}", previous, customer_id),
		)
		.await;

		Ok(order)
	}

	/// Sets the priority in either direction. Rejected on terminal orders.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id), priority = %priority))]
	pub async fn set_priority(
		&self,
		order_id: &str,
		priority: Priority,
		actor: &str,
	) -> Result<RetrievalOrder, OrderStateError> {
		let mut previous = priority;
		let order = self
			.update_order_with(order_id, |order, _| {
				require_not_terminal(order, "change priority of")?;
				require_active(order)?;

				previous = order.priority;
				order.priority = priority;
				Ok(())
			})
			.await?;

		self.note(
			&order.id,
			actor,
			order.updated_at,
			format!("Priority changed from {} to {}", previous, priority),
		)
		.await;

		Ok(order)
	}

	/// Raises the priority of a breached order by one tier.
	///
	/// Allowed whether or not the sweep already escalated the order. Fails
	/// with `InvalidOperation` on terminal or non-breached orders.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id)))]
	pub async fn manual_escalation(
		&self,
		order_id: &str,
		actor: &str,
		reason: Option<String>,
	) -> Result<RetrievalOrder, OrderStateError> {
		let reason = reason
			.filter(|r| !r.trim().is_empty())
			.unwrap_or_else(|| MANUAL_ESCALATION_REASON.to_string());

		let mut from = Priority::Normal;
		let order = self
			.update_order_with(order_id, |order, now| {
				require_not_terminal(order, "escalate")?;
				if !sla::is_breached(order, now) {
					return Err(OrderStateError::InvalidOperation(format!(
						"SLA of order {} is not breached (deadline {})",
						order.reference, order.sla_deadline
					)));
				}
				require_active(order)?;

				from = order.priority;
				order.priority = from.escalated();
				order.escalation_reason = Some(reason.clone());
				Ok(())
			})
			.await?;

		tracing::info!(from = %from, to = %order.priority, "Order escalated manually");
		self.note(
			&order.id,
			actor,
			order.updated_at,
			format!("{}: priority {} -> {}", reason, from, order.priority),
		)
		.await;
		self.publish(OrderEvent::Escalated {
			order_id: order.id.clone(),
			from,
			to: order.priority,
			automatic: false,
		});

		Ok(order)
	}

	/// Escalation step of the sweep.
	///
	/// Re-checks the selection predicate under the order lock and returns
	/// `Ok(None)` without writing when the order no longer qualifies.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id)))]
	pub async fn auto_escalate(
		&self,
		order_id: &str,
	) -> Result<Option<RetrievalOrder>, OrderStateError> {
		let guard = self.lock_order(order_id).await;

		let mut order = self.load(order_id).await?;
		let now = self.clock.now();
		if !sla::needs_auto_escalation(&order, now) {
			return Ok(None);
		}

		let from = order.priority;
		order.priority = from.escalated();
		order.auto_escalated = true;
		order.escalation_reason = Some(AUTO_ESCALATION_REASON.to_string());
		order.updated_at = now;
		self.save(&order).await?;
		drop(guard);

		tracing::warn!(
			reference = %order.reference,
			from = %from,
			to = %order.priority,
			overdue = %format_duration(now - order.sla_deadline),
			"SLA breached, priority escalated"
		);
		self.note(
			&order.id,
			SYSTEM_ACTOR,
			now,
			format!(
				"{}: priority {} -> {}",
				AUTO_ESCALATION_REASON, from, order.priority
			),
		)
		.await;
		self.publish(OrderEvent::Escalated {
			order_id: order.id.clone(),
			from,
			to: order.priority,
			automatic: true,
		});

		Ok(Some(order))
	}

	/// Adds a line to a draft or confirmed order.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id)))]
	pub async fn add_line(
		&self,
		order_id: &str,
		line: NewRetrievalLine,
		actor: &str,
	) -> Result<RetrievalOrder, OrderStateError> {
		validate_line(&line)?;

		let mut line_id = String::new();
		let order = self
			.update_order_with(order_id, |order, _| {
				require_state(
					order,
					"add_line",
					&[OrderState::Draft, OrderState::Confirmed],
				)?;
				require_active(order)?;

				line_id = order.push_line(line).id.clone();
				Ok(())
			})
			.await?;

		let description = order
			.line(&line_id)
			.map(|l| l.description.clone())
			.unwrap_or_default();
		self.note(
			&order.id,
			actor,
			order.updated_at,
			format!("Line {} added: {}", line_id, description),
		)
		.await;

		Ok(order)
	}

	/// Removes a line from a draft or confirmed order.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id), line_id = %line_id))]
	pub async fn remove_line(
		&self,
		order_id: &str,
		line_id: &str,
		actor: &str,
	) -> Result<RetrievalOrder, OrderStateError> {
		let order = self
			.update_order_with(order_id, |order, _| {
				require_state(
					order,
					"remove_line",
					&[OrderState::Draft, OrderState::Confirmed],
				)?;
				require_active(order)?;

				let position = order
					.lines
					.iter()
					.position(|l| l.id == line_id)
					.ok_or_else(|| {
						OrderStateError::Validation(format!("Unknown line '{}'", line_id))
					})?;
				order.lines.remove(position);
				Ok(())
			})
			.await?;

		self.note(
			&order.id,
			actor,
			order.updated_at,
			format!("Line {} removed", line_id),
		)
		.await;

		Ok(order)
	}

	/// Updates the status of one line. Rejected on terminal orders.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id), line_id = %line_id))]
	pub async fn set_line_status(
		&self,
		order_id: &str,
		line_id: &str,
		status: LineStatus,
		actor: &str,
	) -> Result<RetrievalOrder, OrderStateError> {
		let mut previous = status;
		let order = self
			.update_order_with(order_id, |order, _| {
				require_not_terminal(order, "update lines of")?;
				require_active(order)?;

				let line = order.line_mut(line_id).ok_or_else(|| {
					OrderStateError::Validation(format!("Unknown line '{}'", line_id))
				})?;
				previous = line.status;
				line.status = status;
				Ok(())
			})
			.await?;

		self.note(
			&order.id,
			actor,
			order.updated_at,
			format!("Line {} status changed from {} to {}", line_id, previous, status),
		)
		.await;

		Ok(order)
	}

	/// Soft-deletes an order. Archived orders are read-only, hidden from
	/// default listings and ignored by the escalation sweep.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id)))]
	pub async fn archive(
		&self,
		order_id: &str,
		actor: &str,
	) -> Result<RetrievalOrder, OrderStateError> {
		let order = self
			.update_order_with(order_id, |order, _| {
				require_active(order)?;
				order.active = false;
				Ok(())
			})
			.await?;

		tracing::info!(reference = %order.reference, "Order archived");
		self.note(&order.id, actor, order.updated_at, "Order archived".into())
			.await;
		self.publish(OrderEvent::Archived {
			order_id: order.id.clone(),
		});

		Ok(order)
	}

	/// Physically removes an order and its audit history.
	///
	/// Administrative override; normal operation only archives.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id)))]
	pub async fn purge(&self, order_id: &str, actor: &str) -> Result<(), OrderStateError> {
		let guard = self.lock_order(order_id).await;

		let order = self.load(order_id).await?;
		self.storage
			.remove(StorageKey::Orders.as_str(), order_id)
			.await
			.map_err(|e| OrderStateError::Storage(e.to_string()))?;
		drop(guard);

		if let Err(e) = self.audit.clear(order_id).await {
			tracing::warn!(error = %e, "Failed to clear audit history of purged order");
		}
		tracing::warn!(reference = %order.reference, actor = %actor, "Order purged");
		self.publish(OrderEvent::Purged {
			order_id: order_id.to_string(),
		});

		Ok(())
	}

	pub async fn get_order(&self, order_id: &str) -> Result<RetrievalOrder, OrderStateError> {
		self.load(order_id).await
	}

	/// Ids of every stored order, archived ones included.
	pub async fn list_order_ids(&self) -> Result<Vec<String>, OrderStateError> {
		self.storage
			.list_ids(StorageKey::Orders.as_str())
			.await
			.map_err(|e| OrderStateError::Storage(e.to_string()))
	}

	/// Orders sorted by request time, optionally including archived ones.
	pub async fn list_orders(
		&self,
		include_archived: bool,
	) -> Result<Vec<RetrievalOrder>, OrderStateError> {
		let mut orders: Vec<RetrievalOrder> = self
			.storage
			.retrieve_all::<RetrievalOrder>(StorageKey::Orders.as_str())
			.await
			.map_err(|e| OrderStateError::Storage(e.to_string()))?
			.into_iter()
			.map(|(_, order)| order)
			.filter(|o| include_archived || o.active)
			.collect();
		orders.sort_by(|a, b| {
			a.requested_at
				.cmp(&b.requested_at)
				.then_with(|| a.reference.cmp(&b.reference))
		});
		Ok(orders)
	}

	/// Audit history of an existing order, oldest first.
	pub async fn audit_trail(&self, order_id: &str) -> Result<Vec<AuditEntry>, OrderStateError> {
		self.load(order_id).await?;
		self.audit
			.entries(order_id)
			.await
			.map_err(|e| OrderStateError::Storage(e.to_string()))
	}

	/// Builds the API view of an order with derived values evaluated now.
	///
	/// A failed rate lookup is logged and yields a zero cost estimate.
	pub async fn describe(&self, order: &RetrievalOrder) -> OrderResponse {
		let now = self.clock.now();
		let rate = match self.rates.rate_for(&order.customer_id).await {
			Ok(rate) => rate,
			Err(e) => {
				tracing::warn!(
					order_id = %truncate_id(&order.id),
					error = %e,
					"Rate lookup failed, estimating zero cost"
				);
				None
			},
		};

		OrderResponse {
			id: order.id.clone(),
			reference: order.reference.clone(),
			customer_id: order.customer_id.clone(),
			requested_at: order.requested_at,
			requested_by: order.requested_by.clone(),
			state: order.state,
			priority: order.priority,
			sla: sla::sla_status(order, now),
			lines: order.lines.clone(),
			item_count: order.item_count(),
			estimated_pages: order.estimated_pages(),
			progress_percentage: order.progress_percentage(),
			estimated_cost: order.estimated_cost(rate.as_ref()),
			auto_escalated: order.auto_escalated,
			escalation_reason: order.escalation_reason.clone(),
			actual_start_date: order.actual_start_date,
			actual_completion_date: order.actual_completion_date,
			active: order.active,
			updated_at: order.updated_at,
		}
	}
}
