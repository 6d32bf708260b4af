//! Event types for inter-component communication.
//!
//! Events flow through the engine's event bus so that the run loop, the HTTP
//! layer and any other subscriber can react to order changes without polling
//! storage.

use crate::{OrderAction, OrderState, Priority};
use serde::{Deserialize, Serialize};

/// Events published whenever a retrieval order changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum OrderEvent {
	/// A new order has been stored in `draft`.
	Created { order_id: String, reference: String },
	/// A workflow action moved the order to a new state.
	Transitioned {
		order_id: String,
		action: OrderAction,
		from: OrderState,
		to: OrderState,
	},
	/// Priority was raised because of an SLA breach.
	Escalated {
		order_id: String,
		from: Priority,
		to: Priority,
		/// True when raised by the escalation monitor.
		automatic: bool,
	},
	/// The order was soft-archived.
	Archived { order_id: String },
	/// The order was physically removed by an administrator.
	Purged { order_id: String },
}

impl OrderEvent {
	pub fn order_id(&self) -> &str {
		match self {
			OrderEvent::Created { order_id, .. }
			| OrderEvent::Transitioned { order_id, .. }
			| OrderEvent::Escalated { order_id, .. }
			| OrderEvent::Archived { order_id }
			| OrderEvent::Purged { order_id } => order_id,
		}
	}
}
