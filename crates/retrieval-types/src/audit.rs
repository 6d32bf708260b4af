//! Audit trail types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Actor name used for changes made by the service itself.
pub const SYSTEM_ACTOR: &str = "system";

/// One note in an order's communication log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEntry {
	pub order_id: String,
	pub timestamp: DateTime<Utc>,
	/// Who made the change.
	pub actor: String,
	/// What changed, in plain text.
	pub message: String,
}

impl AuditEntry {
	pub fn new(
		order_id: impl Into<String>,
		timestamp: DateTime<Utc>,
		actor: impl Into<String>,
		message: impl Into<String>,
	) -> Self {
		Self {
			order_id: order_id.into(),
			timestamp,
			actor: actor.into(),
			message: message.into(),
		}
	}
}
