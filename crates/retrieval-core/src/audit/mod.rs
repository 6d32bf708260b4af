//! Audit trail sinks.
//!
//! Every successful order mutation produces one [`AuditEntry`]. Sinks are
//! best-effort: the state machine logs a failed write and carries on.

mod log;
mod storage;

pub use log::TracingAuditLog;
pub use storage::StorageAuditLog;

use async_trait::async_trait;
use retrieval_types::AuditEntry;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
	#[error("Storage error: {0}")]
	Storage(String),
}

/// Write-mostly sink for audit notes.
#[async_trait]
pub trait AuditLog: Send + Sync {
	/// Appends one entry.
	async fn record(&self, entry: AuditEntry) -> Result<(), AuditError>;

	/// History of one order, oldest first. Sinks that cannot read back
	/// return an empty list.
	async fn entries(&self, _order_id: &str) -> Result<Vec<AuditEntry>, AuditError> {
		Ok(Vec::new())
	}

	/// Drops the history of a purged order.
	async fn clear(&self, _order_id: &str) -> Result<(), AuditError> {
		Ok(())
	}
}
