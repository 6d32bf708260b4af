use super::{AuditError, AuditLog};
use async_trait::async_trait;
use retrieval_types::{truncate_id, AuditEntry};

/// Audit sink that only writes to the log, under the `retrieval_audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditLog;

#[async_trait]
impl AuditLog for TracingAuditLog {
	async fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
		tracing::info!(
			target: "retrieval_audit",
			order_id = %truncate_id(&entry.order_id),
			actor = %entry.actor,
			at = %entry.timestamp,
			"{}",
			entry.message
		);
		Ok(())
	}
}
