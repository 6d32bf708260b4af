use super::{AuditError, AuditLog};
use async_trait::async_trait;
use retrieval_storage::StorageService;
use retrieval_types::{AuditEntry, StorageKey};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Audit sink that keeps each order's history in the `audit_log` namespace.
pub struct StorageAuditLog {
	storage: Arc<StorageService>,
	/// Serialises the read-append-write of a history list.
	append_lock: Mutex<()>,
}

impl StorageAuditLog {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self {
			storage,
			append_lock: Mutex::new(()),
		}
	}

	async fn load(&self, order_id: &str) -> Result<Vec<AuditEntry>, AuditError> {
		self.storage
			.retrieve_optional::<Vec<AuditEntry>>(StorageKey::AuditLog.as_str(), order_id)
			.await
			.map(Option::unwrap_or_default)
			.map_err(|e| AuditError::Storage(e.to_string()))
	}
}

#[async_trait]
impl AuditLog for StorageAuditLog {
	async fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
		let _guard = self.append_lock.lock().await;

		let order_id = entry.order_id.clone();
		let mut history = self.load(&order_id).await?;
		history.push(entry);

		self.storage
			.store(StorageKey::AuditLog.as_str(), &order_id, &history)
			.await
			.map_err(|e| AuditError::Storage(e.to_string()))
	}

	async fn entries(&self, order_id: &str) -> Result<Vec<AuditEntry>, AuditError> {
		self.load(order_id).await
	}

	async fn clear(&self, order_id: &str) -> Result<(), AuditError> {
		let _guard = self.append_lock.lock().await;
		self.storage
			.remove(StorageKey::AuditLog.as_str(), order_id)
			.await
			.map_err(|e| AuditError::Storage(e.to_string()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::{TimeZone, Utc};
	use retrieval_storage::implementations::memory::MemoryStorage;

	#[tokio::test]
	async fn test_entries_are_appended_in_order() {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		let audit = StorageAuditLog::new(storage);
		let t0 = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();

		audit
			.record(AuditEntry::new("o-1", t0, "clerk", "Order created"))
			.await
			.unwrap();
		audit
			.record(AuditEntry::new("o-1", t0, "clerk", "Order confirmed"))
			.await
			.unwrap();
		audit
			.record(AuditEntry::new("o-2", t0, "clerk", "Order created"))
			.await
			.unwrap();

		let history = audit.entries("o-1").await.unwrap();
		assert_eq!(history.len(), 2);
		assert_eq!(history[1].message, "Order confirmed");

		audit.clear("o-1").await.unwrap();
		assert!(audit.entries("o-1").await.unwrap().is_empty());
		assert_eq!(audit.entries("o-2").await.unwrap().len(), 1);
	}
}
