//! Human-readable order numbers.

use chrono::{DateTime, Datelike, Utc};
use retrieval_storage::{StorageError, StorageService};
use retrieval_types::StorageKey;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Hands out references of the form `RET/2026/00042`.
///
/// The counter restarts every calendar year and is persisted in the
/// `sequences` namespace under `<prefix>-<year>`.
pub struct ReferenceSequence {
	storage: Arc<StorageService>,
	prefix: String,
	padding: usize,
	lock: Mutex<()>,
}

impl ReferenceSequence {
	pub fn new(storage: Arc<StorageService>, prefix: impl Into<String>, padding: usize) -> Self {
		Self {
			storage,
			prefix: prefix.into(),
			padding,
			lock: Mutex::new(()),
		}
	}

	pub async fn next(&self, now: DateTime<Utc>) -> Result<String, StorageError> {
		let year = now.year();
		let key = format!("{}-{}", self.prefix, year);

		let _guard = self.lock.lock().await;
		let current: u64 = self
			.storage
			.retrieve_optional(StorageKey::Sequences.as_str(), &key)
			.await?
			.unwrap_or(0);
		let next = current + 1;
		self.storage
			.store(StorageKey::Sequences.as_str(), &key, &next)
			.await?;

		Ok(format!(
			"{}/{}/{:0width$}",
			self.prefix,
			year,
			next,
			width = self.padding
		))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;
	use retrieval_storage::implementations::memory::MemoryStorage;

	#[tokio::test]
	async fn test_counter_is_padded_and_restarts_each_year() {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		let sequence = ReferenceSequence::new(storage, "RET", 5);

		let march = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
		assert_eq!(sequence.next(march).await.unwrap(), "RET/2026/00001");
		assert_eq!(sequence.next(march).await.unwrap(), "RET/2026/00002");

		let next_year = Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap();
		assert_eq!(sequence.next(next_year).await.unwrap(), "RET/2027/00001");
	}
}
