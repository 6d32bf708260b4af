//! Storage module for the records retrieval service.
//!
//! Provides a byte-level backend abstraction and a typed JSON facade on top of
//! it. Orders, their audit trail and the reference counters all live in
//! namespaces of the same backend.

use async_trait::async_trait;
use retrieval_types::{ConfigSchema, ImplementationRegistry};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use thiserror::Error;

pub mod implementations {
	pub mod file;
	pub mod memory;
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	#[error("Not found")]
	NotFound,
	#[error("Serialization error: {0}")]
	Serialization(String),
	#[error("Backend error: {0}")]
	Backend(String),
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Low-level interface every storage backend implements.
///
/// Keys have the form `<namespace>:<id>`.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Retrieves raw bytes for the given key.
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Stores raw bytes with optional time-to-live.
	async fn set_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Option<Duration>,
	) -> Result<(), StorageError>;

	/// Deletes the value for `key`. Deleting a missing key is not an error.
	async fn delete(&self, key: &str) -> Result<(), StorageError>;

	async fn exists(&self, key: &str) -> Result<bool, StorageError>;

	/// Lists every live key starting with `prefix`.
	async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Removes expired entries, returning how many were removed.
	/// Backends without TTL support keep the default.
	async fn cleanup_expired(&self) -> Result<usize, StorageError> {
		Ok(0)
	}
}

/// Signature of the factory every backend provides.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

/// Registry trait for storage implementations.
pub trait StorageRegistry: ImplementationRegistry<Factory = StorageFactory> {}

/// All built-in storage implementations as `(name, factory)` pairs.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{file, memory};

	vec![
		(file::Registry::NAME, file::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

/// Typed storage facade.
///
/// Wraps a backend and stores values as JSON under `namespace:id` keys.
pub struct StorageService {
	backend: Box<dyn StorageInterface>,
}

impl StorageService {
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self { backend }
	}

	fn key(namespace: &str, id: &str) -> String {
		format!("{}:{}", namespace, id)
	}

	/// Stores a value, creating or overwriting it.
	pub async fn store<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		self.store_with_ttl(namespace, id, data, None).await
	}

	pub async fn store_with_ttl<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
		ttl: Option<Duration>,
	) -> Result<(), StorageError> {
		let bytes =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend
			.set_bytes(&Self::key(namespace, id), bytes, ttl)
			.await
	}

	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<T, StorageError> {
		let bytes = self.backend.get_bytes(&Self::key(namespace, id)).await?;
		serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))
	}

	/// Like [`retrieve`](Self::retrieve) but maps `NotFound` to `None`.
	pub async fn retrieve_optional<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<Option<T>, StorageError> {
		match self.retrieve(namespace, id).await {
			Ok(value) => Ok(Some(value)),
			Err(StorageError::NotFound) => Ok(None),
			Err(e) => Err(e),
		}
	}

	/// Overwrites an existing value.
	///
	/// Unlike [`store`](Self::store), fails with `NotFound` if the key does
	/// not exist yet.
	pub async fn update<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		let key = Self::key(namespace, id);
		if !self.backend.exists(&key).await? {
			return Err(StorageError::NotFound);
		}

		let bytes =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend.set_bytes(&key, bytes, None).await
	}

	pub async fn remove(&self, namespace: &str, id: &str) -> Result<(), StorageError> {
		self.backend.delete(&Self::key(namespace, id)).await
	}

	pub async fn exists(&self, namespace: &str, id: &str) -> Result<bool, StorageError> {
		self.backend.exists(&Self::key(namespace, id)).await
	}

	/// Lists the ids stored under `namespace`.
	pub async fn list_ids(&self, namespace: &str) -> Result<Vec<String>, StorageError> {
		let prefix = format!("{}:", namespace);
		let keys = self.backend.list_keys(&prefix).await?;
		Ok(keys
			.into_iter()
			.filter_map(|k| k.strip_prefix(&prefix).map(str::to_string))
			.collect())
	}

	/// Loads every value under `namespace`.
	///
	/// Entries that disappear between listing and reading are skipped.
	pub async fn retrieve_all<T: DeserializeOwned>(
		&self,
		namespace: &str,
	) -> Result<Vec<(String, T)>, StorageError> {
		let mut values = Vec::new();
		for id in self.list_ids(namespace).await? {
			match self.retrieve(namespace, &id).await {
				Ok(value) => values.push((id, value)),
				Err(StorageError::NotFound) => continue,
				Err(e) => return Err(e),
			}
		}
		Ok(values)
	}

	/// Removes expired entries from storage.
	pub async fn cleanup_expired(&self) -> Result<usize, StorageError> {
		self.backend.cleanup_expired().await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use implementations::memory::MemoryStorage;
	use serde::Deserialize;

	#[derive(Debug, Serialize, Deserialize, PartialEq)]
	struct StoredBox {
		label: String,
	}

	fn service() -> StorageService {
		StorageService::new(Box::new(MemoryStorage::new()))
	}

	#[tokio::test]
	async fn test_store_and_retrieve() {
		let storage = service();
		let value = StoredBox { label: "B-001".into() };
		storage.store("boxes", "1", &value).await.unwrap();

		let loaded: StoredBox = storage.retrieve("boxes", "1").await.unwrap();
		assert_eq!(loaded, value);
		assert!(storage.exists("boxes", "1").await.unwrap());
	}

	#[tokio::test]
	async fn test_update_requires_existing_key() {
		let storage = service();
		let value = StoredBox { label: "B-002".into() };
		let result = storage.update("boxes", "missing", &value).await;
		assert!(matches!(result, Err(StorageError::NotFound)));
	}

	#[tokio::test]
	async fn test_retrieve_optional() {
		let storage = service();
		let loaded: Option<StoredBox> = storage.retrieve_optional("boxes", "nope").await.unwrap();
		assert!(loaded.is_none());
	}

	#[tokio::test]
	async fn test_retrieve_all_is_scoped_to_namespace() {
		let storage = service();
		storage
			.store("boxes", "1", &StoredBox { label: "a".into() })
			.await
			.unwrap();
		storage
			.store("boxes", "2", &StoredBox { label: "b".into() })
			.await
			.unwrap();
		storage
			.store("shelves", "1", &StoredBox { label: "s".into() })
			.await
			.unwrap();

		let mut all: Vec<(String, StoredBox)> = storage.retrieve_all("boxes").await.unwrap();
		all.sort_by(|a, b| a.0.cmp(&b.0));
		assert_eq!(all.len(), 2);
		assert_eq!(all[0].1.label, "a");
		assert_eq!(all[1].0, "2");
	}

	#[test]
	fn test_registered_implementations() {
		let names: Vec<&str> = get_all_implementations().iter().map(|(n, _)| *n).collect();
		assert!(names.contains(&"memory"));
		assert!(names.contains(&"file"));
	}
}
