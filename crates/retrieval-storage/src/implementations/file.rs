//! File-based storage backend.
//!
//! Each namespace is a directory under the configured base path and each
//! value is one `.bin` file in it, prefixed with a fixed-size header that
//! carries the expiry time.

use crate::{StorageError, StorageFactory, StorageInterface, StorageRegistry};
use async_trait::async_trait;
use retrieval_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError,
};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::fs;

const DATA_EXTENSION: &str = "bin";

fn unix_now() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_secs())
		.unwrap_or_default()
}

/// Fixed-size file header.
///
/// Binary layout (32 bytes total):
/// - [0-3]: Magic bytes "RETS"
/// - [4-5]: Version (u16, little-endian)
/// - [6-13]: Expiration timestamp (u64, little-endian, Unix seconds, 0 = never)
/// - [14-31]: Reserved
#[derive(Debug, Clone, PartialEq)]
struct FileHeader {
	version: u16,
	expires_at: u64,
}

impl FileHeader {
	const MAGIC: &'static [u8; 4] = b"RETS";
	const VERSION: u16 = 1;
	const SIZE: usize = 32;

	fn new(ttl: Duration) -> Self {
		let expires_at = if ttl.is_zero() {
			0
		} else {
			unix_now().saturating_add(ttl.as_secs())
		};

		Self {
			version: Self::VERSION,
			expires_at,
		}
	}

	fn serialize(&self) -> [u8; Self::SIZE] {
		let mut bytes = [0u8; Self::SIZE];
		bytes[0..4].copy_from_slice(Self::MAGIC);
		bytes[4..6].copy_from_slice(&self.version.to_le_bytes());
		bytes[6..14].copy_from_slice(&self.expires_at.to_le_bytes());
		bytes
	}

	fn deserialize(bytes: &[u8]) -> Result<Self, StorageError> {
		if bytes.len() < Self::SIZE {
			return Err(StorageError::Backend("File too small for header".into()));
		}
		if &bytes[0..4] != Self::MAGIC {
			return Err(StorageError::Backend("Missing file header".into()));
		}

		let version = u16::from_le_bytes([bytes[4], bytes[5]]);
		if version > Self::VERSION {
			return Err(StorageError::Backend(format!(
				"Unsupported file version: {}",
				version
			)));
		}

		let mut expires_bytes = [0u8; 8];
		expires_bytes.copy_from_slice(&bytes[6..14]);

		Ok(Self {
			version,
			expires_at: u64::from_le_bytes(expires_bytes),
		})
	}

	fn is_expired(&self) -> bool {
		self.expires_at != 0 && unix_now() >= self.expires_at
	}
}

/// File-based storage implementation.
///
/// Ids are made filesystem-safe by replacing `/` and `:` with `_`; ids
/// containing those characters are therefore listed in their sanitized form.
///
/// Values only expire when written with an explicit TTL. Orders, their audit
/// trail and the reference counters are always written without one, so
/// there is no per-namespace default to configure.
pub struct FileStorage {
	base_path: PathBuf,
}

impl FileStorage {
	pub fn new(base_path: PathBuf) -> Self {
		Self { base_path }
	}

	fn split_key(key: &str) -> (&str, &str) {
		key.split_once(':').unwrap_or(("default", key))
	}

	fn sanitize(part: &str) -> String {
		part.replace(['/', ':', '\\'], "_")
	}

	fn get_file_path(&self, key: &str) -> PathBuf {
		let (namespace, id) = Self::split_key(key);
		self.base_path
			.join(Self::sanitize(namespace))
			.join(format!("{}.{}", Self::sanitize(id), DATA_EXTENSION))
	}

	/// Reads a data file, returning `None` if it is missing or expired.
	async fn read_live(path: &Path) -> Result<Option<Vec<u8>>, StorageError> {
		let data = match fs::read(path).await {
			Ok(data) => data,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		let header = FileHeader::deserialize(&data)?;
		if header.is_expired() {
			return Ok(None);
		}
		Ok(Some(data[FileHeader::SIZE..].to_vec()))
	}

	/// Data files of one namespace directory.
	async fn data_files(dir: &Path) -> Result<Vec<PathBuf>, StorageError> {
		let mut files = Vec::new();
		let mut entries = match fs::read_dir(dir).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(files),
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		while let Some(entry) = entries
			.next_entry()
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?
		{
			let path = entry.path();
			if path.extension() == Some(std::ffi::OsStr::new(DATA_EXTENSION)) {
				files.push(path);
			}
		}
		Ok(files)
	}

	async fn cleanup_expired_files(&self) -> Result<usize, StorageError> {
		let mut removed = 0;
		let mut namespaces = match fs::read_dir(&self.base_path).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		while let Some(namespace) = namespaces
			.next_entry()
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?
		{
			for path in Self::data_files(&namespace.path()).await? {
				let data = match fs::read(&path).await {
					Ok(data) => data,
					Err(e) => {
						tracing::debug!("Skipping file {:?}: could not be read: {}", path, e);
						continue;
					},
				};
				let expired = FileHeader::deserialize(&data)
					.map(|h| h.is_expired())
					.unwrap_or(false);
				if !expired {
					continue;
				}
				match fs::remove_file(&path).await {
					Ok(()) => removed += 1,
					Err(e) => tracing::warn!("Failed to remove expired file {:?}: {}", path, e),
				}
			}
		}
		Ok(removed)
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		Self::read_live(&self.get_file_path(key))
			.await?
			.ok_or(StorageError::NotFound)
	}

	async fn set_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Option<Duration>,
	) -> Result<(), StorageError> {
		let path = self.get_file_path(key);

		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)
				.await
				.map_err(|e| StorageError::Backend(e.to_string()))?;
		}

		let header = FileHeader::new(ttl.unwrap_or(Duration::ZERO));

		let mut file_data = Vec::with_capacity(FileHeader::SIZE + value.len());
		file_data.extend_from_slice(&header.serialize());
		file_data.extend_from_slice(&value);

		// Write to a temp file and rename so readers never see a partial value.
		let temp_path = path.with_extension("tmp");
		fs::write(&temp_path, file_data)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		fs::rename(&temp_path, &path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		match fs::remove_file(self.get_file_path(key)).await {
			Ok(_) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		Ok(Self::read_live(&self.get_file_path(key)).await?.is_some())
	}

	async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
		let (namespace, id_prefix) = Self::split_key(prefix);
		let dir = self.base_path.join(Self::sanitize(namespace));

		let mut keys = Vec::new();
		for path in Self::data_files(&dir).await? {
			let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
				continue;
			};
			if !stem.starts_with(id_prefix) {
				continue;
			}
			if Self::read_live(&path).await?.is_some() {
				keys.push(format!("{}:{}", namespace, stem));
			}
		}
		Ok(keys)
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileStorageSchema)
	}

	async fn cleanup_expired(&self) -> Result<usize, StorageError> {
		self.cleanup_expired_files().await
	}
}

/// Configuration schema for FileStorage.
pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let optional_fields = vec![Field::new("storage_path", FieldType::String)
			.with_validator(|v| match v.as_str() {
				Some(s) if !s.trim().is_empty() => Ok(()),
				_ => Err("storage_path cannot be empty".into()),
			})];

		Schema::new(vec![], optional_fields).validate(config)
	}
}

/// Factory function to create a file storage backend from configuration.
///
/// Configuration parameters:
/// - `storage_path`: Base directory (default: "./data/storage")
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	FileStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;

	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or("./data/storage")
		.to_string();

	Ok(Box::new(FileStorage::new(PathBuf::from(storage_path))))
}

/// Registry for the file backend.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	fn storage(dir: &TempDir) -> FileStorage {
		FileStorage::new(dir.path().to_path_buf())
	}

	#[test]
	fn test_header_roundtrip() {
		let header = FileHeader::new(Duration::ZERO);
		let parsed = FileHeader::deserialize(&header.serialize()).unwrap();
		assert_eq!(parsed, header);
		assert!(!parsed.is_expired());
	}

	#[tokio::test]
	async fn test_set_get_delete() {
		let dir = TempDir::new().unwrap();
		let storage = storage(&dir);

		storage
			.set_bytes("orders:abc", b"{}".to_vec(), None)
			.await
			.unwrap();
		assert!(dir.path().join("orders").join("abc.bin").exists());
		assert_eq!(storage.get_bytes("orders:abc").await.unwrap(), b"{}".to_vec());

		storage.delete("orders:abc").await.unwrap();
		assert!(matches!(
			storage.get_bytes("orders:abc").await,
			Err(StorageError::NotFound)
		));
		storage.delete("orders:abc").await.unwrap();
	}

	#[tokio::test]
	async fn test_list_keys_only_returns_namespace() {
		let dir = TempDir::new().unwrap();
		let storage = storage(&dir);
		storage.set_bytes("orders:a", vec![1], None).await.unwrap();
		storage.set_bytes("orders:b", vec![2], None).await.unwrap();
		storage.set_bytes("audit_log:a", vec![3], None).await.unwrap();

		let mut keys = storage.list_keys("orders:").await.unwrap();
		keys.sort();
		assert_eq!(keys, vec!["orders:a".to_string(), "orders:b".to_string()]);
		assert!(storage.list_keys("sequences:").await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_expired_entries_are_hidden_and_cleaned() {
		let dir = TempDir::new().unwrap();
		let storage = storage(&dir);

		// Write a header that expired in the past.
		let path = storage.get_file_path("audit_log:old");
		std::fs::create_dir_all(path.parent().unwrap()).unwrap();
		let header = FileHeader {
			version: FileHeader::VERSION,
			expires_at: 1,
		};
		let mut data = header.serialize().to_vec();
		data.extend_from_slice(b"[]");
		std::fs::write(&path, data).unwrap();

		assert!(!storage.exists("audit_log:old").await.unwrap());
		assert!(storage.list_keys("audit_log:").await.unwrap().is_empty());
		assert_eq!(storage.cleanup_expired().await.unwrap(), 1);
		assert!(!path.exists());
	}

	#[tokio::test]
	async fn test_writes_without_ttl_never_expire() {
		let dir = TempDir::new().unwrap();
		let storage = storage(&dir);
		storage
			.set_bytes("sequences:RET-2026", b"1".to_vec(), None)
			.await
			.unwrap();

		let data = std::fs::read(storage.get_file_path("sequences:RET-2026")).unwrap();
		assert_eq!(FileHeader::deserialize(&data).unwrap().expires_at, 0);
		assert_eq!(storage.cleanup_expired().await.unwrap(), 0);
		assert!(storage.exists("sequences:RET-2026").await.unwrap());
	}

	#[test]
	fn test_schema_rejects_namespace_ttl() {
		for key in ["ttl_orders", "ttl_sequences", "ttl_audit_log"] {
			let config: toml::Value = toml::from_str(&format!("{} = 1", key)).unwrap();
			assert!(FileStorageSchema.validate(&config).is_err(), "{} accepted", key);
			assert!(matches!(
				create_storage(&config),
				Err(StorageError::Configuration(_))
			));
		}
	}

	#[test]
	fn test_factory_accepts_storage_path() {
		let config: toml::Value = toml::from_str("storage_path = \"/tmp/x\"").unwrap();
		assert!(create_storage(&config).is_ok());

		let blank: toml::Value = toml::from_str("storage_path = \" \"").unwrap();
		assert!(create_storage(&blank).is_err());
	}
}
