//! File-based storage backend.
//!
//! Each key is one JSON file under the configured directory. Writes go to a
//! temporary file that is then renamed over the target, so a crash never
//! leaves a half-written order record behind. The directory is locked for the
//! lifetime of the backend so that two client processes cannot both own the
//! current order.

use crate::{StorageError, StorageFactory, StorageInterface, StorageRegistry};
use async_trait::async_trait;
use fs2::FileExt;
use otp_types::{ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tokio::fs;

const LOCK_FILE: &str = ".lock";
const DEFAULT_STORAGE_PATH: &str = "./data/storage";

/// File-based storage implementation.
pub struct FileStorage {
	base_path: PathBuf,
	/// Held open while the backend lives; dropping it releases the lock.
	_lock: File,
}

impl FileStorage {
	/// Opens (creating if needed) the storage directory and takes its lock.
	///
	/// Fails with [`StorageError::Backend`] if another process holds the lock.
	pub fn open(base_path: impl Into<PathBuf>) -> Result<Self, StorageError> {
		let base_path = base_path.into();
		std::fs::create_dir_all(&base_path)
			.map_err(|e| StorageError::Backend(format!("{}: {}", base_path.display(), e)))?;

		let lock = OpenOptions::new()
			.create(true)
			.truncate(false)
			.write(true)
			.open(base_path.join(LOCK_FILE))
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		lock.try_lock_exclusive().map_err(|e| {
			StorageError::Backend(format!(
				"storage directory {} is in use by another process: {}",
				base_path.display(),
				e
			))
		})?;

		tracing::debug!(path = %base_path.display(), "Opened file storage");
		Ok(Self {
			base_path,
			_lock: lock,
		})
	}

	pub fn base_path(&self) -> &Path {
		&self.base_path
	}

	/// Maps a key to a filesystem-safe path.
	fn get_file_path(&self, key: &str) -> PathBuf {
		let safe_key = key.replace(['/', '\\', ':', '.'], "_");
		self.base_path.join(format!("{}.json", safe_key))
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		match fs::read(self.get_file_path(key)).await {
			Ok(data) => Ok(data),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		let path = self.get_file_path(key);
		let temp_path = path.with_extension("tmp");

		fs::write(&temp_path, value)
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
		fs::try_exists(self.get_file_path(key))
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileStorageSchema)
	}
}

/// Configuration schema for FileStorage.
pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![Field::new("storage_path", FieldType::String).with_validator(|value| {
				match value.as_str() {
					Some("") => Err("storage_path cannot be empty".to_string()),
					_ => Ok(()),
				}
			})],
		);
		schema.validate(config)
	}
}

/// Registry for the file storage implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}

/// Factory function to create a file storage backend from configuration.
///
/// Configuration parameters:
/// - `storage_path`: directory for the records (default: "./data/storage")
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	FileStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;

	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or(DEFAULT_STORAGE_PATH);

	Ok(Box::new(FileStorage::open(storage_path)?))
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[tokio::test]
	async fn test_round_trip_and_delete() {
		let temp_dir = TempDir::new().unwrap();
		let storage = FileStorage::open(temp_dir.path()).unwrap();
		let value = br#"{"orderId":"O1","phone":"+1555"}"#.to_vec();

		storage.set_bytes("currentOrder", value.clone()).await.unwrap();
		assert!(temp_dir.path().join("currentOrder.json").exists());
		assert!(!temp_dir.path().join("currentOrder.tmp").exists());
		assert_eq!(storage.get_bytes("currentOrder").await.unwrap(), value);

		storage.delete("currentOrder").await.unwrap();
		storage.delete("currentOrder").await.unwrap();
		assert!(!storage.exists("currentOrder").await.unwrap());
		assert!(matches!(
			storage.get_bytes("currentOrder").await,
			Err(StorageError::NotFound)
		));
	}

	#[tokio::test]
	async fn test_record_survives_reopen() {
		let temp_dir = TempDir::new().unwrap();
		{
			let storage = FileStorage::open(temp_dir.path()).unwrap();
			storage.set_bytes("currentOrder", b"{}".to_vec()).await.unwrap();
		}

		let reopened = FileStorage::open(temp_dir.path()).unwrap();
		assert_eq!(reopened.get_bytes("currentOrder").await.unwrap(), b"{}".to_vec());
	}

	#[test]
	fn test_second_owner_is_rejected() {
		let temp_dir = TempDir::new().unwrap();
		let _first = FileStorage::open(temp_dir.path()).unwrap();

		let second = FileStorage::open(temp_dir.path());
		assert!(matches!(second, Err(StorageError::Backend(_))));
	}

	#[test]
	fn test_keys_are_sanitized() {
		let temp_dir = TempDir::new().unwrap();
		let storage = FileStorage::open(temp_dir.path()).unwrap();
		let path = storage.get_file_path("../escape:key");
		assert_eq!(path, temp_dir.path().join("___escape_key.json"));
	}

	#[test]
	fn test_factory_rejects_empty_path() {
		let config: toml::Value = toml::from_str(r#"storage_path = """#).unwrap();
		assert!(matches!(
			create_storage(&config),
			Err(StorageError::Configuration(_))
		));
	}
}
