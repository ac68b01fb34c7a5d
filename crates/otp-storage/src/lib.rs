//! Durable local records for the OTP client.
//!
//! The client keeps exactly one durable record, the current order, so that a
//! restarted process can resume polling. This crate provides the low-level
//! [`StorageInterface`] that backends implement and the typed
//! [`StorageService`] the lifecycle controller talks to.

use async_trait::async_trait;
use otp_types::{ConfigSchema, ImplementationRegistry, StorageKey};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod memory;
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// Error that occurs when a requested item is not found.
	#[error("Not found")]
	NotFound,
	/// Error that occurs during serialization/deserialization.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Error that occurs in the storage backend.
	#[error("Backend error: {0}")]
	Backend(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Low-level key-value interface implemented by storage backends.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Retrieves raw bytes for the given key.
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Stores raw bytes, replacing any previous value.
	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

	/// Deletes the value for the given key. Deleting a missing key succeeds.
	async fn delete(&self, key: &str) -> Result<(), StorageError>;

	/// Checks if a key exists in storage.
	async fn exists(&self, key: &str) -> Result<bool, StorageError>;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Type alias for storage factory functions.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

/// Registry trait for storage implementations.
pub trait StorageRegistry: ImplementationRegistry<Factory = StorageFactory> {}

/// Returns `(name, factory)` for every storage implementation in this crate.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{file, memory};

	vec![
		(file::Registry::NAME, file::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

/// Typed access to the durable records.
///
/// Values are stored as JSON so the record stays readable and compatible
/// with what a browser host would keep in local storage.
pub struct StorageService {
	backend: Box<dyn StorageInterface>,
}

impl StorageService {
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self { backend }
	}

	/// Serializes `data` and stores it under `key`, replacing any previous value.
	pub async fn store<T: Serialize>(&self, key: StorageKey, data: &T) -> Result<(), StorageError> {
		let bytes =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend.set_bytes(key.as_str(), bytes).await
	}

	/// Retrieves and deserializes the value under `key`.
	///
	/// Returns [`StorageError::NotFound`] when nothing is stored.
	pub async fn retrieve<T: DeserializeOwned>(&self, key: StorageKey) -> Result<T, StorageError> {
		let bytes = self.backend.get_bytes(key.as_str()).await?;
		serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))
	}

	/// Like [`retrieve`](Self::retrieve), but maps a missing record to `None`.
	pub async fn load<T: DeserializeOwned>(&self, key: StorageKey) -> Result<Option<T>, StorageError> {
		match self.retrieve(key).await {
			Ok(value) => Ok(Some(value)),
			Err(StorageError::NotFound) => Ok(None),
			Err(e) => Err(e),
		}
	}

	/// Removes the value under `key`. Removing a missing record succeeds.
	pub async fn remove(&self, key: StorageKey) -> Result<(), StorageError> {
		self.backend.delete(key.as_str()).await
	}

	pub async fn exists(&self, key: StorageKey) -> Result<bool, StorageError> {
		self.backend.exists(key.as_str()).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use implementations::memory::MemoryStorage;
	use otp_types::Order;

	#[tokio::test]
	async fn test_order_record_lifecycle() {
		let storage = StorageService::new(Box::new(MemoryStorage::new()));
		let order = Order::new("O1", "+1555");

		assert!(storage
			.load::<Order>(StorageKey::CurrentOrder)
			.await
			.unwrap()
			.is_none());

		storage.store(StorageKey::CurrentOrder, &order).await.unwrap();
		assert!(storage.exists(StorageKey::CurrentOrder).await.unwrap());

		let loaded: Order = storage.retrieve(StorageKey::CurrentOrder).await.unwrap();
		assert_eq!(loaded, order);

		storage.remove(StorageKey::CurrentOrder).await.unwrap();
		storage.remove(StorageKey::CurrentOrder).await.unwrap();
		assert!(matches!(
			storage.retrieve::<Order>(StorageKey::CurrentOrder).await,
			Err(StorageError::NotFound)
		));
	}

	#[tokio::test]
	async fn test_corrupt_record_is_a_serialization_error() {
		let backend = MemoryStorage::new();
		backend
			.set_bytes(StorageKey::CurrentOrder.as_str(), b"{not json".to_vec())
			.await
			.unwrap();
		let storage = StorageService::new(Box::new(backend));

		let result = storage.load::<Order>(StorageKey::CurrentOrder).await;
		assert!(matches!(result, Err(StorageError::Serialization(_))));
	}
}
