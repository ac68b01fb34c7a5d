//! Configuration builder for tests and local experiments.

use crate::{ApiConfig, ClientConfig, Config, StorageConfig};
use std::collections::HashMap;

/// Builder for creating `Config` instances with a fluent API.
///
/// Starts from an in-memory store and the scripted backend, so the result
/// needs neither a disk nor a network.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	client: ClientConfig,
	storage_primary: String,
	storage_implementations: HashMap<String, toml::Value>,
	api_primary: String,
	api_implementations: HashMap<String, toml::Value>,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

fn empty_table() -> toml::Value {
	toml::Value::Table(toml::Table::new())
}

impl ConfigBuilder {
	pub fn new() -> Self {
		Self {
			client: ClientConfig {
				id: "test-client".to_string(),
				..ClientConfig::default()
			},
			storage_primary: "memory".to_string(),
			storage_implementations: HashMap::from([("memory".to_string(), empty_table())]),
			api_primary: "scripted".to_string(),
			api_implementations: HashMap::from([("scripted".to_string(), empty_table())]),
		}
	}

	pub fn client_id(mut self, id: impl Into<String>) -> Self {
		self.client.id = id.into();
		self
	}

	pub fn poll_interval_seconds(mut self, seconds: u64) -> Self {
		self.client.poll_interval_seconds = seconds;
		self
	}

	pub fn deadline_minutes(mut self, minutes: u64) -> Self {
		self.client.deadline_minutes = minutes;
		self
	}

	pub fn grace_period_seconds(mut self, seconds: u64) -> Self {
		self.client.grace_period_seconds = seconds;
		self
	}

	/// Adds (or replaces) a storage implementation and makes it primary.
	pub fn storage(mut self, name: impl Into<String>, config: toml::Value) -> Self {
		let name = name.into();
		self.storage_implementations.insert(name.clone(), config);
		self.storage_primary = name;
		self
	}

	/// Adds (or replaces) an API implementation and makes it primary.
	pub fn api(mut self, name: impl Into<String>, config: toml::Value) -> Self {
		let name = name.into();
		self.api_implementations.insert(name.clone(), config);
		self.api_primary = name;
		self
	}

	/// Builds the `Config` with the configured values. Not validated.
	pub fn build(self) -> Config {
		Config {
			client: self.client,
			storage: StorageConfig {
				primary: self.storage_primary,
				implementations: self.storage_implementations,
			},
			api: ApiConfig {
				primary: self.api_primary,
				implementations: self.api_implementations,
			},
		}
	}
}
