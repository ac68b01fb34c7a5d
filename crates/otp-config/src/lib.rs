//! Configuration for the OTP client.
//!
//! Configuration is a TOML file with three sections:
//!
//! ```toml
//! [client]
//! id = "otp-client"
//! poll_interval_seconds = 10
//! deadline_minutes = 15
//! grace_period_seconds = 2
//!
//! [storage]
//! primary = "file"
//! [storage.implementations.file]
//! storage_path = "./data"
//!
//! [api]
//! primary = "http"
//! [api.implementations.http]
//! base_url = "${OTP_API_URL:-http://127.0.0.1:5000}"
//! ```
//!
//! `${VAR}` and `${VAR:-default}` are resolved from the environment before
//! parsing, and `include = ["other.toml"]` pulls sections from other files.
//! Each top-level section must be defined in exactly one file.

#[cfg(any(test, feature = "testing"))]
pub mod builders {
	pub mod config;
}
mod loader;

#[cfg(any(test, feature = "testing"))]
pub use builders::config::ConfigBuilder;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep only the message; the default rendering embeds the whole input
		ConfigError::Parse(err.message().to_string())
	}
}

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Lifecycle timing and client identity.
	pub client: ClientConfig,
	/// Where the current-order record is kept.
	pub storage: StorageConfig,
	/// How the remote API is reached.
	pub api: ApiConfig,
}

/// Client identity and order lifecycle timing.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
	/// Name of this client instance, used in logs.
	pub id: String,
	/// Period of the status poll while waiting for a code.
	#[serde(default = "default_poll_interval_seconds")]
	pub poll_interval_seconds: u64,
	/// Maximum wait for a code before the order is treated as refunded.
	#[serde(default = "default_deadline_minutes")]
	pub deadline_minutes: u64,
	/// How long a delivered code stays on screen before the order is cleared.
	#[serde(default = "default_grace_period_seconds")]
	pub grace_period_seconds: u64,
}

/// Upper bound for `deadline_minutes` (one day).
const MAX_DEADLINE_MINUTES: u64 = 24 * 60;

fn default_poll_interval_seconds() -> u64 {
	10
}

fn default_deadline_minutes() -> u64 {
	15
}

fn default_grace_period_seconds() -> u64 {
	2
}

impl ClientConfig {
	pub fn poll_interval(&self) -> Duration {
		Duration::from_secs(self.poll_interval_seconds)
	}

	pub fn deadline(&self) -> Duration {
		Duration::from_secs(self.deadline_minutes.saturating_mul(60))
	}

	pub fn grace_period(&self) -> Duration {
		Duration::from_secs(self.grace_period_seconds)
	}
}

impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			id: "otp-client".to_string(),
			poll_interval_seconds: default_poll_interval_seconds(),
			deadline_minutes: default_deadline_minutes(),
			grace_period_seconds: default_grace_period_seconds(),
		}
	}
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for the remote API client.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	/// Which implementation to use.
	pub primary: String,
	/// Map of API implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Resolves environment variables in a string.
///
/// Replaces `${VAR_NAME}` with the value of `VAR_NAME` and supports defaults
/// with `${VAR_NAME:-default_value}`. Inputs larger than 1MB are rejected.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut missing = None;
	let resolved = re.replace_all(input, |caps: &regex::Captures<'_>| {
		let var_name = &caps[1];
		match std::env::var(var_name) {
			Ok(value) => value,
			Err(_) => match caps.get(2) {
				Some(default) => default.as_str().to_string(),
				None => {
					missing.get_or_insert_with(|| var_name.to_string());
					String::new()
				},
			},
		}
	});

	match missing {
		Some(var_name) => Err(ConfigError::Validation(format!(
			"Environment variable '{}' not found",
			var_name
		))),
		None => Ok(resolved.into_owned()),
	}
}

impl Config {
	/// Loads configuration from a file, following `include` directives.
	pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
		let file_name = path
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path.display())))?;

		loader::ConfigLoader::new(base_dir)
			.load_config(file_name)
			.await
	}

	/// Checks the cross-field constraints serde cannot express.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.client.id.is_empty() {
			return Err(ConfigError::Validation("Client ID cannot be empty".into()));
		}
		if self.client.poll_interval_seconds == 0 {
			return Err(ConfigError::Validation(
				"poll_interval_seconds must be greater than 0".into(),
			));
		}
		if self.client.deadline_minutes == 0 {
			return Err(ConfigError::Validation(
				"deadline_minutes must be greater than 0".into(),
			));
		}
		if self.client.deadline_minutes > MAX_DEADLINE_MINUTES {
			return Err(ConfigError::Validation(format!(
				"deadline_minutes must be at most {}",
				MAX_DEADLINE_MINUTES
			)));
		}
		if self.client.poll_interval() >= self.client.deadline() {
			return Err(ConfigError::Validation(format!(
				"poll interval ({}s) must be shorter than the deadline ({}m)",
				self.client.poll_interval_seconds, self.client.deadline_minutes
			)));
		}

		validate_implementations("storage", &self.storage.primary, &self.storage.implementations)?;
		validate_implementations("api", &self.api.primary, &self.api.implementations)?;

		Ok(())
	}
}

fn validate_implementations(
	section: &str,
	primary: &str,
	implementations: &HashMap<String, toml::Value>,
) -> Result<(), ConfigError> {
	if implementations.is_empty() {
		return Err(ConfigError::Validation(format!(
			"At least one {} implementation must be configured",
			section
		)));
	}
	if primary.is_empty() {
		return Err(ConfigError::Validation(format!(
			"{} primary implementation cannot be empty",
			section
		)));
	}
	if !implementations.contains_key(primary) {
		return Err(ConfigError::Validation(format!(
			"{} primary '{}' is not among the configured implementations",
			section, primary
		)));
	}
	Ok(())
}

impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const MINIMAL: &str = r#"
[client]
id = "test-client"

[storage]
primary = "memory"
[storage.implementations.memory]

[api]
primary = "scripted"
[api.implementations.scripted]
"#;

	#[test]
	fn test_env_var_resolution() {
		std::env::set_var("OTP_TEST_HOST", "localhost");
		std::env::set_var("OTP_TEST_PORT", "5000");

		let input = "base_url = \"http://${OTP_TEST_HOST}:${OTP_TEST_PORT}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "base_url = \"http://localhost:5000\"");

		std::env::remove_var("OTP_TEST_HOST");
		std::env::remove_var("OTP_TEST_PORT");
	}

	#[test]
	fn test_env_var_with_default() {
		let input = "value = \"${OTP_MISSING_VAR:-fallback}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "value = \"fallback\"");
	}

	#[test]
	fn test_missing_env_var_error() {
		let result = resolve_env_vars("value = \"${OTP_MISSING_VAR}\"");
		assert!(result.unwrap_err().to_string().contains("OTP_MISSING_VAR"));
	}

	#[test]
	fn test_defaults_applied() {
		let config: Config = MINIMAL.parse().unwrap();
		assert_eq!(config.client.poll_interval(), Duration::from_secs(10));
		assert_eq!(config.client.deadline(), Duration::from_secs(15 * 60));
		assert_eq!(config.client.grace_period(), Duration::from_secs(2));
		assert_eq!(config.storage.primary, "memory");
	}

	#[test]
	fn test_unknown_primary_rejected() {
		let config_str = MINIMAL.replace("primary = \"scripted\"", "primary = \"http\"");
		let err = config_str.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("api primary 'http'"));
	}

	#[test]
	fn test_poll_interval_must_be_shorter_than_deadline() {
		let config_str = MINIMAL.replace(
			"id = \"test-client\"",
			"id = \"test-client\"\npoll_interval_seconds = 600\ndeadline_minutes = 5",
		);
		let err = config_str.parse::<Config>().unwrap_err();
		assert!(matches!(err, ConfigError::Validation(_)));
	}

	#[test]
	fn test_oversized_deadline_rejected() {
		let config_str = MINIMAL.replace(
			"id = \"test-client\"",
			"id = \"test-client\"\ndeadline_minutes = 307445734561825861",
		);
		let err = config_str.parse::<Config>().unwrap_err();
		assert!(matches!(err, ConfigError::Validation(_)));

		let one_day = MINIMAL.replace(
			"id = \"test-client\"",
			"id = \"test-client\"\ndeadline_minutes = 1440",
		);
		assert!(one_day.parse::<Config>().is_ok());
	}

	#[test]
	fn test_empty_client_id_rejected() {
		let config_str = MINIMAL.replace("id = \"test-client\"", "id = \"\"");
		assert!(config_str.parse::<Config>().is_err());
	}

	#[test]
	fn test_builder_produces_valid_config() {
		let config = ConfigBuilder::new()
			.client_id("built")
			.grace_period_seconds(5)
			.build();
		config.validate().unwrap();
		assert_eq!(config.client.grace_period(), Duration::from_secs(5));
		assert_eq!(config.api.primary, "scripted");

		let broken = ConfigBuilder::new().poll_interval_seconds(0).build();
		assert!(broken.validate().is_err());
	}
}
