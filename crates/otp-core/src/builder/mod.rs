//! Builder for assembling an engine from configuration.
//!
//! Storage and API backends are selected by name from the configuration and
//! created through factory functions, so the binary decides which
//! implementations exist and this crate never depends on them directly.

use crate::controller::{LifecycleTimings, OrderController};
use crate::engine::OtpEngine;
use crate::presenter::Presenter;
use crate::scheduler::TokioScheduler;
use otp_api::{ApiError, ApiInterface, ApiService};
use otp_config::Config;
use otp_storage::{StorageError, StorageInterface, StorageService};
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during engine construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Factory functions for every pluggable component, keyed by implementation
/// name.
pub struct OtpFactories<SF, AF> {
	pub storage_factories: HashMap<String, SF>,
	pub api_factories: HashMap<String, AF>,
}

/// Builder for constructing an [`OtpEngine`] with pluggable implementations.
pub struct OtpBuilder {
	config: Config,
	presenter: Option<Arc<dyn Presenter>>,
}

impl OtpBuilder {
	pub fn new(config: Config) -> Self {
		Self {
			config,
			presenter: None,
		}
	}

	/// Sets where the order, notices and account data are rendered.
	pub fn with_presenter(mut self, presenter: Arc<dyn Presenter>) -> Self {
		self.presenter = Some(presenter);
		self
	}

	/// Builds the engine from the primary storage and API implementations.
	///
	/// Must be called from within a tokio runtime, since the engine's timers
	/// are tokio tasks.
	pub fn build<SF, AF>(self, factories: OtpFactories<SF, AF>) -> Result<OtpEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
		AF: Fn(&toml::Value) -> Result<Box<dyn ApiInterface>, ApiError>,
	{
		let presenter = self
			.presenter
			.ok_or_else(|| BuilderError::MissingComponent("presenter".into()))?;

		let storage_backend = create_primary(
			"storage",
			&self.config.storage.primary,
			&self.config.storage.implementations,
			&factories.storage_factories,
		)?;
		let storage = Arc::new(StorageService::new(storage_backend));

		let api_backend = create_primary(
			"api",
			&self.config.api.primary,
			&self.config.api.implementations,
			&factories.api_factories,
		)?;
		let api = Arc::new(ApiService::new(api_backend));

		let (scheduler, timer_events) = TokioScheduler::new();
		let timings = LifecycleTimings::from(&self.config.client);
		tracing::debug!(
			poll_interval = ?timings.poll_interval,
			deadline = ?timings.deadline,
			grace_period = ?timings.grace_period,
			"Lifecycle timings"
		);

		let controller = OrderController::new(api, storage, Arc::new(scheduler), presenter, timings);
		Ok(OtpEngine::new(self.config, controller, timer_events))
	}
}

/// Creates the primary implementation of one component.
///
/// Only the primary is instantiated: backends may hold exclusive resources,
/// such as the file storage lock.
fn create_primary<T, E, F>(
	component: &str,
	primary: &str,
	implementations: &HashMap<String, toml::Value>,
	factories: &HashMap<String, F>,
) -> Result<T, BuilderError>
where
	E: Display,
	F: Fn(&toml::Value) -> Result<T, E>,
{
	let config = implementations.get(primary).ok_or_else(|| {
		BuilderError::Config(format!(
			"No configuration for {} implementation '{}'",
			component, primary
		))
	})?;
	let factory = factories.get(primary).ok_or_else(|| {
		BuilderError::Config(format!(
			"Unknown {} implementation '{}'",
			component, primary
		))
	})?;

	match factory(config) {
		Ok(implementation) => {
			tracing::info!(%component, implementation = %primary, "Loaded");
			Ok(implementation)
		},
		Err(e) => {
			tracing::error!(
				%component,
				implementation = %primary,
				error = %e,
				"Failed to create implementation"
			);
			Err(BuilderError::Config(format!(
				"Failed to create {} implementation '{}': {}",
				component, primary, e
			)))
		},
	}
}
