//! Registry of every storage and API implementation linked into the binary.
//!
//! Implementations register themselves through their crate's
//! `get_all_implementations`; the configuration then picks one of each by
//! name.

use otp_api::ApiFactory;
use otp_config::Config;
use otp_core::{OtpBuilder, OtpEngine, OtpFactories, Presenter};
use otp_storage::StorageFactory;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// Global registry for all implementation factories
pub struct FactoryRegistry {
	pub storage: HashMap<String, StorageFactory>,
	pub api: HashMap<String, ApiFactory>,
}

impl FactoryRegistry {
	fn new() -> Self {
		Self {
			storage: HashMap::new(),
			api: HashMap::new(),
		}
	}

	pub fn register_storage(&mut self, name: impl Into<String>, factory: StorageFactory) {
		self.storage.insert(name.into(), factory);
	}

	pub fn register_api(&mut self, name: impl Into<String>, factory: ApiFactory) {
		self.api.insert(name.into(), factory);
	}
}

static REGISTRY: OnceLock<FactoryRegistry> = OnceLock::new();

/// Get the global factory registry, populating it on first use.
pub fn get_registry() -> &'static FactoryRegistry {
	REGISTRY.get_or_init(|| {
		let mut registry = FactoryRegistry::new();

		for (name, factory) in otp_storage::get_all_implementations() {
			tracing::debug!("Registering storage implementation: {}", name);
			registry.register_storage(name, factory);
		}

		for (name, factory) in otp_api::get_all_implementations() {
			tracing::debug!("Registering api implementation: {}", name);
			registry.register_api(name, factory);
		}

		registry
	})
}

/// Picks the registered factory for every configured implementation.
fn select<F: Copy>(
	registered: &HashMap<String, F>,
	configured: &HashMap<String, toml::Value>,
	kind: &str,
) -> Result<HashMap<String, F>, String> {
	let mut factories = HashMap::new();
	for name in configured.keys() {
		match registered.get(name) {
			Some(factory) => {
				factories.insert(name.clone(), *factory);
			},
			None => {
				let mut available: Vec<_> = registered.keys().cloned().collect();
				available.sort();
				return Err(format!(
					"Unknown {} implementation '{}'. Available: [{}]",
					kind,
					name,
					available.join(", ")
				));
			},
		}
	}
	Ok(factories)
}

/// Builds the engine for `config`, rendering through `presenter`.
pub fn build_engine_from_config(
	config: Config,
	presenter: Arc<dyn Presenter>,
) -> Result<OtpEngine, Box<dyn std::error::Error>> {
	let registry = get_registry();

	let factories = OtpFactories {
		storage_factories: select(&registry.storage, &config.storage.implementations, "storage")?,
		api_factories: select(&registry.api, &config.api.implementations, "api")?,
	};

	Ok(OtpBuilder::new(config)
		.with_presenter(presenter)
		.build(factories)?)
}
