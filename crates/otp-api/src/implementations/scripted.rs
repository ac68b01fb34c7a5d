//! Scripted in-process backend.
//!
//! Simulates the number-rental backend without a network: every purchase
//! charges a fixed price and hands out a fake number, the code shows up after
//! a configured number of checks, and cancelling refunds the price. Meant for
//! dry runs of the client and for end-to-end tests.

use crate::{ApiError, ApiFactory, ApiInterface, ApiRegistry};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use otp_types::{
	BalanceResponse, BuyRequest, BuyResponse, CancelResponse, CheckResponse,
	ConfigSchema, Field, FieldType, HistoryEntry, ImplementationRegistry, Schema, ValidationError,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Configuration for the scripted backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptedApiConfig {
	/// Starting balance.
	#[serde(default = "default_balance")]
	pub balance: f64,
	#[serde(default = "default_currency")]
	pub currency: String,
	/// Price charged per number.
	#[serde(default = "default_price")]
	pub price: f64,
	/// Code delivered to every order.
	#[serde(default = "default_code")]
	pub code: String,
	/// Number of checks answered with no code before the code is delivered.
	/// `None` means the code never arrives.
	#[serde(default = "default_checks_before_code")]
	pub checks_before_code: Option<u32>,
}

fn default_balance() -> f64 {
	10.0
}

fn default_currency() -> String {
	"USD".to_string()
}

fn default_price() -> f64 {
	0.5
}

fn default_code() -> String {
	"4821".to_string()
}

fn default_checks_before_code() -> Option<u32> {
	Some(2)
}

impl Default for ScriptedApiConfig {
	fn default() -> Self {
		Self {
			balance: default_balance(),
			currency: default_currency(),
			price: default_price(),
			code: default_code(),
			checks_before_code: default_checks_before_code(),
		}
	}
}

#[derive(Debug)]
struct ScriptedOrder {
	phone: String,
	service: String,
	checks: u32,
	delivered: bool,
	cancelled: bool,
	history_index: usize,
}

#[derive(Debug, Default)]
struct ScriptedState {
	balance: f64,
	next_id: u64,
	orders: HashMap<String, ScriptedOrder>,
	history: Vec<HistoryEntry>,
}

/// In-process stand-in for the backend.
pub struct ScriptedApi {
	config: ScriptedApiConfig,
	state: Mutex<ScriptedState>,
}

impl ScriptedApi {
	pub fn new(config: ScriptedApiConfig) -> Self {
		let state = ScriptedState {
			balance: config.balance,
			next_id: 1,
			..Default::default()
		};
		Self {
			config,
			state: Mutex::new(state),
		}
	}
}

#[async_trait]
impl ApiInterface for ScriptedApi {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(ScriptedApiSchema)
	}

	async fn balance(&self) -> Result<BalanceResponse, ApiError> {
		let state = self.state.lock().await;
		Ok(BalanceResponse {
			balance: state.balance,
			currency: Some(self.config.currency.clone()),
		})
	}

	async fn history(&self) -> Result<Vec<HistoryEntry>, ApiError> {
		let state = self.state.lock().await;
		Ok(state.history.iter().rev().cloned().collect())
	}

	async fn buy(&self, request: &BuyRequest) -> Result<BuyResponse, ApiError> {
		let mut state = self.state.lock().await;
		if request.country.is_empty() || request.service.is_empty() {
			return Ok(BuyResponse::Error {
				error: "Country and service are required".into(),
			});
		}
		if state.balance < self.config.price {
			return Ok(BuyResponse::Error {
				error: "Insufficient balance".into(),
			});
		}

		state.balance -= self.config.price;
		let order_id = format!("scripted-{}", state.next_id);
		let phone = format!("+1555{:07}", state.next_id);
		state.next_id += 1;

		let history_index = state.history.len();
		state.history.push(HistoryEntry {
			date: rfc3339_now(),
			service: request.service.clone(),
			number: phone.clone(),
			status: "pending".into(),
		});
		state.orders.insert(
			order_id.clone(),
			ScriptedOrder {
				phone: phone.clone(),
				service: request.service.clone(),
				checks: 0,
				delivered: false,
				cancelled: false,
				history_index,
			},
		);

		tracing::debug!(%order_id, service = %request.service, "Scripted purchase");
		Ok(BuyResponse::Purchased { order_id, phone })
	}

	async fn check(&self, order_id: &str) -> Result<CheckResponse, ApiError> {
		let mut state = self.state.lock().await;
		let order = state
			.orders
			.get_mut(order_id)
			.ok_or_else(|| ApiError::Status {
				status: 404,
				body: format!("unknown order {}", order_id),
			})?;

		if order.cancelled {
			return Ok(CheckResponse::default());
		}

		let due = self
			.config
			.checks_before_code
			.is_some_and(|after| order.checks >= after);
		order.checks += 1;
		if !due {
			return Ok(CheckResponse::default());
		}

		order.delivered = true;
		let index = order.history_index;
		if let Some(entry) = state.history.get_mut(index) {
			entry.status = "success".into();
		}
		Ok(CheckResponse {
			otp: Some(self.config.code.clone()),
		})
	}

	async fn cancel(&self, order_id: &str) -> Result<CancelResponse, ApiError> {
		let mut state = self.state.lock().await;
		let Some(order) = state.orders.get_mut(order_id) else {
			return Ok(CancelResponse { success: false });
		};
		if order.delivered || order.cancelled {
			return Ok(CancelResponse { success: false });
		}

		order.cancelled = true;
		let index = order.history_index;
		tracing::debug!(%order_id, phone = %order.phone, service = %order.service, "Scripted cancel");
		if let Some(entry) = state.history.get_mut(index) {
			entry.status = "cancelled".into();
		}
		state.balance += self.config.price;
		Ok(CancelResponse { success: true })
	}
}

fn rfc3339_now() -> String {
	Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Configuration schema for ScriptedApi.
pub struct ScriptedApiSchema;

impl ConfigSchema for ScriptedApiSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let non_negative = |value: &toml::Value| {
			match value.as_float().or_else(|| value.as_integer().map(|i| i as f64)) {
				Some(f) if f < 0.0 => Err("must not be negative".to_string()),
				Some(_) => Ok(()),
				None => Err("must be a number".to_string()),
			}
		};
		let schema = Schema::new(
			vec![],
			vec![
				Field::new("currency", FieldType::String),
				Field::new("code", FieldType::String),
				Field::new(
					"checks_before_code",
					FieldType::Integer {
						min: Some(0),
						max: Some(u32::MAX as i64),
					},
				),
			],
		);
		schema.validate(config)?;

		for name in ["balance", "price"] {
			if let Some(value) = config.get(name) {
				non_negative(value).map_err(|message| ValidationError::InvalidValue {
					field: name.to_string(),
					message,
				})?;
			}
		}
		Ok(())
	}
}

/// Registry for the scripted implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "scripted";
	type Factory = ApiFactory;

	fn factory() -> Self::Factory {
		create_api
	}
}

impl ApiRegistry for Registry {}

/// Factory function to create the scripted backend from configuration.
pub fn create_api(config: &toml::Value) -> Result<Box<dyn ApiInterface>, ApiError> {
	ScriptedApiSchema
		.validate(config)
		.map_err(|e| ApiError::Configuration(e.to_string()))?;

	let scripted_config: ScriptedApiConfig = config
		.clone()
		.try_into()
		.map_err(|e| ApiError::Configuration(format!("Invalid scripted config: {}", e)))?;

	Ok(Box::new(ScriptedApi::new(scripted_config)))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn request(service: &str) -> BuyRequest {
		BuyRequest {
			country: "india".into(),
			service: service.into(),
		}
	}

	async fn buy(api: &ScriptedApi) -> String {
		match api.buy(&request("telegram")).await.unwrap() {
			BuyResponse::Purchased { order_id, .. } => order_id,
			other => panic!("unexpected purchase response: {:?}", other),
		}
	}

	#[tokio::test]
	async fn test_code_arrives_after_configured_checks() {
		let api = ScriptedApi::new(ScriptedApiConfig {
			checks_before_code: Some(2),
			..Default::default()
		});
		let order_id = buy(&api).await;

		assert_eq!(api.check(&order_id).await.unwrap().code(), None);
		assert_eq!(api.check(&order_id).await.unwrap().code(), None);
		assert_eq!(api.check(&order_id).await.unwrap().code(), Some("4821"));

		let history = api.history().await.unwrap();
		assert_eq!(history.len(), 1);
		assert!(history[0].is_success());
	}

	#[tokio::test]
	async fn test_cancel_refunds_once() {
		let api = ScriptedApi::new(ScriptedApiConfig {
			balance: 1.0,
			price: 0.5,
			checks_before_code: None,
			..Default::default()
		});
		let order_id = buy(&api).await;
		assert_eq!(api.balance().await.unwrap().balance, 0.5);

		assert!(api.cancel(&order_id).await.unwrap().success);
		assert!(!api.cancel(&order_id).await.unwrap().success);
		assert_eq!(api.balance().await.unwrap().balance, 1.0);
		assert_eq!(api.check(&order_id).await.unwrap().code(), None);
	}

	#[tokio::test]
	async fn test_insufficient_balance_is_an_error_payload() {
		let api = ScriptedApi::new(ScriptedApiConfig {
			balance: 0.0,
			..Default::default()
		});
		let response = api.buy(&request("telegram")).await.unwrap();
		assert_eq!(
			response,
			BuyResponse::Error {
				error: "Insufficient balance".into()
			}
		);
	}

	#[tokio::test]
	async fn test_unknown_order_check_fails() {
		let api = ScriptedApi::new(ScriptedApiConfig::default());
		assert!(matches!(
			api.check("nope").await,
			Err(ApiError::Status { status: 404, .. })
		));
	}

	#[test]
	fn test_history_dates_are_rfc3339() {
		let date = rfc3339_now();
		assert!(chrono::DateTime::parse_from_rfc3339(&date).is_ok());
		assert!(date.ends_with('Z'));
	}

	#[test]
	fn test_factory_reads_overrides() {
		let config: toml::Value = toml::from_str(
			r#"
balance = 3.0
code = "0000"
checks_before_code = 0
"#,
		)
		.unwrap();
		assert!(create_api(&config).is_ok());

		let negative: toml::Value = toml::from_str("price = -1.0").unwrap();
		assert!(matches!(
			create_api(&negative),
			Err(ApiError::Configuration(_))
		));
	}
}
