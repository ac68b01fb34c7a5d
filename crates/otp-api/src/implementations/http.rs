//! HTTP client for the number-rental backend.
//!
//! Uses one pooled reqwest client for every call. Responses are parsed as
//! JSON regardless of status because the backend reports application errors
//! (`{"error": ...}`) with non-2xx codes; only a body that does not parse is
//! turned into a status error.

use crate::{ApiError, ApiFactory, ApiInterface, ApiRegistry};
use async_trait::async_trait;
use otp_types::{
	BalanceResponse, BuyRequest, BuyResponse, CancelResponse, CheckResponse, ConfigSchema, Field,
	FieldType, HistoryEntry, ImplementationRegistry, Schema, ValidationError,
};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECONDS: u64 = 20;

/// reqwest-backed [`ApiInterface`].
pub struct HttpApi {
	client: Client,
	base_url: Url,
}

impl HttpApi {
	pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
		let base_url = Url::parse(base_url)
			.map_err(|e| ApiError::Configuration(format!("invalid base_url '{}': {}", base_url, e)))?;
		if base_url.cannot_be_a_base() {
			return Err(ApiError::Configuration(format!(
				"base_url '{}' cannot carry a path",
				base_url
			)));
		}

		let client = Client::builder()
			.pool_idle_timeout(Duration::from_secs(90))
			.timeout(timeout)
			.build()
			.map_err(|e| ApiError::Configuration(e.to_string()))?;

		Ok(Self { client, base_url })
	}

	/// Appends path segments to the base URL, percent-encoding each one.
	fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
		let mut url = self.base_url.clone();
		url.path_segments_mut()
			.map_err(|_| ApiError::Configuration(format!("base_url '{}' cannot carry a path", self.base_url)))?
			.pop_if_empty()
			.extend(segments);
		Ok(url)
	}

	async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
		let status = response.status();
		let body = response
			.text()
			.await
			.map_err(|e| ApiError::Transport(e.to_string()))?;

		match serde_json::from_str(&body) {
			Ok(value) => Ok(value),
			Err(_) if !status.is_success() => Err(ApiError::Status {
				status: status.as_u16(),
				body,
			}),
			Err(e) => Err(ApiError::Decode(e.to_string())),
		}
	}

	async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ApiError> {
		let url = self.endpoint(segments)?;
		tracing::trace!(%url, "GET");
		let response = self
			.client
			.get(url)
			.send()
			.await
			.map_err(|e| ApiError::Transport(e.to_string()))?;
		Self::decode(response).await
	}

	async fn post<T: DeserializeOwned>(
		&self,
		segments: &[&str],
		body: Option<&BuyRequest>,
	) -> Result<T, ApiError> {
		let url = self.endpoint(segments)?;
		tracing::trace!(%url, "POST");
		let mut request = self.client.post(url);
		if let Some(body) = body {
			request = request.json(body);
		}
		let response = request
			.send()
			.await
			.map_err(|e| ApiError::Transport(e.to_string()))?;
		Self::decode(response).await
	}
}

#[async_trait]
impl ApiInterface for HttpApi {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(HttpApiSchema)
	}

	async fn balance(&self) -> Result<BalanceResponse, ApiError> {
		self.get(&["api", "user", "balance"]).await
	}

	async fn history(&self) -> Result<Vec<HistoryEntry>, ApiError> {
		self.get(&["api", "user", "history"]).await
	}

	async fn buy(&self, request: &BuyRequest) -> Result<BuyResponse, ApiError> {
		self.post(&["api", "buy"], Some(request)).await
	}

	async fn check(&self, order_id: &str) -> Result<CheckResponse, ApiError> {
		self.get(&["api", "check", order_id]).await
	}

	async fn cancel(&self, order_id: &str) -> Result<CancelResponse, ApiError> {
		self.post(&["api", "cancel", order_id], None).await
	}
}

/// Configuration schema for HttpApi.
pub struct HttpApiSchema;

impl ConfigSchema for HttpApiSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("base_url", FieldType::Url)],
			vec![Field::new(
				"timeout_seconds",
				FieldType::Integer {
					min: Some(1),
					max: Some(300),
				},
			)],
		);
		schema.validate(config)
	}
}

/// Registry for the HTTP implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "http";
	type Factory = ApiFactory;

	fn factory() -> Self::Factory {
		create_api
	}
}

impl ApiRegistry for Registry {}

/// Factory function to create the HTTP client from configuration.
///
/// Configuration parameters:
/// - `base_url`: backend root, e.g. "http://127.0.0.1:5000" (required)
/// - `timeout_seconds`: per-request timeout (default: 20)
pub fn create_api(config: &toml::Value) -> Result<Box<dyn ApiInterface>, ApiError> {
	HttpApiSchema
		.validate(config)
		.map_err(|e| ApiError::Configuration(e.to_string()))?;

	let base_url = config
		.get("base_url")
		.and_then(|v| v.as_str())
		.ok_or_else(|| ApiError::Configuration("base_url is required".into()))?;
	let timeout_seconds = config
		.get("timeout_seconds")
		.and_then(|v| v.as_integer())
		.map(|v| v as u64)
		.unwrap_or(DEFAULT_TIMEOUT_SECONDS);

	Ok(Box::new(HttpApi::new(
		base_url,
		Duration::from_secs(timeout_seconds),
	)?))
}
