//! Remote API access for the OTP client.
//!
//! The backend exposes five JSON endpoints (balance, history, buy, check,
//! cancel). [`ApiInterface`] is the seam implementations plug into: `http`
//! talks to a real backend through reqwest, `scripted` simulates one locally.
//! [`ApiService`] wraps the selected implementation with logging and turns the
//! purchase response into either an [`Order`] or an application error.

use async_trait::async_trait;
use otp_types::{
	truncate_id, BalanceResponse, BuyRequest, BuyResponse, CancelResponse, CheckResponse,
	ConfigSchema, HistoryEntry, ImplementationRegistry, Order,
};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod http;
	pub mod scripted;
}

/// Errors that can occur while talking to the backend.
#[derive(Debug, Error)]
pub enum ApiError {
	/// The request never produced a response (connection, timeout).
	#[error("Transport error: {0}")]
	Transport(String),
	/// A response arrived but its body was not the expected JSON.
	#[error("Decode error: {0}")]
	Decode(String),
	/// A non-success status with a body that could not be interpreted.
	#[error("HTTP {status}: {body}")]
	Status { status: u16, body: String },
	/// The backend answered with an application-level error message.
	#[error("{0}")]
	Rejected(String),
	/// Error that occurs when configuration is invalid.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

impl ApiError {
	/// Whether the message should be shown to the user as-is.
	///
	/// Only application errors are; transport and decoding failures get a
	/// generic try-again message instead.
	pub fn is_user_facing(&self) -> bool {
		matches!(self, ApiError::Rejected(_))
	}
}

/// Interface implemented by backend clients.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ApiInterface: Send + Sync {
	/// Returns the configuration schema for this implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// `GET /api/user/balance`
	async fn balance(&self) -> Result<BalanceResponse, ApiError>;

	/// `GET /api/user/history`
	async fn history(&self) -> Result<Vec<HistoryEntry>, ApiError>;

	/// `POST /api/buy`
	async fn buy(&self, request: &BuyRequest) -> Result<BuyResponse, ApiError>;

	/// `GET /api/check/{orderId}`
	async fn check(&self, order_id: &str) -> Result<CheckResponse, ApiError>;

	/// `POST /api/cancel/{orderId}`
	async fn cancel(&self, order_id: &str) -> Result<CancelResponse, ApiError>;
}

/// Type alias for API factory functions.
pub type ApiFactory = fn(&toml::Value) -> Result<Box<dyn ApiInterface>, ApiError>;

/// Registry trait for API implementations.
pub trait ApiRegistry: ImplementationRegistry<Factory = ApiFactory> {}

/// Returns `(name, factory)` for every API implementation in this crate.
pub fn get_all_implementations() -> Vec<(&'static str, ApiFactory)> {
	use implementations::{http, scripted};

	vec![
		(http::Registry::NAME, http::Registry::factory()),
		(scripted::Registry::NAME, scripted::Registry::factory()),
	]
}

/// Logging front for the selected [`ApiInterface`].
pub struct ApiService {
	implementation: Box<dyn ApiInterface>,
}

impl ApiService {
	pub fn new(implementation: Box<dyn ApiInterface>) -> Self {
		Self { implementation }
	}

	pub async fn balance(&self) -> Result<BalanceResponse, ApiError> {
		let balance = self.implementation.balance().await?;
		tracing::debug!(balance = balance.balance, currency = ?balance.currency, "Fetched balance");
		Ok(balance)
	}

	pub async fn history(&self) -> Result<Vec<HistoryEntry>, ApiError> {
		let history = self.implementation.history().await?;
		tracing::debug!(entries = history.len(), "Fetched purchase history");
		Ok(history)
	}

	/// Buys a number and returns the new order.
	///
	/// An `{error}` payload becomes [`ApiError::Rejected`] carrying the
	/// backend's message verbatim.
	pub async fn purchase(&self, country: &str, service: &str) -> Result<Order, ApiError> {
		let request = BuyRequest {
			country: country.to_string(),
			service: service.to_string(),
		};

		match self.implementation.buy(&request).await? {
			BuyResponse::Purchased { order_id, phone } => {
				tracing::info!(
					order_id = %truncate_id(&order_id),
					%country,
					%service,
					"Purchased number"
				);
				Ok(Order::new(order_id, phone).with_request(country, service))
			},
			BuyResponse::Error { error } if error.trim().is_empty() => {
				tracing::warn!(%country, %service, "Purchase rejected without a message");
				Err(ApiError::Decode("empty error in purchase response".into()))
			},
			BuyResponse::Error { error } => {
				tracing::warn!(%country, %service, error = %error, "Purchase rejected");
				Err(ApiError::Rejected(error))
			},
		}
	}

	/// Checks whether a code has arrived. Returns the code if it has.
	pub async fn check(&self, order_id: &str) -> Result<Option<String>, ApiError> {
		let response = self.implementation.check(order_id).await?;
		let code = response.code().map(str::to_string);
		tracing::debug!(
			order_id = %truncate_id(order_id),
			delivered = code.is_some(),
			"Checked order"
		);
		Ok(code)
	}

	/// Asks the backend to cancel the order. Returns whether it accepted.
	pub async fn cancel(&self, order_id: &str) -> Result<bool, ApiError> {
		let response = self.implementation.cancel(order_id).await?;
		tracing::debug!(
			order_id = %truncate_id(order_id),
			success = response.success,
			"Cancel requested"
		);
		Ok(response.success)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use mockall::predicate::eq;

	#[tokio::test]
	async fn test_purchase_builds_order() {
		let mut api = MockApiInterface::new();
		api.expect_buy()
			.withf(|request| request.country == "india" && request.service == "telegram")
			.times(1)
			.returning(|_| {
				Ok(BuyResponse::Purchased {
					order_id: "O1".into(),
					phone: "+1555".into(),
				})
			});
		let service = ApiService::new(Box::new(api));

		let order = service.purchase("india", "telegram").await.unwrap();
		assert_eq!(order.order_id, "O1");
		assert_eq!(order.phone, "+1555");
		assert_eq!(order.country.as_deref(), Some("india"));
		assert_eq!(order.otp, None);
	}

	#[tokio::test]
	async fn test_purchase_error_payload_is_rejected_verbatim() {
		let mut api = MockApiInterface::new();
		api.expect_buy().returning(|_| {
			Ok(BuyResponse::Error {
				error: "Insufficient balance".into(),
			})
		});
		let service = ApiService::new(Box::new(api));

		let err = service.purchase("india", "telegram").await.unwrap_err();
		assert!(err.is_user_facing());
		assert_eq!(err.to_string(), "Insufficient balance");
	}

	#[tokio::test]
	async fn test_purchase_empty_error_is_not_user_facing() {
		let mut api = MockApiInterface::new();
		api.expect_buy().returning(|_| {
			Ok(BuyResponse::Error {
				error: String::new(),
			})
		});
		let service = ApiService::new(Box::new(api));

		let err = service.purchase("india", "telegram").await.unwrap_err();
		assert!(!err.is_user_facing());
	}

	#[tokio::test]
	async fn test_check_treats_empty_code_as_pending() {
		let mut api = MockApiInterface::new();
		api.expect_check()
			.with(eq("O1"))
			.times(1)
			.returning(|_| {
				Ok(CheckResponse {
					otp: Some(String::new()),
				})
			});
		api.expect_check()
			.with(eq("O2"))
			.returning(|_| {
				Ok(CheckResponse {
					otp: Some("4821".into()),
				})
			});
		let service = ApiService::new(Box::new(api));

		assert_eq!(service.check("O1").await.unwrap(), None);
		assert_eq!(service.check("O2").await.unwrap().as_deref(), Some("4821"));
	}

	#[tokio::test]
	async fn test_transport_errors_are_not_user_facing() {
		let mut api = MockApiInterface::new();
		api.expect_cancel()
			.returning(|_| Err(ApiError::Transport("connection refused".into())));
		let service = ApiService::new(Box::new(api));

		let err = service.cancel("O1").await.unwrap_err();
		assert!(!err.is_user_facing());
	}
}
