//! Request and response types of the remote HTTP API.
//!
//! Field names follow the JSON the backend speaks, which is camelCase for
//! the order endpoints.

use serde::{Deserialize, Serialize};

/// Response of `GET /api/user/balance`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceResponse {
	pub balance: f64,
	/// Currency code; the UI falls back to USD when absent.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub currency: Option<String>,
}

/// One row of `GET /api/user/history`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
	/// ISO-8601 timestamp of the purchase.
	pub date: String,
	pub service: String,
	pub number: String,
	/// `"success"` or any other backend status string.
	pub status: String,
}

impl HistoryEntry {
	/// Whether the row should be rendered with the success badge.
	pub fn is_success(&self) -> bool {
		self.status == "success"
	}
}

/// Body of `POST /api/buy`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyRequest {
	pub country: String,
	pub service: String,
}

/// Response of `POST /api/buy`.
///
/// The backend answers either with the new order or with an application
/// error message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BuyResponse {
	Error {
		error: String,
	},
	#[serde(rename_all = "camelCase")]
	Purchased {
		order_id: String,
		phone: String,
	},
}

/// Response of `GET /api/check/{orderId}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResponse {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub otp: Option<String>,
}

impl CheckResponse {
	/// Returns the delivered code, treating an empty string as not delivered.
	pub fn code(&self) -> Option<&str> {
		self.otp.as_deref().filter(|otp| !otp.is_empty())
	}
}

/// Response of `POST /api/cancel/{orderId}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelResponse {
	#[serde(default)]
	pub success: bool,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_buy_response_variants() {
		let ok: BuyResponse = serde_json::from_str(r#"{"orderId":"O1","phone":"+1555"}"#).unwrap();
		assert_eq!(
			ok,
			BuyResponse::Purchased {
				order_id: "O1".into(),
				phone: "+1555".into()
			}
		);

		let err: BuyResponse = serde_json::from_str(r#"{"error":"No numbers available"}"#).unwrap();
		assert_eq!(
			err,
			BuyResponse::Error {
				error: "No numbers available".into()
			}
		);

		assert!(serde_json::from_str::<BuyResponse>(r#"{"phone":"+1555"}"#).is_err());
	}

	#[test]
	fn test_check_response_ignores_empty_code() {
		let empty: CheckResponse = serde_json::from_str("{}").unwrap();
		assert_eq!(empty.code(), None);

		let blank: CheckResponse = serde_json::from_str(r#"{"otp":""}"#).unwrap();
		assert_eq!(blank.code(), None);

		let delivered: CheckResponse = serde_json::from_str(r#"{"otp":"4821"}"#).unwrap();
		assert_eq!(delivered.code(), Some("4821"));
	}

	#[test]
	fn test_balance_currency_is_optional() {
		let balance: BalanceResponse = serde_json::from_str(r#"{"balance":12.5}"#).unwrap();
		assert_eq!(balance.currency, None);
		assert_eq!(balance.balance, 12.5);
	}
}
