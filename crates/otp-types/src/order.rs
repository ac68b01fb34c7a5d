//! Order types for the number-rental lifecycle.
//!
//! An [`Order`] is one outstanding phone-number rental waiting for an SMS
//! code. [`OrderState`] is the explicit lifecycle state the controller keeps
//! for it, so nothing downstream has to infer progress from display text.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A rented phone number awaiting a one-time code.
///
/// This is also the JSON shape of the durable `currentOrder` record, which is
/// why the keys are camelCase and the optional fields tolerate being absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
	/// Opaque identifier issued by the backend.
	pub order_id: String,
	/// Rented number, as displayed to the user.
	pub phone: String,
	/// Delivered one-time code, once resolved.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub otp: Option<String>,
	/// Country the number was bought for.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub country: Option<String>,
	/// Service the number was bought for.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub service: Option<String>,
	/// Unix timestamp of the purchase. Informational only.
	#[serde(default)]
	pub created_at: u64,
}

impl Order {
	/// Creates an order from the identifier and number returned by a purchase.
	pub fn new(order_id: impl Into<String>, phone: impl Into<String>) -> Self {
		Self {
			order_id: order_id.into(),
			phone: phone.into(),
			otp: None,
			country: None,
			service: None,
			created_at: crate::current_timestamp(),
		}
	}

	/// Records the purchase parameters on the order.
	pub fn with_request(mut self, country: &str, service: &str) -> Self {
		self.country = Some(country.to_string());
		self.service = Some(service.to_string());
		self
	}
}

impl fmt::Display for Order {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} ({})", self.phone, self.order_id)
	}
}

/// Lifecycle state of the single current order.
///
/// Transitions:
/// - `Idle -> AwaitingCode` on a successful purchase or restart recovery
/// - `AwaitingCode -> Resolved` when a status check yields a code
/// - `AwaitingCode -> Idle` on cancel or deadline
/// - `Resolved -> Idle` once the grace period has elapsed
/// - anything `-> Idle` on an explicit clear
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OrderState {
	/// No order.
	#[default]
	Idle,
	/// An order is active and no code has arrived yet.
	AwaitingCode { order: Order },
	/// A code was delivered; the order is shown until the grace period ends.
	Resolved { order: Order, otp: String },
}

impl OrderState {
	/// Returns the active order, if any.
	pub fn order(&self) -> Option<&Order> {
		match self {
			OrderState::Idle => None,
			OrderState::AwaitingCode { order } | OrderState::Resolved { order, .. } => Some(order),
		}
	}

	/// Returns the lightweight discriminant of this state.
	pub fn kind(&self) -> OrderStateKind {
		match self {
			OrderState::Idle => OrderStateKind::Idle,
			OrderState::AwaitingCode { .. } => OrderStateKind::AwaitingCode,
			OrderState::Resolved { .. } => OrderStateKind::Resolved,
		}
	}

	pub fn is_idle(&self) -> bool {
		matches!(self, OrderState::Idle)
	}
}

/// Discriminant of [`OrderState`] without the order payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderStateKind {
	Idle,
	AwaitingCode,
	Resolved,
}

impl fmt::Display for OrderStateKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			OrderStateKind::Idle => "idle",
			OrderStateKind::AwaitingCode => "awaiting_code",
			OrderStateKind::Resolved => "resolved",
		};
		f.write_str(s)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_order_record_uses_camel_case_keys() {
		let order = Order {
			order_id: "O1".into(),
			phone: "+1555".into(),
			otp: None,
			country: Some("india".into()),
			service: None,
			created_at: 42,
		};

		let json = serde_json::to_value(&order).unwrap();
		assert_eq!(json["orderId"], "O1");
		assert_eq!(json["phone"], "+1555");
		assert_eq!(json["createdAt"], 42);
		assert!(json.get("otp").is_none());
		assert!(json.get("service").is_none());
	}

	#[test]
	fn test_minimal_record_is_accepted() {
		let order: Order = serde_json::from_str(r#"{"orderId":"O1","phone":"+1555"}"#).unwrap();
		assert_eq!(order.order_id, "O1");
		assert_eq!(order.otp, None);
		assert_eq!(order.created_at, 0);
	}

	#[test]
	fn test_state_accessors() {
		let order = Order::new("O1", "+1555");
		assert!(OrderState::Idle.order().is_none());
		assert!(OrderState::Idle.is_idle());

		let awaiting = OrderState::AwaitingCode {
			order: order.clone(),
		};
		assert_eq!(awaiting.order(), Some(&order));
		assert_eq!(awaiting.kind(), OrderStateKind::AwaitingCode);

		let resolved = OrderState::Resolved {
			order,
			otp: "4821".into(),
		};
		assert_eq!(resolved.kind().to_string(), "resolved");
	}
}
