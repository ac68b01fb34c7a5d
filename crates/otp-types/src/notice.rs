//! User-facing notices.
//!
//! Every notice is a title and message pair handed to the host's popup
//! capability. They are raised by the order lifecycle and never block it.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Generic message for a purchase that failed in transport.
pub const PURCHASE_FAILED_MESSAGE: &str = "Failed to purchase number. Please try again.";
/// Generic message for a cancel that failed in transport.
pub const CANCEL_FAILED_MESSAGE: &str = "Failed to cancel order. Please try again.";
/// Generic message for a manual code refresh that failed in transport.
pub const CHECK_FAILED_MESSAGE: &str = "Failed to check for a code. Please try again.";
/// Shown when a purchase is attempted while an order is still active.
pub const ORDER_ACTIVE_MESSAGE: &str =
	"An order is already active. Cancel it or wait for the code first.";
/// Shown when cancelling an order whose code was already delivered.
pub const ALREADY_DELIVERED_MESSAGE: &str = "The code for this order has already been delivered.";

/// A notice shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notice {
	/// Something went wrong; the message is shown verbatim.
	Error { message: String },
	/// A code was delivered.
	Success { otp: String },
	/// Nothing arrived before the deadline and the balance was refunded.
	Timeout { waited: Duration },
	/// The user cancelled the order.
	Cancelled,
}

impl Notice {
	pub fn error(message: impl Into<String>) -> Self {
		Notice::Error {
			message: message.into(),
		}
	}

	pub fn title(&self) -> &'static str {
		match self {
			Notice::Error { .. } => "Error",
			Notice::Success { .. } => "Success",
			Notice::Timeout { .. } => "Timeout",
			Notice::Cancelled => "Cancelled",
		}
	}

	pub fn message(&self) -> String {
		match self {
			Notice::Error { message } => message.clone(),
			Notice::Success { otp } => format!("OTP received: {}", otp),
			Notice::Timeout { waited } => format!(
				"No OTP received within {} minutes. Your balance has been refunded.",
				waited.as_secs() / 60
			),
			Notice::Cancelled => "Order cancelled and balance refunded.".to_string(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_notice_texts() {
		let timeout = Notice::Timeout {
			waited: Duration::from_secs(15 * 60),
		};
		assert_eq!(timeout.title(), "Timeout");
		assert_eq!(
			timeout.message(),
			"No OTP received within 15 minutes. Your balance has been refunded."
		);

		let success = Notice::Success { otp: "4821".into() };
		assert_eq!(success.message(), "OTP received: 4821");

		assert_eq!(Notice::Cancelled.title(), "Cancelled");
		assert_eq!(Notice::error("boom").message(), "boom");
	}
}
