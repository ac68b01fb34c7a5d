//! String formatting utilities.
//!
//! Display helpers for order identifiers in logs and for the account panel
//! (balance line and purchase history dates).

use crate::BalanceResponse;
use chrono::{DateTime, Local, NaiveDateTime};

/// Currency shown when the backend does not report one.
pub const DEFAULT_CURRENCY: &str = "USD";

/// Truncates an identifier for display purposes.
///
/// Shows only the first 8 characters followed by ".." for longer strings.
pub fn truncate_id(id: &str) -> String {
	match id.char_indices().nth(8) {
		Some((idx, _)) => format!("{}..", &id[..idx]),
		None => id.to_string(),
	}
}

/// Formats a balance as `"<amount> <currency>"`.
pub fn format_balance(balance: &BalanceResponse) -> String {
	format!(
		"{} {}",
		balance.balance,
		balance.currency.as_deref().unwrap_or(DEFAULT_CURRENCY)
	)
}

const HISTORY_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Offset-less layouts the backend may use; these are already local time.
const NAIVE_DATE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Renders an ISO-8601 history date in local time.
///
/// Falls back to the raw string when it does not parse.
pub fn format_history_date(date: &str) -> String {
	if let Ok(parsed) = DateTime::parse_from_rfc3339(date) {
		return parsed.with_timezone(&Local).format(HISTORY_DATE_FORMAT).to_string();
	}
	NAIVE_DATE_FORMATS
		.iter()
		.find_map(|format| NaiveDateTime::parse_from_str(date, format).ok())
		.map(|parsed| parsed.format(HISTORY_DATE_FORMAT).to_string())
		.unwrap_or_else(|| date.to_string())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_truncate_id() {
		assert_eq!(truncate_id("O1"), "O1");
		assert_eq!(truncate_id("12345678"), "12345678");
		assert_eq!(truncate_id("123456789abc"), "12345678..");
	}

	#[test]
	fn test_format_balance_defaults_currency() {
		let balance = BalanceResponse {
			balance: 3.5,
			currency: None,
		};
		assert_eq!(format_balance(&balance), "3.5 USD");

		let balance = BalanceResponse {
			balance: 100.0,
			currency: Some("RUB".into()),
		};
		assert_eq!(format_balance(&balance), "100 RUB");
	}

	#[test]
	fn test_format_history_date() {
		assert_eq!(format_history_date("yesterday"), "yesterday");

		let rendered = format_history_date("2024-05-01T10:00:00Z");
		assert_eq!(rendered.len(), "2024-05-01 10:00:00".len());
		assert!(rendered.starts_with("2024-"));
	}

	#[test]
	fn test_format_history_date_without_offset() {
		assert_eq!(format_history_date("2024-05-01T10:00:00"), "2024-05-01 10:00:00");
		assert_eq!(format_history_date("2024-05-01T10:00:00.250"), "2024-05-01 10:00:00");
		assert_eq!(format_history_date("2024-05-01 10:00:00"), "2024-05-01 10:00:00");
		assert_eq!(format_history_date("2024-05-01T25:00:00"), "2024-05-01T25:00:00");
	}
}
