//! Terminal rendering of the order lifecycle.
//!
//! Everything the user is meant to read goes to the writer given here
//! (stdout in the binary); logs go to stderr through tracing.

use otp_core::Presenter;
use otp_types::{
	format_balance, format_history_date, truncate_id, BalanceResponse, HistoryEntry, Notice, Order,
};
use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

const WAITING_PLACEHOLDER: &str = "Waiting...";
const BALANCE_ERROR: &str = "Error loading balance";
const EMPTY_HISTORY: &str = "No purchases yet";

/// [`Presenter`] writing plain text lines.
pub struct ConsolePresenter<W> {
	out: Mutex<W>,
	history: bool,
}

impl ConsolePresenter<io::Stdout> {
	pub fn stdout() -> Self {
		Self::new(io::stdout())
	}
}

impl<W: Write + Send> ConsolePresenter<W> {
	pub fn new(out: W) -> Self {
		Self {
			out: Mutex::new(out),
			history: true,
		}
	}

	/// Whether purchase history is printed along with the balance.
	pub fn with_history(mut self, enabled: bool) -> Self {
		self.history = enabled;
		self
	}

	#[cfg(test)]
	fn into_inner(self) -> W {
		self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
	}

	fn line(&self, text: &str) {
		let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
		if let Err(e) = writeln!(out, "{}", text).and_then(|_| out.flush()) {
			tracing::warn!(error = %e, "Failed to write to console");
		}
	}
}

impl<W: Write + Send> Presenter for ConsolePresenter<W> {
	fn show_order(&self, order: &Order) {
		self.line(&format!(
			"Number: {}  (order {})",
			order.phone,
			truncate_id(&order.order_id)
		));
		self.line(&format!("Code:   {}", WAITING_PLACEHOLDER));
	}

	fn show_code(&self, otp: &str) {
		self.line(&format!("Code:   {}", otp));
	}

	fn hide_order(&self) {
		tracing::trace!("Order hidden");
	}

	fn show_notice(&self, notice: &Notice) {
		self.line(&format!("[{}] {}", notice.title(), notice.message()));
	}

	fn show_balance(&self, balance: &BalanceResponse) {
		self.line(&format!("Balance: {}", format_balance(balance)));
	}

	fn show_balance_error(&self) {
		self.line(&format!("Balance: {}", BALANCE_ERROR));
	}

	fn show_history(&self, history: &[HistoryEntry]) {
		if !self.history {
			return;
		}
		if history.is_empty() {
			self.line(EMPTY_HISTORY);
			return;
		}
		for entry in history {
			let badge = if entry.is_success() {
				entry.status.clone()
			} else {
				format!("! {}", entry.status)
			};
			self.line(&format!(
				"{:<19}  {:<12}  {:<16}  {}",
				format_history_date(&entry.date),
				entry.service,
				entry.number,
				badge
			));
		}
	}

	fn set_purchase_enabled(&self, enabled: bool) {
		tracing::trace!(enabled, "Purchase control toggled");
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::time::Duration;

	fn output(presenter: ConsolePresenter<Vec<u8>>) -> String {
		String::from_utf8(presenter.into_inner()).unwrap()
	}

	#[test]
	fn test_order_then_code() {
		let presenter = ConsolePresenter::new(Vec::new());
		presenter.show_order(&Order::new("0123456789abcdef", "+1555"));
		presenter.show_code("4821");
		presenter.show_notice(&Notice::Success {
			otp: "4821".into(),
		});

		assert_eq!(
			output(presenter),
			"Number: +1555  (order 01234567..)\n\
			 Code:   Waiting...\n\
			 Code:   4821\n\
			 [Success] OTP received: 4821\n"
		);
	}

	#[test]
	fn test_timeout_notice_text() {
		let presenter = ConsolePresenter::new(Vec::new());
		presenter.show_notice(&Notice::Timeout {
			waited: Duration::from_secs(15 * 60),
		});
		assert_eq!(
			output(presenter),
			"[Timeout] No OTP received within 15 minutes. Your balance has been refunded.\n"
		);
	}

	#[test]
	fn test_account_panel() {
		let presenter = ConsolePresenter::new(Vec::new());
		presenter.show_balance(&BalanceResponse {
			balance: 9.5,
			currency: None,
		});
		presenter.show_history(&[]);
		presenter.show_history(&[HistoryEntry {
			date: "not a date".into(),
			service: "telegram".into(),
			number: "+1555".into(),
			status: "timeout".into(),
		}]);
		presenter.show_balance_error();

		let text = output(presenter);
		let lines: Vec<_> = text.lines().collect();
		assert_eq!(lines[0], "Balance: 9.5 USD");
		assert_eq!(lines[1], "No purchases yet");
		assert!(lines[2].starts_with("not a date"));
		assert!(lines[2].ends_with("! timeout"));
		assert_eq!(lines[3], "Balance: Error loading balance");
	}

	#[test]
	fn test_history_can_be_hidden() {
		let presenter = ConsolePresenter::new(Vec::new()).with_history(false);
		presenter.show_history(&[]);
		assert!(output(presenter).is_empty());
	}
}
