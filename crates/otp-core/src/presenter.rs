//! Host-provided display capabilities.
//!
//! The controller decides what to show; a [`Presenter`] decides how. All
//! methods are fire-and-forget side effects and must not block.

use otp_types::{BalanceResponse, HistoryEntry, Notice, Order};
use std::sync::{Mutex, PoisonError};

/// Rendering seam between the order lifecycle and the host.
pub trait Presenter: Send + Sync {
	/// Displays a freshly bought or resumed order, code still pending.
	fn show_order(&self, order: &Order);

	/// Displays the delivered code next to the order.
	fn show_code(&self, otp: &str);

	/// Removes the order from display.
	fn hide_order(&self);

	/// Raises a non-blocking notice.
	fn show_notice(&self, notice: &Notice);

	fn show_balance(&self, balance: &BalanceResponse);

	/// Marks the balance as unavailable after a failed refresh.
	fn show_balance_error(&self);

	fn show_history(&self, history: &[HistoryEntry]);

	/// Enables or disables the purchase control.
	fn set_purchase_enabled(&self, enabled: bool);
}

/// One call made on a [`RecordingPresenter`].
#[derive(Debug, Clone, PartialEq)]
pub enum PresenterEvent {
	OrderShown(Order),
	CodeShown(String),
	OrderHidden,
	Notice(Notice),
	Balance(BalanceResponse),
	BalanceError,
	History(Vec<HistoryEntry>),
	PurchaseEnabled(bool),
}

/// Presenter that remembers every call, for hosts that render later and for
/// tests.
#[derive(Debug, Default)]
pub struct RecordingPresenter {
	events: Mutex<Vec<PresenterEvent>>,
}

impl RecordingPresenter {
	pub fn new() -> Self {
		Self::default()
	}

	fn record(&self, event: PresenterEvent) {
		self.events
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.push(event);
	}

	/// Everything recorded so far, oldest first.
	pub fn events(&self) -> Vec<PresenterEvent> {
		self.events
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.clone()
	}

	/// Only the notices, oldest first.
	pub fn notices(&self) -> Vec<Notice> {
		self.events()
			.into_iter()
			.filter_map(|event| match event {
				PresenterEvent::Notice(notice) => Some(notice),
				_ => None,
			})
			.collect()
	}

	pub fn clear(&self) {
		self.events
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.clear();
	}
}

impl Presenter for RecordingPresenter {
	fn show_order(&self, order: &Order) {
		self.record(PresenterEvent::OrderShown(order.clone()));
	}

	fn show_code(&self, otp: &str) {
		self.record(PresenterEvent::CodeShown(otp.to_string()));
	}

	fn hide_order(&self) {
		self.record(PresenterEvent::OrderHidden);
	}

	fn show_notice(&self, notice: &Notice) {
		self.record(PresenterEvent::Notice(notice.clone()));
	}

	fn show_balance(&self, balance: &BalanceResponse) {
		self.record(PresenterEvent::Balance(balance.clone()));
	}

	fn show_balance_error(&self) {
		self.record(PresenterEvent::BalanceError);
	}

	fn show_history(&self, history: &[HistoryEntry]) {
		self.record(PresenterEvent::History(history.to_vec()));
	}

	fn set_purchase_enabled(&self, enabled: bool) {
		self.record(PresenterEvent::PurchaseEnabled(enabled));
	}
}
