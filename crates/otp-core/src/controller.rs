//! Order lifecycle controller.
//!
//! Owns the single current order and drives it through
//! purchase -> poll -> resolve / timeout / cancel. All timer firings and user
//! actions arrive on the task that owns the controller, so the state needs no
//! locking; instead every timer callback checks that it is still the timer
//! armed for its role and that the current state permits its action.

use crate::presenter::Presenter;
use crate::scheduler::{Scheduler, TimerEvent, TimerId, TimerKind};
use crate::state::is_valid_transition;
use otp_api::{ApiError, ApiService};
use otp_config::ClientConfig;
use otp_storage::{StorageError, StorageService};
use otp_types::{
	truncate_id, Notice, Order, OrderState, OrderStateKind, StorageKey,
	ALREADY_DELIVERED_MESSAGE, CANCEL_FAILED_MESSAGE, CHECK_FAILED_MESSAGE, ORDER_ACTIVE_MESSAGE,
	PURCHASE_FAILED_MESSAGE,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by controller operations.
///
/// By the time one is returned the user has already been notified; callers
/// only need it to decide how to exit.
#[derive(Debug, Error)]
pub enum ControllerError {
	#[error(transparent)]
	Api(#[from] ApiError),
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
	#[error("An order is already active")]
	OrderActive,
	#[error("The code for this order has already been delivered")]
	AlreadyResolved,
	#[error("Invalid state transition from {from} to {to}")]
	InvalidTransition {
		from: OrderStateKind,
		to: OrderStateKind,
	},
}

/// Result of a cancel request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
	/// There was no order to cancel.
	NoOrder,
	/// The backend cancelled the order and the balance was refunded.
	Cancelled,
	/// The backend declined; the order is still active.
	Refused,
}

/// Intervals governing one order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleTimings {
	pub poll_interval: Duration,
	pub deadline: Duration,
	pub grace_period: Duration,
}

impl Default for LifecycleTimings {
	fn default() -> Self {
		Self::from(&ClientConfig::default())
	}
}

impl From<&ClientConfig> for LifecycleTimings {
	fn from(config: &ClientConfig) -> Self {
		Self {
			poll_interval: config.poll_interval(),
			deadline: config.deadline(),
			grace_period: config.grace_period(),
		}
	}
}

#[derive(Debug, Default)]
struct ArmedTimers {
	poll: Option<TimerId>,
	deadline: Option<TimerId>,
	grace: Option<TimerId>,
}

impl ArmedTimers {
	fn slot(&mut self, kind: TimerKind) -> &mut Option<TimerId> {
		match kind {
			TimerKind::Poll => &mut self.poll,
			TimerKind::Deadline => &mut self.deadline,
			TimerKind::Grace => &mut self.grace,
		}
	}

	fn get(&self, kind: TimerKind) -> Option<TimerId> {
		match kind {
			TimerKind::Poll => self.poll,
			TimerKind::Deadline => self.deadline,
			TimerKind::Grace => self.grace,
		}
	}
}

/// Drives the single current order through its lifecycle.
pub struct OrderController {
	state: OrderState,
	timers: ArmedTimers,
	timings: LifecycleTimings,
	api: Arc<ApiService>,
	storage: Arc<StorageService>,
	scheduler: Arc<dyn Scheduler>,
	presenter: Arc<dyn Presenter>,
}

impl OrderController {
	pub fn new(
		api: Arc<ApiService>,
		storage: Arc<StorageService>,
		scheduler: Arc<dyn Scheduler>,
		presenter: Arc<dyn Presenter>,
		timings: LifecycleTimings,
	) -> Self {
		Self {
			state: OrderState::Idle,
			timers: ArmedTimers::default(),
			timings,
			api,
			storage,
			scheduler,
			presenter,
		}
	}

	pub fn state(&self) -> &OrderState {
		&self.state
	}

	pub fn timings(&self) -> LifecycleTimings {
		self.timings
	}

	/// Handle of the timer currently armed for `kind`, if any.
	pub fn armed(&self, kind: TimerKind) -> Option<TimerId> {
		self.timers.get(kind)
	}

	/// Resumes the order left behind by a previous process, if any.
	///
	/// An order still waiting for its code goes straight back to polling with
	/// a fresh deadline; elapsed time before the restart is not accounted for.
	/// An order whose code had already arrived finishes through the grace
	/// period. An unreadable record is discarded.
	pub async fn recover(&mut self) -> Result<(), ControllerError> {
		if !self.state.is_idle() {
			return Err(ControllerError::OrderActive);
		}

		let order = match self.storage.load::<Order>(StorageKey::CurrentOrder).await {
			Ok(Some(order)) => order,
			Ok(None) => {
				tracing::debug!("No stored order to resume");
				return Ok(());
			},
			Err(StorageError::Serialization(e)) => {
				tracing::warn!(error = %e, "Discarding unreadable stored order");
				self.storage.remove(StorageKey::CurrentOrder).await?;
				return Ok(());
			},
			Err(e) => return Err(e.into()),
		};

		match order.otp.clone().filter(|otp| !otp.is_empty()) {
			Some(otp) => {
				tracing::info!(
					order_id = %truncate_id(&order.order_id),
					"Resuming order with delivered code"
				);
				self.presenter.show_order(&order);
				self.presenter.show_code(&otp);
				self.transition(OrderState::Resolved { order, otp })?;
				self.arm_once(TimerKind::Grace, self.timings.grace_period);
			},
			None => {
				tracing::info!(
					order_id = %truncate_id(&order.order_id),
					phone = %order.phone,
					"Resuming stored order"
				);
				self.begin(order).await?;
			},
		}
		Ok(())
	}

	/// Buys a number and starts waiting for its code.
	///
	/// Rejected while another order is active. Backend rejections are shown
	/// verbatim, other failures with a generic message; either way the
	/// controller stays idle.
	pub async fn purchase(&mut self, country: &str, service: &str) -> Result<(), ControllerError> {
		if let Some(order) = self.state.order() {
			tracing::warn!(
				order_id = %truncate_id(&order.order_id),
				"Purchase rejected, an order is already active"
			);
			self.presenter
				.show_notice(&Notice::error(ORDER_ACTIVE_MESSAGE));
			return Err(ControllerError::OrderActive);
		}

		self.presenter.set_purchase_enabled(false);
		let result = self.api.purchase(country, service).await;
		self.presenter.set_purchase_enabled(true);

		let order = match result {
			Ok(order) => order,
			Err(e) => {
				tracing::error!(%country, %service, error = %e, "Purchase failed");
				self.presenter
					.show_notice(&failure_notice(&e, PURCHASE_FAILED_MESSAGE));
				return Err(e.into());
			},
		};

		if let Err(e) = self.storage.store(StorageKey::CurrentOrder, &order).await {
			tracing::warn!(
				order_id = %truncate_id(&order.order_id),
				error = %e,
				"Failed to persist order, it will not survive a restart"
			);
		}
		self.begin(order).await?;
		let _ = self.refresh_account().await;
		Ok(())
	}

	/// Handles a timer firing.
	///
	/// Firings of timers that are no longer armed for their role are dropped.
	pub async fn on_timer(&mut self, event: TimerEvent) {
		if self.timers.get(event.kind) != Some(event.id) {
			tracing::trace!(id = %event.id, kind = %event.kind, "Ignoring stale timer");
			return;
		}

		match event.kind {
			TimerKind::Poll => {
				if let Err(e) = self.check_code().await {
					tracing::warn!(error = %e, "Scheduled code check failed");
				}
			},
			TimerKind::Deadline => {
				self.disarm(TimerKind::Deadline);
				if matches!(self.state, OrderState::AwaitingCode { .. }) {
					tracing::info!(waited = ?self.timings.deadline, "No code before the deadline");
					self.presenter.show_notice(&Notice::Timeout {
						waited: self.timings.deadline,
					});
					self.clear().await;
				}
			},
			TimerKind::Grace => {
				self.disarm(TimerKind::Grace);
				if let OrderState::Resolved { otp, .. } = &self.state {
					let notice = Notice::Success { otp: otp.clone() };
					self.presenter.show_notice(&notice);
					self.clear().await;
				}
			},
		}
	}

	/// Checks for the code once, outside the poll schedule.
	///
	/// Unlike scheduled checks, a failure here is reported to the user.
	pub async fn refresh_code(&mut self) -> Result<(), ControllerError> {
		if !matches!(self.state, OrderState::AwaitingCode { .. }) {
			tracing::debug!(state = %self.state.kind(), "No code to refresh");
			return Ok(());
		}

		match self.check_code().await {
			Ok(()) => Ok(()),
			Err(e) => {
				tracing::warn!(error = %e, "Manual code check failed");
				let notice = match &e {
					ControllerError::Api(api) => failure_notice(api, CHECK_FAILED_MESSAGE),
					_ => Notice::error(CHECK_FAILED_MESSAGE),
				};
				self.presenter.show_notice(&notice);
				Err(e)
			},
		}
	}

	/// Asks the backend to cancel the active order and refund it.
	pub async fn cancel(&mut self) -> Result<CancelOutcome, ControllerError> {
		let order_id = match &self.state {
			OrderState::Idle => {
				tracing::debug!("Nothing to cancel");
				return Ok(CancelOutcome::NoOrder);
			},
			OrderState::Resolved { order, .. } => {
				tracing::warn!(
					order_id = %truncate_id(&order.order_id),
					"Cancel rejected, code already delivered"
				);
				self.presenter
					.show_notice(&Notice::error(ALREADY_DELIVERED_MESSAGE));
				return Err(ControllerError::AlreadyResolved);
			},
			OrderState::AwaitingCode { order } => order.order_id.clone(),
		};

		match self.api.cancel(&order_id).await {
			Ok(true) => {
				tracing::info!(order_id = %truncate_id(&order_id), "Order cancelled");
				self.clear().await;
				self.presenter.show_notice(&Notice::Cancelled);
				let _ = self.refresh_account().await;
				Ok(CancelOutcome::Cancelled)
			},
			Ok(false) => {
				tracing::warn!(order_id = %truncate_id(&order_id), "Backend refused to cancel order");
				Ok(CancelOutcome::Refused)
			},
			Err(e) => {
				tracing::error!(order_id = %truncate_id(&order_id), error = %e, "Cancel failed");
				self.presenter
					.show_notice(&failure_notice(&e, CANCEL_FAILED_MESSAGE));
				Err(e.into())
			},
		}
	}

	/// Drops the current order: disarms every timer, removes the stored
	/// record and hides the order. Safe to call in any state, any number of
	/// times.
	pub async fn clear(&mut self) {
		for kind in TimerKind::all() {
			self.disarm(kind);
		}
		if let Err(e) = self.storage.remove(StorageKey::CurrentOrder).await {
			tracing::warn!(error = %e, "Failed to remove stored order");
		}
		self.presenter.hide_order();

		let previous = std::mem::take(&mut self.state);
		if let Some(order) = previous.order() {
			tracing::debug!(
				order_id = %truncate_id(&order.order_id),
				from = %previous.kind(),
				"Order cleared"
			);
		}
	}

	/// Disarms every timer but keeps the order and its stored record, so the
	/// next process can resume it.
	pub fn suspend(&mut self) {
		for kind in TimerKind::all() {
			self.disarm(kind);
		}
	}

	/// Reloads balance and purchase history.
	///
	/// Any failure marks the balance as unavailable.
	pub async fn refresh_account(&self) -> Result<(), ControllerError> {
		let balance = match self.api.balance().await {
			Ok(balance) => balance,
			Err(e) => {
				tracing::error!(error = %e, "Failed to load balance");
				self.presenter.show_balance_error();
				return Err(e.into());
			},
		};
		self.presenter.show_balance(&balance);

		match self.api.history().await {
			Ok(history) => {
				self.presenter.show_history(&history);
				Ok(())
			},
			Err(e) => {
				tracing::error!(error = %e, "Failed to load history");
				self.presenter.show_balance_error();
				Err(e.into())
			},
		}
	}

	/// Shows the order, arms polling and the deadline, then checks once
	/// right away.
	async fn begin(&mut self, order: Order) -> Result<(), ControllerError> {
		self.presenter.show_order(&order);
		self.transition(OrderState::AwaitingCode { order })?;
		self.arm_repeating(TimerKind::Poll, self.timings.poll_interval);
		self.arm_once(TimerKind::Deadline, self.timings.deadline);

		if let Err(e) = self.check_code().await {
			tracing::warn!(error = %e, "Initial code check failed");
		}
		Ok(())
	}

	async fn check_code(&mut self) -> Result<(), ControllerError> {
		let order_id = match &self.state {
			OrderState::AwaitingCode { order } => order.order_id.clone(),
			_ => return Ok(()),
		};

		match self.api.check(&order_id).await? {
			Some(otp) => self.resolve(otp).await,
			None => Ok(()),
		}
	}

	/// Moves an awaited order to resolved. Poll and deadline are disarmed
	/// before anything else so neither can run again for this order.
	async fn resolve(&mut self, otp: String) -> Result<(), ControllerError> {
		let OrderState::AwaitingCode { order } = &self.state else {
			return Ok(());
		};
		let mut order = order.clone();
		order.otp = Some(otp.clone());

		self.disarm(TimerKind::Poll);
		self.disarm(TimerKind::Deadline);

		tracing::info!(order_id = %truncate_id(&order.order_id), "Code received");
		self.presenter.show_code(&otp);
		if let Err(e) = self.storage.store(StorageKey::CurrentOrder, &order).await {
			tracing::warn!(error = %e, "Failed to persist delivered code");
		}

		self.transition(OrderState::Resolved { order, otp })?;
		self.arm_once(TimerKind::Grace, self.timings.grace_period);
		Ok(())
	}

	fn transition(&mut self, next: OrderState) -> Result<(), ControllerError> {
		let (from, to) = (self.state.kind(), next.kind());
		if !is_valid_transition(from, to) {
			return Err(ControllerError::InvalidTransition { from, to });
		}
		tracing::debug!(%from, %to, "Order state transition");
		self.state = next;
		Ok(())
	}

	fn arm_once(&mut self, kind: TimerKind, delay: Duration) {
		self.disarm(kind);
		let id = self.scheduler.schedule_once(kind, delay);
		*self.timers.slot(kind) = Some(id);
	}

	fn arm_repeating(&mut self, kind: TimerKind, period: Duration) {
		self.disarm(kind);
		let id = self.scheduler.schedule_repeating(kind, period);
		*self.timers.slot(kind) = Some(id);
	}

	fn disarm(&mut self, kind: TimerKind) {
		if let Some(id) = self.timers.slot(kind).take() {
			self.scheduler.cancel(id);
		}
	}
}

fn failure_notice(error: &ApiError, fallback: &str) -> Notice {
	if error.is_user_facing() {
		Notice::error(error.to_string())
	} else {
		Notice::error(fallback)
	}
}
