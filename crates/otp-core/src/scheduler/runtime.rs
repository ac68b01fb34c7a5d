//! Scheduler backed by the tokio timer wheel.

use super::{Scheduler, TimerEvent, TimerId, TimerKind};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Runs every timer as its own task and sends firings into a channel.
///
/// Must be used from within a tokio runtime.
pub struct TokioScheduler {
	events: mpsc::UnboundedSender<TimerEvent>,
	next_id: AtomicU64,
	tasks: Mutex<HashMap<TimerId, JoinHandle<()>>>,
}

impl TokioScheduler {
	/// Creates the scheduler together with the receiving end of its firings.
	pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerEvent>) {
		let (events, receiver) = mpsc::unbounded_channel();
		let scheduler = Self {
			events,
			next_id: AtomicU64::new(1),
			tasks: Mutex::new(HashMap::new()),
		};
		(scheduler, receiver)
	}

	fn next_id(&self) -> TimerId {
		TimerId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
	}

	fn track(&self, id: TimerId, handle: JoinHandle<()>) {
		let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
		tasks.retain(|_, task| !task.is_finished());
		tasks.insert(id, handle);
	}

	/// Number of timers whose task is still running.
	pub fn active(&self) -> usize {
		let tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
		tasks.values().filter(|task| !task.is_finished()).count()
	}
}

impl Scheduler for TokioScheduler {
	fn schedule_once(&self, kind: TimerKind, delay: Duration) -> TimerId {
		let id = self.next_id();
		let events = self.events.clone();
		let handle = tokio::spawn(async move {
			time::sleep(delay).await;
			let _ = events.send(TimerEvent { id, kind });
		});
		self.track(id, handle);
		tracing::trace!(%id, %kind, ?delay, "Armed one-shot timer");
		id
	}

	fn schedule_repeating(&self, kind: TimerKind, period: Duration) -> TimerId {
		let id = self.next_id();
		let events = self.events.clone();
		let handle = tokio::spawn(async move {
			let mut interval = time::interval_at(Instant::now() + period, period);
			interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
			loop {
				interval.tick().await;
				if events.send(TimerEvent { id, kind }).is_err() {
					break;
				}
			}
		});
		self.track(id, handle);
		tracing::trace!(%id, %kind, ?period, "Armed repeating timer");
		id
	}

	fn cancel(&self, id: TimerId) {
		let handle = self
			.tasks
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.remove(&id);
		if let Some(handle) = handle {
			handle.abort();
			tracing::trace!(%id, "Cancelled timer");
		}
	}
}

impl Drop for TokioScheduler {
	fn drop(&mut self) {
		let tasks = self.tasks.get_mut().unwrap_or_else(PoisonError::into_inner);
		for (_, handle) in tasks.drain() {
			handle.abort();
		}
	}
}
