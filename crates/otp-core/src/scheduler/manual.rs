//! Virtual-time scheduler.
//!
//! Nothing fires on its own. The owner advances the clock with
//! [`ManualScheduler::fire_next`] and hands each returned event to the
//! controller, which keeps timer-driven tests deterministic.

use super::{Scheduler, TimerEvent, TimerId, TimerKind};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug)]
struct PendingTimer {
	kind: TimerKind,
	due: Duration,
	period: Option<Duration>,
}

#[derive(Debug, Default)]
struct Clock {
	now: Duration,
	next_id: u64,
	timers: BTreeMap<TimerId, PendingTimer>,
}

/// Scheduler driven by an explicit virtual clock starting at zero.
#[derive(Debug, Default)]
pub struct ManualScheduler {
	clock: Mutex<Clock>,
}

impl ManualScheduler {
	pub fn new() -> Self {
		Self::default()
	}

	fn clock(&self) -> MutexGuard<'_, Clock> {
		self.clock.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Current virtual time.
	pub fn now(&self) -> Duration {
		self.clock().now
	}

	/// Moves the clock forward without firing anything. Never moves it back.
	pub fn set_now(&self, now: Duration) {
		let mut clock = self.clock();
		clock.now = clock.now.max(now);
	}

	/// Kinds of the currently armed timers, in arming order.
	pub fn armed(&self) -> Vec<TimerKind> {
		self.clock().timers.values().map(|timer| timer.kind).collect()
	}

	pub fn is_armed(&self, kind: TimerKind) -> bool {
		self.clock().timers.values().any(|timer| timer.kind == kind)
	}

	/// Pops the earliest timer due no later than `until` and advances the
	/// clock to its due time. Repeating timers are queued again one period
	/// later. Ties fire in arming order.
	pub fn fire_next(&self, until: Duration) -> Option<TimerEvent> {
		let mut clock = self.clock();
		let (id, due) = clock
			.timers
			.iter()
			.filter(|(_, timer)| timer.due <= until)
			.min_by_key(|(id, timer)| (timer.due, **id))
			.map(|(id, timer)| (*id, timer.due))?;

		clock.now = clock.now.max(due);
		let timer = clock.timers.remove(&id)?;
		let kind = timer.kind;
		if let Some(period) = timer.period {
			clock.timers.insert(
				id,
				PendingTimer {
					due: due + period,
					..timer
				},
			);
		}
		Some(TimerEvent { id, kind })
	}

	fn arm(&self, kind: TimerKind, delay: Duration, period: Option<Duration>) -> TimerId {
		let mut clock = self.clock();
		clock.next_id += 1;
		let id = TimerId::new(clock.next_id);
		let due = clock.now + delay;
		clock.timers.insert(id, PendingTimer { kind, due, period });
		id
	}
}

impl Scheduler for ManualScheduler {
	fn schedule_once(&self, kind: TimerKind, delay: Duration) -> TimerId {
		self.arm(kind, delay, None)
	}

	fn schedule_repeating(&self, kind: TimerKind, period: Duration) -> TimerId {
		self.arm(kind, period, Some(period))
	}

	fn cancel(&self, id: TimerId) {
		self.clock().timers.remove(&id);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const fn secs(s: u64) -> Duration {
		Duration::from_secs(s)
	}

	#[test]
	fn test_fires_in_due_order_and_requeues_repeaters() {
		let scheduler = ManualScheduler::new();
		let poll = scheduler.schedule_repeating(TimerKind::Poll, secs(10));
		let deadline = scheduler.schedule_once(TimerKind::Deadline, secs(25));

		let fired: Vec<_> = std::iter::from_fn(|| scheduler.fire_next(secs(30)))
			.map(|event| (event.id, scheduler.now()))
			.collect();
		assert_eq!(
			fired,
			vec![
				(poll, secs(10)),
				(poll, secs(20)),
				(deadline, secs(25)),
				(poll, secs(30)),
			]
		);
		assert_eq!(scheduler.armed(), vec![TimerKind::Poll]);
	}

	#[test]
	fn test_nothing_due_leaves_clock_alone() {
		let scheduler = ManualScheduler::new();
		scheduler.schedule_once(TimerKind::Grace, secs(2));

		assert_eq!(scheduler.fire_next(secs(1)), None);
		assert_eq!(scheduler.now(), Duration::ZERO);
		assert!(scheduler.is_armed(TimerKind::Grace));
	}

	#[test]
	fn test_cancelled_timer_never_fires() {
		let scheduler = ManualScheduler::new();
		let poll = scheduler.schedule_repeating(TimerKind::Poll, secs(10));
		scheduler.cancel(poll);
		scheduler.cancel(poll);

		assert_eq!(scheduler.fire_next(secs(3600)), None);
		assert!(scheduler.armed().is_empty());
	}

	#[test]
	fn test_delays_count_from_current_time() {
		let scheduler = ManualScheduler::new();
		scheduler.set_now(secs(100));
		scheduler.set_now(secs(50));
		let grace = scheduler.schedule_once(TimerKind::Grace, secs(2));

		assert_eq!(scheduler.fire_next(secs(101)), None);
		assert_eq!(
			scheduler.fire_next(secs(102)),
			Some(TimerEvent {
				id: grace,
				kind: TimerKind::Grace
			})
		);
	}
}
