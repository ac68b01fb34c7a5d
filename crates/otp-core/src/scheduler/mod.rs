//! Injectable timers for the order lifecycle.
//!
//! The controller never sleeps itself. It asks a [`Scheduler`] for one-shot
//! and repeating timers and receives their firings as [`TimerEvent`]s on the
//! task that owns it. Production code uses [`TokioScheduler`]; tests drive
//! virtual time through [`ManualScheduler`].

use std::fmt;
use std::time::Duration;

pub mod manual;
pub mod runtime;

pub use manual::ManualScheduler;
pub use runtime::TokioScheduler;

/// Handle of an armed timer.
///
/// Handles are never reused within one scheduler, so a stale firing can be
/// told apart from the timer currently armed for the same role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
	pub fn new(id: u64) -> Self {
		Self(id)
	}
}

impl fmt::Display for TimerId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "timer-{}", self.0)
	}
}

/// Role a timer plays in the order lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
	/// Repeating status check while a code is awaited.
	Poll,
	/// One-shot maximum wait before the order is given up.
	Deadline,
	/// One-shot delay keeping a delivered code on screen.
	Grace,
}

impl TimerKind {
	pub fn all() -> [TimerKind; 3] {
		[TimerKind::Poll, TimerKind::Deadline, TimerKind::Grace]
	}
}

impl fmt::Display for TimerKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			TimerKind::Poll => write!(f, "poll"),
			TimerKind::Deadline => write!(f, "deadline"),
			TimerKind::Grace => write!(f, "grace"),
		}
	}
}

/// A timer firing delivered to the controller's task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerEvent {
	pub id: TimerId,
	pub kind: TimerKind,
}

/// Source of one-shot and repeating timers.
pub trait Scheduler: Send + Sync {
	/// Arms a timer that fires once after `delay`.
	fn schedule_once(&self, kind: TimerKind, delay: Duration) -> TimerId;

	/// Arms a timer that fires every `period`, first after one full period.
	fn schedule_repeating(&self, kind: TimerKind, period: Duration) -> TimerId;

	/// Disarms a timer. Cancelling an unknown or already fired timer is a no-op.
	fn cancel(&self, id: TimerId);
}
