//! Allowed order state transitions.

use once_cell::sync::Lazy;
use otp_types::OrderStateKind;
use std::collections::{HashMap, HashSet};

// Static transition table - each state maps to allowed next states.
// Clearing to idle is always allowed and does not go through this table.
static TRANSITIONS: Lazy<HashMap<OrderStateKind, HashSet<OrderStateKind>>> = Lazy::new(|| {
	let mut m = HashMap::new();
	m.insert(
		OrderStateKind::Idle,
		HashSet::from([OrderStateKind::AwaitingCode, OrderStateKind::Resolved]),
	);
	m.insert(
		OrderStateKind::AwaitingCode,
		HashSet::from([OrderStateKind::Resolved, OrderStateKind::Idle]),
	);
	m.insert(OrderStateKind::Resolved, HashSet::from([OrderStateKind::Idle]));
	m
});

/// Checks whether the lifecycle may move from `from` to `to`.
///
/// `Idle -> Resolved` exists only for resuming a stored order whose code
/// had already arrived.
pub fn is_valid_transition(from: OrderStateKind, to: OrderStateKind) -> bool {
	TRANSITIONS
		.get(&from)
		.is_some_and(|allowed| allowed.contains(&to))
}

#[cfg(test)]
mod tests {
	use super::*;
	use OrderStateKind::*;

	#[test]
	fn test_lifecycle_transitions() {
		assert!(is_valid_transition(Idle, AwaitingCode));
		assert!(is_valid_transition(AwaitingCode, Resolved));
		assert!(is_valid_transition(AwaitingCode, Idle));
		assert!(is_valid_transition(Resolved, Idle));
	}

	#[test]
	fn test_rejected_transitions() {
		assert!(!is_valid_transition(Resolved, AwaitingCode));
		assert!(!is_valid_transition(AwaitingCode, AwaitingCode));
		assert!(!is_valid_transition(Resolved, Resolved));
	}
}
