//! Formatting and time helpers shared across the workspace.

pub mod formatting;
pub mod helpers;

pub use formatting::{format_balance, format_history_date, truncate_id};
pub use helpers::current_timestamp;
