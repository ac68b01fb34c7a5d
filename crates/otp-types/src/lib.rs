//! Common types for the OTP number-rental client.
//!
//! This crate holds the data shared by every other crate in the workspace:
//! the order record and its lifecycle state, the wire types of the remote
//! HTTP API, user-facing notices, storage keys and the configuration
//! validation framework used by pluggable implementations.

/// Wire types of the remote HTTP API.
pub mod api;
/// User-facing notices raised by the order lifecycle.
pub mod notice;
/// The order record and its lifecycle state.
pub mod order;
/// Self-registration of pluggable implementations.
pub mod registry;
/// Keys of the durable local records.
pub mod storage;
/// Formatting and time helpers.
pub mod utils;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

pub use api::*;
pub use notice::*;
pub use order::*;
pub use registry::*;
pub use storage::*;
pub use utils::{current_timestamp, format_balance, format_history_date, truncate_id};
pub use validation::*;
