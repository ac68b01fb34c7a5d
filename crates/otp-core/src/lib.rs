//! Order lifecycle engine for the OTP number-rental client.
//!
//! [`OrderController`] owns the single current order and moves it through
//! purchase, polling, resolution, timeout and cancellation. Timers come from
//! an injectable [`Scheduler`] and all rendering goes through a
//! [`Presenter`], so the lifecycle can be driven in virtual time by tests and
//! rendered by any host. [`OtpEngine`] is the single-task loop feeding timer
//! firings and user commands into the controller, and [`OtpBuilder`]
//! assembles one from configuration.

pub mod builder;
pub mod controller;
pub mod engine;
pub mod presenter;
pub mod scheduler;
mod state;

pub use builder::{BuilderError, OtpBuilder, OtpFactories};
pub use controller::{CancelOutcome, ControllerError, LifecycleTimings, OrderController};
pub use engine::{Command, EngineError, OtpEngine, RunMode};
pub use presenter::{Presenter, PresenterEvent, RecordingPresenter};
pub use scheduler::{ManualScheduler, Scheduler, TimerEvent, TimerId, TimerKind, TokioScheduler};
