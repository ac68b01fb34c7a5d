//! Event loop driving the order controller.
//!
//! The engine owns the [`OrderController`] and is the only task that touches
//! it. Timer firings and user [`Command`]s arrive on channels and are handled
//! one at a time, so a timer callback can never interleave with a purchase or
//! cancel that is still waiting on the network.

pub mod lifecycle;

use crate::controller::{ControllerError, OrderController};
use crate::scheduler::TimerEvent;
use otp_config::Config;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Service error: {0}")]
	Service(String),
	#[error(transparent)]
	Controller(#[from] ControllerError),
}

/// A user action for the engine to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
	Buy { country: String, service: String },
	Cancel,
	/// Check for the code now instead of waiting for the next poll.
	RefreshCode,
	RefreshAccount,
	Clear,
	Shutdown,
}

/// When [`OtpEngine::run`] returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
	/// As soon as no order is active.
	UntilIdle,
	/// Only on [`Command::Shutdown`] or Ctrl-C.
	Forever,
}

/// Single-task driver for the order lifecycle.
pub struct OtpEngine {
	config: Config,
	controller: OrderController,
	timer_events: mpsc::UnboundedReceiver<TimerEvent>,
	commands: mpsc::UnboundedReceiver<Command>,
	command_sender: mpsc::UnboundedSender<Command>,
}

impl OtpEngine {
	/// Creates an engine around `controller`. `timer_events` must be the
	/// receiving end of the scheduler the controller was built with.
	pub fn new(
		config: Config,
		controller: OrderController,
		timer_events: mpsc::UnboundedReceiver<TimerEvent>,
	) -> Self {
		let (command_sender, commands) = mpsc::unbounded_channel();
		Self {
			config,
			controller,
			timer_events,
			commands,
			command_sender,
		}
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn controller(&self) -> &OrderController {
		&self.controller
	}

	/// Sender for feeding commands into a running engine.
	pub fn commands(&self) -> mpsc::UnboundedSender<Command> {
		self.command_sender.clone()
	}

	/// Performs one command right away.
	///
	/// [`Command::Shutdown`] only has an effect inside [`run`](Self::run).
	pub async fn execute(&mut self, command: Command) -> Result<(), ControllerError> {
		tracing::debug!(?command, "Executing command");
		match command {
			Command::Buy { country, service } => self.controller.purchase(&country, &service).await,
			Command::Cancel => self.controller.cancel().await.map(|_| ()),
			Command::RefreshCode => self.controller.refresh_code().await,
			Command::RefreshAccount => self.controller.refresh_account().await,
			Command::Clear => {
				self.controller.clear().await;
				Ok(())
			},
			Command::Shutdown => Ok(()),
		}
	}

	/// Processes timer firings and commands until `mode` says to stop.
	pub async fn run(&mut self, mode: RunMode) -> Result<(), EngineError> {
		tracing::info!(client = %self.config.client.id, ?mode, "Engine running");

		loop {
			if mode == RunMode::UntilIdle && self.controller.state().is_idle() {
				tracing::debug!("No active order, stopping");
				break;
			}

			tokio::select! {
				Some(event) = self.timer_events.recv() => {
					self.controller.on_timer(event).await;
				}

				Some(command) = self.commands.recv() => {
					if command == Command::Shutdown {
						tracing::info!("Shutdown requested");
						break;
					}
					if let Err(e) = self.execute(command).await {
						// The controller has already notified the user.
						tracing::debug!(error = %e, "Command failed");
					}
				}

				result = tokio::signal::ctrl_c() => {
					result.map_err(|e| EngineError::Service(format!("Failed to listen for Ctrl-C: {}", e)))?;
					tracing::info!("Interrupted");
					break;
				}

				else => break,
			}
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::controller::LifecycleTimings;
	use crate::presenter::RecordingPresenter;
	use crate::scheduler::TokioScheduler;
	use otp_api::implementations::scripted::{ScriptedApi, ScriptedApiConfig};
	use otp_api::ApiService;
	use otp_config::ConfigBuilder;
	use otp_storage::implementations::memory::MemoryStorage;
	use otp_storage::{StorageInterface, StorageService};
	use otp_types::{Notice, OrderStateKind, StorageKey};
	use std::sync::Arc;
	use std::time::Duration;
	use tokio::time::Instant;

	fn engine(api: ScriptedApiConfig, backend: MemoryStorage) -> (OtpEngine, Arc<RecordingPresenter>) {
		let config = ConfigBuilder::new().client_id("engine-test").build();
		let (scheduler, timer_events) = TokioScheduler::new();
		let presenter = Arc::new(RecordingPresenter::new());
		let controller = OrderController::new(
			Arc::new(ApiService::new(Box::new(ScriptedApi::new(api)))),
			Arc::new(StorageService::new(Box::new(backend))),
			Arc::new(scheduler),
			presenter.clone(),
			LifecycleTimings::from(&config.client),
		);
		(OtpEngine::new(config, controller, timer_events), presenter)
	}

	fn buy() -> Command {
		Command::Buy {
			country: "india".into(),
			service: "telegram".into(),
		}
	}

	fn silent() -> ScriptedApiConfig {
		ScriptedApiConfig {
			checks_before_code: None,
			..Default::default()
		}
	}

	#[tokio::test(start_paused = true)]
	async fn test_buy_runs_until_code_is_delivered_and_cleared() {
		let (mut engine, presenter) = engine(ScriptedApiConfig::default(), MemoryStorage::new());
		let start = Instant::now();

		engine.execute(buy()).await.unwrap();
		engine.run(RunMode::UntilIdle).await.unwrap();

		assert!(engine.controller().state().is_idle());
		assert_eq!(
			presenter.notices(),
			vec![Notice::Success {
				otp: "4821".into()
			}]
		);
		// Immediate check, two polls ten seconds apart, then the grace period.
		let elapsed = start.elapsed();
		assert!(elapsed >= Duration::from_secs(22), "{:?}", elapsed);
		assert!(elapsed < Duration::from_secs(23), "{:?}", elapsed);
	}

	#[tokio::test(start_paused = true)]
	async fn test_silent_order_times_out() {
		let (mut engine, presenter) = engine(silent(), MemoryStorage::new());
		let start = Instant::now();

		engine.execute(buy()).await.unwrap();
		engine.run(RunMode::UntilIdle).await.unwrap();

		assert!(start.elapsed() >= Duration::from_secs(15 * 60));
		assert_eq!(presenter.notices().len(), 1);
		assert!(matches!(presenter.notices()[0], Notice::Timeout { .. }));
	}

	#[tokio::test(start_paused = true)]
	async fn test_commands_are_processed_until_shutdown() {
		let (mut engine, presenter) = engine(silent(), MemoryStorage::new());
		let commands = engine.commands();
		commands.send(buy()).unwrap();
		commands.send(Command::Cancel).unwrap();
		commands.send(Command::RefreshAccount).unwrap();
		commands.send(Command::Shutdown).unwrap();

		engine.run(RunMode::Forever).await.unwrap();

		assert!(engine.controller().state().is_idle());
		assert!(presenter.notices().contains(&Notice::Cancelled));
	}

	#[tokio::test(start_paused = true)]
	async fn test_initialize_finishes_a_delivered_order() {
		let backend = MemoryStorage::new();
		backend
			.set_bytes(
				StorageKey::CurrentOrder.as_str(),
				br#"{"orderId":"scripted-9","phone":"+15550000009","otp":"1234"}"#.to_vec(),
			)
			.await
			.unwrap();
		let (mut engine, presenter) = engine(ScriptedApiConfig::default(), backend.clone());

		engine.initialize().await.unwrap();
		assert_eq!(engine.controller().state().kind(), OrderStateKind::Resolved);

		engine.run(RunMode::UntilIdle).await.unwrap();
		assert_eq!(
			presenter.notices(),
			vec![Notice::Success {
				otp: "1234".into()
			}]
		);
		assert!(!backend
			.exists(StorageKey::CurrentOrder.as_str())
			.await
			.unwrap());
	}

	#[tokio::test(start_paused = true)]
	async fn test_shutdown_leaves_order_for_next_run() {
		let backend = MemoryStorage::new();
		let (mut engine, _presenter) = engine(silent(), backend.clone());

		engine.execute(buy()).await.unwrap();
		engine.shutdown().await.unwrap();

		assert_eq!(
			engine.controller().state().kind(),
			OrderStateKind::AwaitingCode
		);
		assert!(backend
			.exists(StorageKey::CurrentOrder.as_str())
			.await
			.unwrap());
	}
}
