//! Startup and shutdown of the engine.

use super::{EngineError, OtpEngine};

impl OtpEngine {
	/// Loads account data and resumes any order left by a previous run.
	pub async fn initialize(&mut self) -> Result<(), EngineError> {
		tracing::info!(client = %self.config.client.id, "Initializing OTP client");

		if let Err(e) = self.controller.refresh_account().await {
			tracing::warn!(error = %e, "Starting without account data");
		}
		self.controller.recover().await?;

		Ok(())
	}

	/// Stops all timers. An active order stays stored so the next run
	/// resumes it.
	pub async fn shutdown(&mut self) -> Result<(), EngineError> {
		tracing::info!("Shutting down OTP client");

		self.controller.suspend();
		if let Some(order) = self.controller.state().order() {
			tracing::info!(
				order_id = %otp_types::truncate_id(&order.order_id),
				"Order left pending, it will resume on next start"
			);
		}

		Ok(())
	}
}
