//! Main entry point for the OTP client.
//!
//! Buys virtual phone numbers, waits for their one-time codes and shows them
//! in the terminal. Storage and backend implementations are chosen in the
//! configuration file.

use clap::{Parser, Subcommand};
use otp_config::Config;
use otp_core::{Command, OtpEngine, RunMode};
use otp_types::OrderStateKind;
use std::path::PathBuf;
use std::sync::Arc;

mod console;
mod factory_registry;
mod interactive;

use console::ConsolePresenter;

/// Command-line arguments for the OTP client.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml", env = "OTP_CONFIG")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,

	#[command(subcommand)]
	mode: Mode,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Mode {
	/// Buy a number and wait until its code arrives or the order times out
	Buy {
		#[arg(long)]
		country: String,
		#[arg(long)]
		service: String,
	},
	/// Resume the stored order, if any, and wait for it to finish
	Watch,
	/// Cancel the stored order and get a refund
	Cancel,
	/// Show the account balance
	Balance,
	/// Show the balance and purchase history
	History,
	/// Read commands from stdin until `quit`
	Run,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	let default_directive = args.log_level.to_string();
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

	// Logs go to stderr; stdout is for the presenter.
	fmt()
		.with_env_filter(env_filter)
		.with_writer(std::io::stderr)
		.with_target(true)
		.init();

	let config = Config::from_file(&args.config).await?;
	tracing::info!("Loaded configuration [{}]", config.client.id);

	let presenter = ConsolePresenter::stdout().with_history(args.mode != Mode::Balance);
	let mut engine = factory_registry::build_engine_from_config(config, Arc::new(presenter))?;

	let result = run(&mut engine, args.mode).await;
	engine.shutdown().await?;
	result
}

async fn run(engine: &mut OtpEngine, mode: Mode) -> Result<(), Box<dyn std::error::Error>> {
	match mode {
		Mode::Buy { country, service } => {
			engine.initialize().await?;
			engine.execute(Command::Buy { country, service }).await?;
			engine.run(RunMode::UntilIdle).await?;
		},
		Mode::Watch => {
			engine.initialize().await?;
			if engine.controller().state().is_idle() {
				println!("No pending order.");
			}
			engine.run(RunMode::UntilIdle).await?;
		},
		Mode::Cancel => {
			engine.initialize().await?;
			match engine.controller().state().kind() {
				OrderStateKind::Idle => println!("No pending order."),
				// The code arrived on the recovery check; finish the order here.
				OrderStateKind::Resolved => {
					println!("Code already delivered, not cancelling.");
					engine.run(RunMode::UntilIdle).await?;
				},
				OrderStateKind::AwaitingCode => engine.execute(Command::Cancel).await?,
			}
		},
		Mode::Balance | Mode::History => {
			engine.execute(Command::RefreshAccount).await?;
		},
		Mode::Run => {
			engine.initialize().await?;
			println!("{}", interactive::HELP);
			let reader = interactive::spawn_reader(tokio::io::stdin(), engine.commands());
			engine.run(RunMode::Forever).await?;
			reader.abort();
		},
	}
	Ok(())
}
