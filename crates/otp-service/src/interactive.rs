//! Line-based command input for `otp run`.

use otp_core::Command;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const HELP: &str = "Commands: buy <country> <service> | cancel | refresh | account | clear | quit";

/// Parses one input line. Blank lines yield `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<Command>, String> {
	let mut words = line.split_whitespace();
	let Some(verb) = words.next() else {
		return Ok(None);
	};

	let command = match verb.to_ascii_lowercase().as_str() {
		"buy" => match (words.next(), words.next()) {
			(Some(country), Some(service)) => Command::Buy {
				country: country.to_string(),
				service: service.to_string(),
			},
			_ => return Err("usage: buy <country> <service>".to_string()),
		},
		"cancel" => Command::Cancel,
		"refresh" => Command::RefreshCode,
		"account" => Command::RefreshAccount,
		"clear" => Command::Clear,
		"quit" | "exit" => Command::Shutdown,
		other => return Err(format!("unknown command '{}'. {}", other, HELP)),
	};

	if words.next().is_some() {
		return Err(format!("too many arguments for '{}'", verb));
	}
	Ok(Some(command))
}

/// Forwards commands read from `input` to the engine. End of input is
/// treated as `quit`.
pub fn spawn_reader<R>(input: R, commands: mpsc::UnboundedSender<Command>) -> JoinHandle<()>
where
	R: AsyncRead + Unpin + Send + 'static,
{
	tokio::spawn(async move {
		let mut lines = BufReader::new(input).lines();
		loop {
			match lines.next_line().await {
				Ok(Some(line)) => match parse_line(&line) {
					Ok(Some(command)) => {
						if commands.send(command).is_err() {
							return;
						}
					},
					Ok(None) => {},
					Err(message) => println!("{}", message),
				},
				Ok(None) => break,
				Err(e) => {
					tracing::warn!(error = %e, "Failed to read input");
					break;
				},
			}
		}
		let _ = commands.send(Command::Shutdown);
	})
}
