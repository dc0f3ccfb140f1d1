//! The framepace host application
//!
//! Runs the demo device on top of a `RuntimeHandle`, echoing framed lines to
//! stdout and turning stdin commands into button presses and kicks.

use std::sync::Arc;
use std::time::Duration;

use framepace_core::{ModeId, StatsSnapshot};
use framepace_runtime::{LineSink, RuntimeBuilder, RuntimeHandle};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::{CliError, Result};

/// Prints each line on stdout
#[derive(Debug, Default)]
pub struct StdoutLineSink;

impl LineSink for StdoutLineSink {
    fn write_line(&self, line: &str) {
        println!("{}", line);
    }
}

// ----------------------------------------------------------------------------
// Console Commands
// ----------------------------------------------------------------------------

/// A command typed on stdin while the device runs
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConsoleCommand {
    /// The state button
    ModeButton,
    Kick { dvx: f32, dvy: f32 },
    Activate(ModeId),
    Stats,
    Quit,
}

impl ConsoleCommand {
    /// Parse one input line. Empty lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let mut words = line.split_whitespace();
        let Some(word) = words.next() else {
            return Ok(None);
        };

        let command = match word {
            "m" | "mode" => ConsoleCommand::ModeButton,
            "k" | "kick" => {
                let mut component = || -> Result<f32> {
                    let text = words
                        .next()
                        .ok_or_else(|| CliError::InvalidInput("usage: kick <dvx> <dvy>".into()))?;
                    text.parse::<f32>()
                        .ok()
                        .filter(|value| value.is_finite())
                        .ok_or_else(|| CliError::InvalidInput(format!("not a number: {}", text)))
                };
                let dvx = component()?;
                let dvy = component()?;
                ConsoleCommand::Kick { dvx, dvy }
            }
            "idle" => ConsoleCommand::Activate(ModeId::IDLE_DISPLAY),
            "sim" | "simulation" => ConsoleCommand::Activate(ModeId::SIMULATION),
            "s" | "stats" => ConsoleCommand::Stats,
            "q" | "quit" | "exit" => ConsoleCommand::Quit,
            other => return Err(CliError::InvalidInput(format!("unknown command: {}", other))),
        };
        Ok(Some(command))
    }
}

// ----------------------------------------------------------------------------
// Application
// ----------------------------------------------------------------------------

pub struct FramepaceApp {
    runtime: RuntimeHandle,
}

impl FramepaceApp {
    /// Build and start the runtime described by `config`
    pub async fn start(config: &AppConfig) -> Result<Self> {
        let mut builder = RuntimeBuilder::new(config.scheduler.clone())
            .with_console(Arc::new(StdoutLineSink))
            .shutdown_grace(config.app.shutdown_grace());
        if let Some(mode) = config.app.initial_mode {
            builder = builder.initial_mode(mode.mode_id());
        }

        let runtime = builder.build_and_start().await?;
        Ok(Self { runtime })
    }

    pub fn runtime(&self) -> &RuntimeHandle {
        &self.runtime
    }

    /// Run until `quit`, Ctrl-C, end of input or the optional deadline
    pub async fn run(&mut self, duration: Option<Duration>) -> Result<()> {
        let deadline = async {
            match duration {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline);

        let mut stdin = BufReader::new(tokio::io::stdin()).lines();
        let mut stdin_open = true;

        loop {
            tokio::select! {
                _ = &mut deadline => {
                    info!("Run duration elapsed");
                    break;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted");
                    break;
                }
                line = stdin.next_line(), if stdin_open => {
                    match line? {
                        Some(line) => match ConsoleCommand::parse(&line) {
                            Ok(Some(ConsoleCommand::Quit)) => break,
                            Ok(Some(command)) => self.apply(command).await,
                            Ok(None) => {}
                            Err(e) => warn!("{}", e),
                        },
                        None => {
                            // Keep running on a closed stdin when a deadline is set
                            if duration.is_none() {
                                break;
                            }
                            stdin_open = false;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    async fn apply(&self, command: ConsoleCommand) {
        let result = match command {
            ConsoleCommand::ModeButton => self.send_input(|input| input.press_mode()),
            ConsoleCommand::Kick { dvx, dvy } => self.send_input(|input| input.kick(dvx, dvy)),
            ConsoleCommand::Activate(mode) => self.runtime.activate(mode).await.map(|_| ()),
            ConsoleCommand::Stats => {
                info!("{:?}", self.runtime.stats());
                Ok(())
            }
            ConsoleCommand::Quit => Ok(()),
        };
        if let Err(e) = result {
            warn!("Command failed: {}", e);
        }
    }

    fn send_input<F>(&self, send: F) -> framepace_core::FramepaceResult<()>
    where
        F: FnOnce(&framepace_runtime::InputSender) -> framepace_core::FramepaceResult<()>,
    {
        match self.runtime.input() {
            Some(input) => send(&input),
            None => Ok(()),
        }
    }

    /// Stop the device and return its final counters
    pub async fn shutdown(mut self) -> StatsSnapshot {
        self.runtime.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_console_commands() {
        assert_eq!(ConsoleCommand::parse("  ").unwrap(), None);
        assert_eq!(
            ConsoleCommand::parse("m").unwrap(),
            Some(ConsoleCommand::ModeButton)
        );
        assert_eq!(
            ConsoleCommand::parse("kick 12.5 -3").unwrap(),
            Some(ConsoleCommand::Kick {
                dvx: 12.5,
                dvy: -3.0
            })
        );
        assert_eq!(
            ConsoleCommand::parse("sim").unwrap(),
            Some(ConsoleCommand::Activate(ModeId::SIMULATION))
        );
        assert_eq!(ConsoleCommand::parse("q").unwrap(), Some(ConsoleCommand::Quit));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(matches!(
            ConsoleCommand::parse("kick 1"),
            Err(CliError::InvalidInput(_))
        ));
        assert!(matches!(
            ConsoleCommand::parse("k x 1"),
            Err(CliError::InvalidInput(_))
        ));
        assert!(matches!(
            ConsoleCommand::parse("jump"),
            Err(CliError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_parse_rejects_non_finite_kicks() {
        for line in ["kick inf 0", "kick nan 0", "k 1 -inf", "k 1e39 0"] {
            assert!(
                matches!(ConsoleCommand::parse(line), Err(CliError::InvalidInput(_))),
                "{} accepted",
                line
            );
        }
    }

    #[tokio::test]
    async fn test_app_starts_in_configured_mode() {
        let mut config = AppConfig::default();
        config.scheduler = framepace_core::SchedulerConfig::testing();
        config.app.initial_mode = Some(crate::cli::StartMode::Simulation);
        config.app.shutdown_grace_ms = 500;

        let app = FramepaceApp::start(&config).await.unwrap();
        assert!(app.runtime().ball().get().is_some());
        let stats = app.shutdown().await;
        assert_eq!(stats.mode_transitions, 1);
    }
}
