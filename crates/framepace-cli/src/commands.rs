//! Command handlers for the framepace CLI

use std::time::Duration;

use tracing::info;

use crate::app::FramepaceApp;
use crate::cli::{Cli, Commands};
use crate::config::AppConfig;
use crate::error::Result;

/// Command dispatcher for handling CLI commands
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Execute a CLI command against the loaded configuration
    pub async fn execute(cli: Cli, mut config: AppConfig) -> Result<()> {
        match cli.command {
            Commands::Run {
                mode,
                duration,
                refresh_hz,
                json,
            } => {
                if let Some(mode) = mode {
                    config.app.initial_mode = Some(mode);
                }
                if let Some(refresh_hz) = refresh_hz {
                    config.scheduler.timing.refresh_hz = refresh_hz;
                }
                if json {
                    config.app.print_stats = true;
                }
                config.validate()?;
                Self::handle_run_command(config, duration.map(Duration::from_secs), json).await
            }
            Commands::Check => Self::handle_check_command(&config),
            Commands::Config => Self::handle_config_command(&config),
        }
    }

    async fn handle_run_command(
        config: AppConfig,
        duration: Option<Duration>,
        json: bool,
    ) -> Result<()> {
        info!("Starting framepace device");
        println!("Commands: m (mode button), kick <dvx> <dvy>, idle, sim, stats, quit");

        let mut app = FramepaceApp::start(&config).await?;
        let outcome = app.run(duration).await;
        let stats = app.shutdown().await;

        if config.app.print_stats {
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("Frames rendered:     {}", stats.frames_rendered);
                println!("Simulation steps:    {}", stats.simulation_steps);
                println!("Deadlines missed:    {}", stats.deadlines_missed);
                println!("Lines framed:        {}", stats.lines_framed);
                println!("Framer overflows:    {}", stats.framer_overflows);
                println!("Collisions:          {}", stats.collisions);
                println!("Heartbeats:          {}", stats.heartbeats);
                println!("Mode transitions:    {}", stats.mode_transitions);
            }
        }
        outcome
    }

    fn handle_check_command(config: &AppConfig) -> Result<()> {
        config.validate()?;
        println!("Configuration OK");
        Ok(())
    }

    fn handle_config_command(config: &AppConfig) -> Result<()> {
        print!("{}", config.to_toml()?);
        Ok(())
    }
}
