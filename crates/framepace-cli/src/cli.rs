//! Command-line interface definitions and parsing

use clap::{Parser, Subcommand, ValueEnum};
use framepace_core::ModeId;
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the demo device until interrupted
    Run {
        /// Mode entered at startup
        #[arg(short, long, value_enum)]
        mode: Option<StartMode>,
        /// Stop after this many seconds
        #[arg(short, long)]
        duration: Option<u64>,
        /// Display refresh rate override
        #[arg(long)]
        refresh_hz: Option<u32>,
        /// Print the final statistics as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate the configuration and exit
    Check,
    /// Print the effective configuration as TOML
    Config,
}

/// Modes selectable from the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartMode {
    Idle,
    Simulation,
}

impl StartMode {
    pub fn mode_id(self) -> ModeId {
        match self {
            StartMode::Idle => ModeId::IDLE_DISPLAY,
            StartMode::Simulation => ModeId::SIMULATION,
        }
    }
}
