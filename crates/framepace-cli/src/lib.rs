//! framepace CLI library
//!
//! Command-line host for the framepace demo device: argument parsing,
//! TOML configuration and the interactive run loop.

pub mod app;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;

pub use app::{ConsoleCommand, FramepaceApp, StdoutLineSink};
pub use cli::{Cli, Commands, StartMode};
pub use config::{AppConfig, AppSettings};
pub use error::{CliError, Result};
