//! framepace CLI Configuration
//!
//! Configuration is read from a TOML file whose missing sections fall back
//! to defaults; command-line flags override it afterwards.

use std::path::Path;
use std::time::Duration;

use framepace_core::{ConfigError, SchedulerConfig};
use serde::{Deserialize, Serialize};

use crate::cli::StartMode;
use crate::error::Result;

// ----------------------------------------------------------------------------
// Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration of the CLI host
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Scheduler, resource and timing settings
    pub scheduler: SchedulerConfig,

    /// Host behavior
    pub app: AppSettings,
}

/// Host behavior outside the scheduler itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Mode entered at startup, none by default
    pub initial_mode: Option<StartMode>,

    /// How long tasks get to stop before they are aborted
    pub shutdown_grace_ms: u64,

    /// Print the statistics snapshot on exit
    pub print_stats: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            initial_mode: None,
            shutdown_grace_ms: 2000,
            print_stats: true,
        }
    }
}

impl AppSettings {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

// ----------------------------------------------------------------------------
// Configuration Loading
// ----------------------------------------------------------------------------

impl AppConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::Loading(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.scheduler.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CliError;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [scheduler.queue]
            capacity = 32

            [scheduler.timing]
            refresh_hz = 30

            [app]
            initial_mode = "simulation"
            "#,
        )
        .unwrap();

        assert_eq!(config.scheduler.queue.capacity, 32);
        assert_eq!(config.scheduler.timing.refresh_hz, 30);
        assert_eq!(config.scheduler.framer.capacity, 128);
        assert_eq!(config.app.initial_mode, Some(StartMode::Simulation));
        assert!(config.app.print_stats);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = AppConfig::from_toml("[scheduler.queue]\ncapacity = 0\n").unwrap_err();
        assert!(matches!(err, CliError::Config(ref msg) if msg.contains("queue.capacity")));

        let err = AppConfig::from_toml("[scheduler\n").unwrap_err();
        assert!(matches!(err, CliError::TomlParsing(_)));
    }

    #[test]
    fn test_non_finite_arena_is_rejected() {
        let err = AppConfig::from_toml("[scheduler.arena]\nwidth = nan\n").unwrap_err();
        assert!(matches!(err, CliError::Config(ref msg) if msg.contains("arena.width")));

        let err = AppConfig::from_toml("[scheduler.arena]\nmax_speed = inf\n").unwrap_err();
        assert!(matches!(err, CliError::Config(ref msg) if msg.contains("arena.max_speed")));
    }

    #[test]
    fn test_missing_file_is_a_loading_error() {
        let err = AppConfig::load_from_file("/nonexistent/framepace.toml").unwrap_err();
        assert!(
            matches!(err, CliError::Config(ref msg) if msg.starts_with("Failed to load configuration"))
        );
    }

    #[test]
    fn test_defaults_survive_serialization() {
        let config = AppConfig::default();
        let text = config.to_toml().unwrap();
        assert_eq!(AppConfig::from_toml(&text).unwrap(), config);
    }
}
