//! Command-line interface.
//!
//! Each subcommand lives in its own module and receives the fully loaded
//! settings; global flags only override the observability section.

pub mod check_config;
pub mod monitor;
pub mod probe;
pub mod simulate;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::config::{load_config, ConfigError, ResilienceSettings};
use crate::resilience::ResilienceError;

#[derive(Debug, Parser)]
#[command(name = "resilience-guard")]
#[command(about = "Circuit breakers, retries and fallbacks for unreliable downstreams", long_about = None)]
pub struct Cli {
    /// Settings file (TOML). Defaults are used when omitted.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the configured log level.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Emit JSON log lines.
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Drive a synthetic flaky downstream and print the health report
    Simulate(simulate::SimulateArgs),
    /// Fetch a URL once through the resilience layer
    Probe(probe::ProbeArgs),
    /// Probe a URL periodically until interrupted
    Monitor(monitor::MonitorArgs),
    /// Load and validate a settings file
    CheckConfig(check_config::CheckConfigArgs),
}

impl Cli {
    /// Settings from `--config` (or defaults) with the command-line overrides applied.
    pub fn load_settings(&self) -> Result<ResilienceSettings, ConfigError> {
        let mut settings = match &self.config {
            Some(path) => load_config(path)?,
            None => ResilienceSettings::default(),
        };

        if let Some(level) = &self.log_level {
            settings.observability.log_level = level.clone();
        }
        if self.json_logs {
            settings.observability.json_logs = true;
        }
        Ok(settings)
    }
}

/// Errors surfaced by a subcommand.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Resilience(#[from] ResilienceError),

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to watch settings file: {0}")]
    Watch(#[from] notify::Error),

    #[error("failed to render output: {0}")]
    Render(#[from] serde_json::Error),

    #[error("failed to render settings: {0}")]
    RenderToml(#[from] toml::ser::Error),
}

/// Dispatch to the selected subcommand.
pub async fn run(cli: Cli, settings: ResilienceSettings) -> Result<(), CommandError> {
    match cli.command {
        Command::Simulate(args) => simulate::run(args, settings).await,
        Command::Probe(args) => probe::run(args, settings).await,
        Command::Monitor(args) => monitor::run(args, settings, cli.config).await,
        Command::CheckConfig(args) => check_config::run(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simulate_with_overrides() {
        let cli = Cli::try_parse_from([
            "resilience-guard",
            "simulate",
            "--calls",
            "10",
            "--log-level",
            "debug",
            "--json-logs",
        ])
        .unwrap();

        let settings = cli.load_settings().unwrap();
        assert_eq!(settings.observability.log_level, "debug");
        assert!(settings.observability.json_logs);
        match cli.command {
            Command::Simulate(args) => assert_eq!(args.calls, 10),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_probe_requires_url() {
        assert!(Cli::try_parse_from(["resilience-guard", "probe"]).is_err());
        let cli = Cli::try_parse_from(["resilience-guard", "probe", "http://localhost:8080/health"]).unwrap();
        assert!(matches!(cli.command, Command::Probe(_)));
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let cli = Cli::try_parse_from([
            "resilience-guard",
            "--config",
            "/nonexistent/resilience.toml",
            "check-config",
            "/nonexistent/resilience.toml",
        ])
        .unwrap();
        assert!(matches!(cli.load_settings(), Err(ConfigError::Io(_))));
    }
}
