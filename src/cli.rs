//! Command-line interface.

use std::path::PathBuf;

use chrono::NaiveDateTime;
use clap::{Parser, Subcommand, ValueEnum};

use crate::config::{ConfigError, SimulatorConfig};

#[derive(Debug, Parser)]
#[command(author, version, about = "Residential solar-plus-storage simulator")]
pub struct Args {
    /// TOML configuration file.
    #[clap(long, env = "HELIOS_CONFIG", conflicts_with = "preset")]
    pub config: Option<PathBuf>,

    /// Built-in preset: baseline, large_battery or cloudy_winter.
    #[clap(long)]
    pub preset: Option<String>,

    #[clap(long = "log-format", value_enum, default_value = "text", env = "HELIOS_LOG_FORMAT")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Simulate in real time until interrupted (default).
    Run(RunArgs),

    /// Simulate a span of time as fast as possible and print an energy report.
    Replay(ReplayArgs),
}

#[derive(Debug, Default, Parser)]
pub struct RunArgs {
    /// Append every snapshot to this file as JSON lines.
    #[clap(long = "json-out")]
    pub json_out: Option<PathBuf>,

    /// Serve `/state` and `/health` on this address.
    #[cfg(feature = "api")]
    #[clap(long)]
    pub serve: Option<std::net::SocketAddr>,
}

#[derive(Debug, Parser)]
pub struct ReplayArgs {
    /// Number of ticks to simulate. Defaults to one day.
    #[clap(long)]
    pub ticks: Option<usize>,

    /// Simulated seconds per tick. Defaults to the publishing rate.
    #[clap(long = "step-secs")]
    pub step_secs: Option<u64>,

    /// Local start time in the site zone, e.g. `2024-06-15T00:00:00`. Defaults to today's midnight.
    #[clap(long)]
    pub start: Option<NaiveDateTime>,

    /// Write snapshots as CSV.
    #[clap(long = "telemetry-out")]
    pub telemetry_out: Option<PathBuf>,

    /// Write snapshots as JSON lines.
    #[clap(long = "json-out")]
    pub json_out: Option<PathBuf>,
}

impl Args {
    /// Loads the configuration named by `--config` or `--preset`, falling back to `baseline`.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or parsed, or the preset is unknown.
    pub fn load_config(&self) -> Result<SimulatorConfig, ConfigError> {
        match (&self.config, &self.preset) {
            (Some(path), _) => SimulatorConfig::from_toml_file(path),
            (None, Some(name)) => SimulatorConfig::from_preset(name),
            (None, None) => Ok(SimulatorConfig::baseline()),
        }
    }
}
