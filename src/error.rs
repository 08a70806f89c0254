//! Error types shared across the simulator.

use thiserror::Error;

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"battery.min_soc_percent"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Failure while handing a snapshot to a telemetry sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("telemetry I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("telemetry serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("telemetry CSV write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("telemetry writer has stopped")]
    Closed,
}

/// Failure inside one simulation tick. The tick is abandoned and nothing is published.
#[derive(Debug, Error)]
pub enum TickError {
    #[error("non-finite value in `{field}`: {value}")]
    NonFinite { field: &'static str, value: f64 },

    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Failure of a weather source. Recovered by the weather task, never seen by the core.
#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("weather source unavailable: {0}")]
    Unavailable(String),
}
