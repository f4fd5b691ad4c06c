//! Telemetry error types.

use thiserror::Error;

/// Errors that can occur while initializing telemetry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Failed to install the metrics recorder.
    #[error("Failed to initialize metrics: {0}")]
    MetricsInit(String),

    /// Failed to install the log subscriber.
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl TelemetryError {
    /// Creates a metrics initialization error.
    pub fn metrics_init(message: impl Into<String>) -> Self {
        Self::MetricsInit(message.into())
    }

    /// Creates a logging initialization error.
    pub fn logging_init(message: impl Into<String>) -> Self {
        Self::LoggingInit(message.into())
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}
