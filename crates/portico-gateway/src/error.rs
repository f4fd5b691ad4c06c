//! Error types for the Portico gateway.

use std::net::SocketAddr;

use portico_config::ConfigError;
use portico_telemetry::TelemetryError;
use thiserror::Error;

/// Gateway-level errors.
///
/// These cover startup and server plumbing. Failures inside the filter
/// pipeline never surface here; they become responses.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Logging or metrics could not be initialized.
    #[error("Telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),

    /// The listen socket could not be bound.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: SocketAddr,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The upstream HTTP client could not be built.
    #[error("HTTP client error: {message}")]
    Client {
        /// Error message.
        message: String,
    },

    /// Request body exceeded the configured limit.
    #[error("Request body exceeds {limit} bytes")]
    BodyTooLarge {
        /// Configured limit in bytes.
        limit: usize,
    },

    /// Request body could not be read.
    #[error("Failed to read request body: {message}")]
    BodyRead {
        /// Error message.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    /// Create a bind error.
    pub fn bind(addr: SocketAddr, source: std::io::Error) -> Self {
        Self::Bind { addr, source }
    }

    /// Create an HTTP client error.
    pub fn client(message: impl Into<String>) -> Self {
        Self::Client {
            message: message.into(),
        }
    }

    /// Create a body read error.
    pub fn body_read(message: impl Into<String>) -> Self {
        Self::BodyRead {
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BodyTooLarge { .. } => 413,
            Self::BodyRead { .. } => 400,
            Self::Config(_)
            | Self::Telemetry(_)
            | Self::Bind { .. }
            | Self::Client { .. }
            | Self::Io(_) => 500,
        }
    }

    /// Get the error category for logging and metrics.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Telemetry(_) => "telemetry",
            Self::Bind { .. } | Self::Io(_) => "server",
            Self::Client { .. } => "client",
            Self::BodyTooLarge { .. } | Self::BodyRead { .. } => "request",
        }
    }
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;
