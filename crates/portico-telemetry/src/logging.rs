//! Structured logging setup.
//!
//! Installs a `tracing-subscriber` registry with an [`EnvFilter`] and either
//! JSON (production) or pretty (development) output. Pipeline logs carry the
//! field names in [`fields`] so they can be queried uniformly.
//!
//! # Example
//!
//! ```rust,ignore
//! use portico_telemetry::logging::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::production())?;
//! tracing::warn!(phase = "route", filter = "forwarding", "Filter failed");
//! ```

use crate::error::TelemetryError;
use crate::TelemetryResult;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Whether logging is enabled.
    pub enabled: bool,

    /// Filter directives, e.g. `"info"` or `"portico_filters=debug,info"`.
    pub level: String,

    /// Whether to output JSON.
    pub json_format: bool,

    /// Whether to log span open/close events.
    pub span_events: bool,

    /// Whether to include file and line.
    pub file_line_info: bool,

    /// Whether to include the target (module path).
    pub include_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::production()
    }
}

impl LogConfig {
    /// Human-readable output at debug level.
    #[must_use]
    pub fn development() -> Self {
        Self {
            enabled: true,
            level: "debug".to_string(),
            json_format: false,
            span_events: true,
            file_line_info: true,
            include_target: true,
        }
    }

    /// JSON output at info level.
    #[must_use]
    pub fn production() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            json_format: true,
            span_events: false,
            file_line_info: false,
            include_target: true,
        }
    }
}

/// Installs the global log subscriber.
///
/// # Errors
///
/// Returns `TelemetryError::LoggingInit` if the filter directives are invalid
/// or a global subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let filter = create_env_filter(&config.level)?;
    let span_events = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let layer: Box<dyn Layer<Registry> + Send + Sync> = if config.json_format {
        tracing_subscriber::fmt::layer()
            .json()
            .with_span_events(span_events)
            .with_file(config.file_line_info)
            .with_line_number(config.file_line_info)
            .with_target(config.include_target)
            .with_filter(filter)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .pretty()
            .with_span_events(span_events)
            .with_file(config.file_line_info)
            .with_line_number(config.file_line_info)
            .with_target(config.include_target)
            .with_filter(filter)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(layer)
        .try_init()
        .map_err(|e| TelemetryError::logging_init(e.to_string()))
}

/// Parses filter directives into an [`EnvFilter`].
///
/// # Errors
///
/// Returns `TelemetryError::LoggingInit` if the directives are invalid.
pub fn create_env_filter(directives: &str) -> TelemetryResult<EnvFilter> {
    EnvFilter::try_new(directives)
        .map_err(|e| TelemetryError::logging_init(format!("Invalid log level: {e}")))
}

/// Field names used by pipeline log events.
pub mod fields {
    /// Request ID.
    pub const REQUEST_ID: &str = "request_id";

    /// Resolved route name.
    pub const ROUTE: &str = "route";

    /// Filter phase (`pre`, `route`, `post`).
    pub const PHASE: &str = "phase";

    /// Filter name.
    pub const FILTER: &str = "filter";

    /// HTTP method.
    pub const HTTP_METHOD: &str = "method";

    /// Request path.
    pub const HTTP_PATH: &str = "path";

    /// Response status code.
    pub const HTTP_STATUS: &str = "status";

    /// Elapsed time in milliseconds.
    pub const DURATION_MS: &str = "duration_ms";

    /// Error text.
    pub const ERROR: &str = "error";
}
