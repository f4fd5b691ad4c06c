//! Configuration schema types.
//!
//! This module defines the structure of every configuration section.

use serde::{Deserialize, Serialize};

/// Server configuration section.
///
/// # Example
///
/// ```
/// use portico_config::ServerConfig;
///
/// let config = ServerConfig {
///     http_addr: "127.0.0.1:8080".to_string(),
///     ..Default::default()
/// };
/// assert_eq!(config.request_timeout_ms, 30000);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_http_addr")]
    pub http_addr: String,

    /// Upstream request timeout in milliseconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Graceful shutdown timeout in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Largest request body accepted, in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            request_timeout_ms: default_request_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_http_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_request_timeout() -> u64 {
    30000
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Install the Prometheus exporter behind `/_portico/metrics`.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON formatted logs (production).
    #[default]
    Json,
    /// Human-readable pretty format (development).
    Pretty,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Enable logging.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Filter directives (e.g., "info" or "portico_filters=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Include source file and line in logs.
    #[serde(default)]
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::default(),
            include_location: false,
        }
    }
}

impl LoggingConfig {
    /// Converts to the telemetry crate's logging settings.
    #[must_use]
    pub fn to_log_config(&self) -> portico_telemetry::LogConfig {
        portico_telemetry::LogConfig {
            enabled: self.enabled,
            level: self.level.clone(),
            json_format: self.format == LogFormat::Json,
            span_events: false,
            file_line_info: self.include_location,
            include_target: true,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Telemetry configuration section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfigSection {
    /// Service name, attached to startup logs.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Deployment environment.
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Metrics settings.
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for TelemetryConfigSection {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            environment: default_environment(),
            metrics: MetricsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl TelemetryConfigSection {
    /// Converts to the telemetry crate's configuration.
    #[must_use]
    pub fn to_telemetry_config(&self) -> portico_telemetry::TelemetryConfig {
        portico_telemetry::TelemetryConfig::builder()
            .service_name(self.service_name.clone())
            .environment(self.environment.clone())
            .logging(self.logging.to_log_config())
            .metrics_enabled(self.metrics.enabled)
            .build()
    }
}

fn default_service_name() -> String {
    "portico".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

/// Error response configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ErrorsConfig {
    /// Include the failure description in 500 bodies. Development only.
    #[serde(default)]
    pub expose_internal_errors: bool,

    /// Message sent to clients in 500 bodies.
    #[serde(default = "default_error_message")]
    pub message: String,
}

impl Default for ErrorsConfig {
    fn default() -> Self {
        Self {
            expose_internal_errors: false,
            message: default_error_message(),
        }
    }
}

fn default_error_message() -> String {
    "An internal error occurred".to_string()
}

/// Built-in filter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FiltersConfig {
    /// Names of built-in filters to leave out of the pipeline.
    #[serde(default)]
    pub disabled: Vec<String>,
}

impl FiltersConfig {
    /// Returns true if the filter named `name` is disabled.
    #[must_use]
    pub fn is_disabled(&self, name: &str) -> bool {
        self.disabled.iter().any(|disabled| disabled == name)
    }
}

/// One upstream route, declared under `[routes.<name>]`.
///
/// # Example
///
/// ```toml
/// [routes.filtertest]
/// path = "/filtertest/**"
/// url = "http://127.0.0.1:8081"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RouteConfig {
    /// Path pattern: `/prefix/**` or an exact path.
    pub path: String,

    /// Upstream base URL.
    pub url: String,

    /// Remove the matched prefix before forwarding.
    #[serde(default = "default_true")]
    pub strip_prefix: bool,
}

impl RouteConfig {
    /// Creates a route that strips its prefix.
    pub fn new(path: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            url: url.into(),
            strip_prefix: true,
        }
    }
}

/// A static fallback response, declared under `[fallbacks.<route>]` or
/// `[fallbacks."*"]` for every route.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FallbackConfig {
    /// Status code of the fallback response.
    #[serde(default = "default_fallback_status")]
    pub status: u16,

    /// Body of the fallback response.
    #[serde(default)]
    pub body: String,

    /// Content type of the fallback response.
    #[serde(default = "default_fallback_content_type")]
    pub content_type: String,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            status: default_fallback_status(),
            body: String::new(),
            content_type: default_fallback_content_type(),
        }
    }
}

fn default_fallback_status() -> u16 {
    503
}

fn default_fallback_content_type() -> String {
    "text/plain; charset=utf-8".to_string()
}

fn default_true() -> bool {
    true
}
