//! Observability for Portico.
//!
//! - **Failure accounting**: [`FailureMetrics`], the process-wide
//!   `(phase, status)` counter every unrecovered pipeline failure is recorded
//!   into.
//! - **Metrics**: Prometheus-format series via the `metrics` crate.
//! - **Logging**: Structured JSON or pretty logs via `tracing-subscriber`.
//!
//! # Metrics Endpoint
//!
//! The gateway serves the rendered exporter output on `/_portico/metrics`:
//!
//! ```text
//! # TYPE portico_filter_failures_total counter
//! portico_filter_failures_total{phase="pre",status="500"} 1
//! portico_filter_failures_total{phase="route",status="500"} 3
//!
//! # TYPE portico_requests_total counter
//! portico_requests_total{route="filtertest",status="200"} 1234
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use portico_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let config = TelemetryConfig::builder()
//!     .service_name("edge")
//!     .environment("production")
//!     .build();
//!
//! init_telemetry(&config)?;
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;

pub use config::{TelemetryConfig, TelemetryConfigBuilder};
pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig};
pub use metrics::{
    init_metrics, record_request, render_metrics, FailureKey, FailureMetrics, InFlightGuard,
    MetricsConfig,
};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Initializes logging, then metrics.
///
/// # Errors
///
/// Returns `TelemetryError` if either subsystem fails to initialize.
pub fn init_telemetry(config: &TelemetryConfig) -> TelemetryResult<()> {
    if config.service_name.trim().is_empty() {
        return Err(TelemetryError::invalid_config("service_name must not be empty"));
    }

    init_logging(&config.logging)?;
    init_metrics(&config.metrics)?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = %config.environment,
        metrics = config.metrics.enabled,
        "Telemetry initialized"
    );

    Ok(())
}
