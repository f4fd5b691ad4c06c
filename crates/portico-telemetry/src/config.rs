//! Telemetry configuration.

use crate::logging::LogConfig;
use crate::metrics::MetricsConfig;

/// Settings for logging and the metrics exporter, plus the service identity
/// reported when they start.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name, attached to startup logs.
    pub service_name: String,

    /// Service version.
    pub service_version: String,

    /// Deployment environment (production, staging, development).
    pub environment: String,

    /// Metrics configuration.
    pub metrics: MetricsConfig,

    /// Logging configuration.
    pub logging: LogConfig,
}

impl TelemetryConfig {
    /// Starts a builder from the defaults.
    #[must_use]
    pub fn builder() -> TelemetryConfigBuilder {
        TelemetryConfigBuilder::new()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "portico".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "development".to_string(),
            metrics: MetricsConfig::default(),
            logging: LogConfig::default(),
        }
    }
}

/// Builder for [`TelemetryConfig`]; unset fields keep their defaults.
#[derive(Debug, Default)]
pub struct TelemetryConfigBuilder {
    config: TelemetryConfig,
}

impl TelemetryConfigBuilder {
    /// Starts from [`TelemetryConfig::default`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the service name.
    #[must_use]
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.config.service_name = name.into();
        self
    }

    /// Sets the service version reported at startup.
    #[must_use]
    pub fn service_version(mut self, version: impl Into<String>) -> Self {
        self.config.service_version = version.into();
        self
    }

    /// Sets the deployment environment.
    #[must_use]
    pub fn environment(mut self, env: impl Into<String>) -> Self {
        self.config.environment = env.into();
        self
    }

    /// Replaces the exporter settings.
    #[must_use]
    pub fn metrics(mut self, config: MetricsConfig) -> Self {
        self.config.metrics = config;
        self
    }

    /// Replaces the logging settings.
    #[must_use]
    pub fn logging(mut self, config: LogConfig) -> Self {
        self.config.logging = config;
        self
    }

    /// Turns the Prometheus exporter on or off, keeping its buckets.
    #[must_use]
    pub fn metrics_enabled(mut self, enabled: bool) -> Self {
        self.config.metrics.enabled = enabled;
        self
    }

    /// Finishes the configuration.
    #[must_use]
    pub fn build(self) -> TelemetryConfig {
        self.config
    }
}
