//! Main configuration types.
//!
//! This module provides the top-level [`PorticoConfig`] struct and its builder.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    ConfigError, ErrorsConfig, FallbackConfig, FiltersConfig, RouteConfig, ServerConfig,
    TelemetryConfigSection,
};

/// Route key that makes a fallback apply to every route.
pub const ANY_ROUTE: &str = "*";

/// Complete gateway configuration.
///
/// Routes and fallbacks keep their declaration order, which is the order
/// routes are matched in.
///
/// # Example
///
/// ```
/// use portico_config::PorticoConfig;
///
/// let config = PorticoConfig::default();
/// assert_eq!(config.server.http_addr, "0.0.0.0:8080");
/// assert!(config.routes.is_empty());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct PorticoConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Telemetry configuration (metrics, logging).
    #[serde(default)]
    pub telemetry: TelemetryConfigSection,

    /// Error response configuration.
    #[serde(default)]
    pub errors: ErrorsConfig,

    /// Built-in filter toggles.
    #[serde(default)]
    pub filters: FiltersConfig,

    /// Upstream routes by name.
    #[serde(default)]
    pub routes: IndexMap<String, RouteConfig>,

    /// Static fallbacks by route name, or `*` for all routes.
    #[serde(default)]
    pub fallbacks: IndexMap<String, FallbackConfig>,
}

impl PorticoConfig {
    /// Create a new configuration builder.
    ///
    /// # Example
    ///
    /// ```
    /// use portico_config::{PorticoConfig, RouteConfig};
    ///
    /// let config = PorticoConfig::builder()
    ///     .route("users", RouteConfig::new("/users/**", "http://127.0.0.1:9000"))
    ///     .build();
    ///
    /// assert_eq!(config.routes.len(), 1);
    /// ```
    #[must_use]
    pub fn builder() -> PorticoConfigBuilder {
        PorticoConfigBuilder::new()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self
            .server
            .http_addr
            .parse::<std::net::SocketAddr>()
            .is_err()
        {
            return Err(ConfigError::invalid_value(
                "server.http_addr",
                format!("invalid socket address: {}", self.server.http_addr),
            ));
        }

        if self.server.request_timeout_ms == 0 {
            return Err(ConfigError::invalid_value(
                "server.request_timeout_ms",
                "must be greater than zero",
            ));
        }

        if self.telemetry.service_name.trim().is_empty() {
            return Err(ConfigError::invalid_value(
                "telemetry.service_name",
                "must not be empty",
            ));
        }

        if let Err(e) = portico_telemetry::logging::create_env_filter(&self.telemetry.logging.level)
        {
            return Err(ConfigError::invalid_value(
                "telemetry.logging.level",
                e.to_string(),
            ));
        }

        if self.errors.message.trim().is_empty() {
            return Err(ConfigError::invalid_value(
                "errors.message",
                "must not be empty",
            ));
        }

        for (name, route) in &self.routes {
            validate_route(name, route)?;
        }

        for (key, fallback) in &self.fallbacks {
            if key != ANY_ROUTE && !self.routes.contains_key(key) {
                return Err(ConfigError::invalid_value(
                    format!("fallbacks.{key}"),
                    "must name a configured route or '*'",
                ));
            }
            if !(100..=599).contains(&fallback.status) {
                return Err(ConfigError::invalid_value(
                    format!("fallbacks.{key}.status"),
                    format!("{} is not a valid HTTP status", fallback.status),
                ));
            }
        }

        Ok(())
    }

    /// Create a development configuration preset.
    ///
    /// Pretty debug logs and failure details in 500 bodies.
    ///
    /// # Example
    ///
    /// ```
    /// use portico_config::PorticoConfig;
    ///
    /// let config = PorticoConfig::development();
    /// assert_eq!(config.telemetry.logging.level, "debug");
    /// assert!(config.errors.expose_internal_errors);
    /// ```
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();

        config.server.http_addr = "127.0.0.1:8080".to_string();
        config.telemetry.environment = "development".to_string();
        config.telemetry.logging.level = "debug".to_string();
        config.telemetry.logging.format = crate::LogFormat::Pretty;
        config.telemetry.logging.include_location = true;
        config.errors.expose_internal_errors = true;

        config
    }

    /// Create a production configuration preset.
    ///
    /// # Example
    ///
    /// ```
    /// use portico_config::PorticoConfig;
    ///
    /// let config = PorticoConfig::production();
    /// assert_eq!(config.telemetry.logging.format, portico_config::LogFormat::Json);
    /// assert!(!config.errors.expose_internal_errors);
    /// ```
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();

        config.telemetry.environment = "production".to_string();
        config.telemetry.logging.level = "info".to_string();
        config.telemetry.logging.format = crate::LogFormat::Json;
        config.errors.expose_internal_errors = false;

        config
    }
}

fn validate_route(name: &str, route: &RouteConfig) -> Result<(), ConfigError> {
    if name.trim().is_empty() || name == ANY_ROUTE {
        return Err(ConfigError::invalid_value(
            format!("routes.{name}"),
            "route name must be non-empty and not '*'",
        ));
    }

    if !route.path.starts_with('/') {
        return Err(ConfigError::invalid_value(
            format!("routes.{name}.path"),
            format!("must start with '/': {}", route.path),
        ));
    }

    let scheme_ok = route
        .url
        .strip_prefix("http://")
        .or_else(|| route.url.strip_prefix("https://"))
        .is_some_and(|rest| !rest.is_empty());
    if !scheme_ok {
        return Err(ConfigError::invalid_value(
            format!("routes.{name}.url"),
            format!("must be an http or https URL: {}", route.url),
        ));
    }

    Ok(())
}

/// Builder for [`PorticoConfig`].
#[derive(Debug, Default)]
pub struct PorticoConfigBuilder {
    server: Option<ServerConfig>,
    telemetry: Option<TelemetryConfigSection>,
    errors: Option<ErrorsConfig>,
    filters: Option<FiltersConfig>,
    routes: IndexMap<String, RouteConfig>,
    fallbacks: IndexMap<String, FallbackConfig>,
}

impl PorticoConfigBuilder {
    /// Create a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the server configuration.
    #[must_use]
    pub fn server(mut self, server: ServerConfig) -> Self {
        self.server = Some(server);
        self
    }

    /// Set the telemetry configuration.
    #[must_use]
    pub fn telemetry(mut self, telemetry: TelemetryConfigSection) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Set the error response configuration.
    #[must_use]
    pub fn errors(mut self, errors: ErrorsConfig) -> Self {
        self.errors = Some(errors);
        self
    }

    /// Set the built-in filter toggles.
    #[must_use]
    pub fn filters(mut self, filters: FiltersConfig) -> Self {
        self.filters = Some(filters);
        self
    }

    /// Add a route. A route with the same name is replaced.
    #[must_use]
    pub fn route(mut self, name: impl Into<String>, route: RouteConfig) -> Self {
        self.routes.insert(name.into(), route);
        self
    }

    /// Add a fallback for a route name or `*`.
    #[must_use]
    pub fn fallback(mut self, route: impl Into<String>, fallback: FallbackConfig) -> Self {
        self.fallbacks.insert(route.into(), fallback);
        self
    }

    /// Build the configuration.
    ///
    /// Any unset sections will use their default values.
    #[must_use]
    pub fn build(self) -> PorticoConfig {
        PorticoConfig {
            server: self.server.unwrap_or_default(),
            telemetry: self.telemetry.unwrap_or_default(),
            errors: self.errors.unwrap_or_default(),
            filters: self.filters.unwrap_or_default(),
            routes: self.routes,
            fallbacks: self.fallbacks,
        }
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if validation fails.
    pub fn build_validated(self) -> Result<PorticoConfig, ConfigError> {
        let config = self.build();
        config.validate()?;
        Ok(config)
    }
}
