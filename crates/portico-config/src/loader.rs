//! Layered configuration loading.
//!
//! Layers apply in order, later layers overriding earlier ones:
//! defaults, then a TOML or JSON file, then `PREFIX__SECTION__KEY`
//! environment variables.

use std::env;
use std::fs;
use std::path::Path;

use crate::{ConfigError, LogFormat, PorticoConfig};

/// Environment prefix used by the gateway binary.
pub const DEFAULT_ENV_PREFIX: &str = "PORTICO";

/// Configuration loader with layered approach.
///
/// # Example
///
/// ```no_run
/// use portico_config::ConfigLoader;
///
/// # fn main() -> Result<(), portico_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_dotenv()
///     .with_file("portico.toml")?
///     .with_env_prefix("PORTICO")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: PorticoConfig,
    env_prefix: Option<String>,
    file_loaded: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a loader starting from default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: PorticoConfig::default(),
            env_prefix: None,
            file_loaded: false,
        }
    }

    /// Start from the development preset.
    ///
    /// # Example
    ///
    /// ```
    /// use portico_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new().with_development().load().unwrap();
    /// assert_eq!(config.telemetry.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = PorticoConfig::development();
        self
    }

    /// Start from the production preset.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = PorticoConfig::production();
        self
    }

    /// Load configuration from a `.toml` or `.json` file.
    ///
    /// The file replaces the current configuration; sections it omits take
    /// their default values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file is missing, unreadable, has an
    /// unsupported extension, or fails to parse.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;

        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        self.config = parse(&content, format)?;
        self.file_loaded = true;

        Ok(self)
    }

    /// Load a file if it exists, otherwise keep the current configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be loaded.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Load configuration from a string in the given format.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the format is unknown or parsing fails.
    ///
    /// # Example
    ///
    /// ```
    /// use portico_config::ConfigLoader;
    ///
    /// let toml = r#"
    ///     [routes.users]
    ///     path = "/users/**"
    ///     url = "http://127.0.0.1:9000"
    /// "#;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string(toml, "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert!(config.routes.contains_key("users"));
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = parse(content, format)?;
        Ok(self)
    }

    /// Enable environment overrides of the form `PREFIX__SECTION__KEY`.
    ///
    /// For example, with prefix `PORTICO`:
    /// - `PORTICO__SERVER__HTTP_ADDR=0.0.0.0:9000`
    /// - `PORTICO__ROUTES__USERS__URL=http://users.internal`
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Load variables from a `.env` file into the process environment.
    ///
    /// A missing `.env` file is not an error.
    #[must_use]
    pub fn with_dotenv(self) -> Self {
        let _ = dotenvy::dotenv();
        self
    }

    /// Returns true if a configuration file has been loaded.
    #[must_use]
    pub fn file_loaded(&self) -> bool {
        self.file_loaded
    }

    /// Apply environment overrides and validate.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an override cannot be parsed or the final
    /// configuration is invalid.
    pub fn load(mut self) -> Result<PorticoConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            self.apply_env_vars(&prefix, env::vars())?;
        }

        self.config.validate()?;

        Ok(self.config)
    }

    /// Return the configuration without env overrides or validation.
    #[must_use]
    pub fn load_unvalidated(self) -> PorticoConfig {
        self.config
    }

    /// Apply every `(key, value)` pair whose key starts with `prefix`.
    ///
    /// Unrecognized keys under the prefix are ignored.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::EnvParseError` for values of the wrong type or
    /// for route overrides naming an unknown route.
    pub fn apply_env_vars<I>(&mut self, prefix: &str, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if key.starts_with(prefix) {
                self.apply_env_var(&key, &value, prefix)?;
            }
        }
        Ok(())
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let Some(rest) = key.strip_prefix(prefix).and_then(|k| k.strip_prefix("__")) else {
            return Ok(());
        };

        let parts: Vec<&str> = rest.split("__").collect();

        match parts.as_slice() {
            ["SERVER", "HTTP_ADDR"] => {
                self.config.server.http_addr = value.to_string();
            }
            ["SERVER", "REQUEST_TIMEOUT_MS"] => {
                self.config.server.request_timeout_ms = parse_number(key, value)?;
            }
            ["SERVER", "SHUTDOWN_TIMEOUT_SECS"] => {
                self.config.server.shutdown_timeout_secs = parse_number(key, value)?;
            }
            ["SERVER", "MAX_BODY_BYTES"] => {
                self.config.server.max_body_bytes = parse_number(key, value)?;
            }

            ["TELEMETRY", "SERVICE_NAME"] => {
                self.config.telemetry.service_name = value.to_string();
            }
            ["TELEMETRY", "ENVIRONMENT"] => {
                self.config.telemetry.environment = value.to_string();
            }
            ["TELEMETRY", "METRICS", "ENABLED"] => {
                self.config.telemetry.metrics.enabled = parse_flag(key, value)?;
            }
            ["TELEMETRY", "LOGGING", "ENABLED"] => {
                self.config.telemetry.logging.enabled = parse_flag(key, value)?;
            }
            ["TELEMETRY", "LOGGING", "LEVEL"] => {
                self.config.telemetry.logging.level = value.to_string();
            }
            ["TELEMETRY", "LOGGING", "FORMAT"] => {
                self.config.telemetry.logging.format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => {
                        return Err(ConfigError::env_parse_error(
                            key,
                            "expected 'json' or 'pretty'",
                        ))
                    }
                };
            }
            ["TELEMETRY", "LOGGING", "INCLUDE_LOCATION"] => {
                self.config.telemetry.logging.include_location = parse_flag(key, value)?;
            }

            ["ERRORS", "EXPOSE_INTERNAL_ERRORS"] => {
                self.config.errors.expose_internal_errors = parse_flag(key, value)?;
            }
            ["ERRORS", "MESSAGE"] => {
                self.config.errors.message = value.to_string();
            }

            ["FILTERS", "DISABLED"] => {
                self.config.filters.disabled = value
                    .split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect();
            }

            ["ROUTES", name, field] => {
                let route = self
                    .config
                    .routes
                    .iter_mut()
                    .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
                    .map(|(_, route)| route)
                    .ok_or_else(|| {
                        ConfigError::env_parse_error(key, format!("no route named '{name}'"))
                    })?;

                match *field {
                    "PATH" => route.path = value.to_string(),
                    "URL" => route.url = value.to_string(),
                    "STRIP_PREFIX" => route.strip_prefix = parse_flag(key, value)?,
                    _ => {}
                }
            }

            _ => {}
        }

        Ok(())
    }
}

fn parse(content: &str, format: &str) -> Result<PorticoConfig, ConfigError> {
    match format.to_lowercase().as_str() {
        "toml" => Ok(toml::from_str(content)?),
        "json" => Ok(serde_json::from_str(content)?),
        other => Err(ConfigError::unsupported_format(other)),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::env_parse_error(key, "expected integer"))
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    parse_bool(value).ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
