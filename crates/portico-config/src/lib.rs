//! Typed configuration for the Portico edge gateway.
//!
//! - TOML and JSON configuration files
//! - Environment variable overrides
//! - Strict parsing (unknown fields are rejected)
//! - Layered loading (defaults → file → env)
//!
//! # Example
//!
//! ```no_run
//! use portico_config::ConfigLoader;
//!
//! # fn main() -> Result<(), portico_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_file("portico.toml")?
//!     .with_env_prefix("PORTICO")
//!     .load()?;
//!
//! println!("Gateway will listen on: {}", config.server.http_addr);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! http_addr = "0.0.0.0:8080"
//! request_timeout_ms = 30000
//!
//! [telemetry]
//! service_name = "portico"
//!
//! [telemetry.logging]
//! level = "info"
//! format = "json"
//!
//! [errors]
//! expose_internal_errors = false
//!
//! [filters]
//! disabled = []
//!
//! [routes.filtertest]
//! path = "/filtertest/**"
//! url = "http://127.0.0.1:8081"
//!
//! [fallbacks.filtertest]
//! status = 503
//! body = "filtertest is unavailable"
//! ```
//!
//! # Environment Variable Overrides
//!
//! - `PORTICO__SERVER__HTTP_ADDR=0.0.0.0:9000`
//! - `PORTICO__TELEMETRY__LOGGING__LEVEL=debug`
//! - `PORTICO__FILTERS__DISABLED=access_log`
//! - `PORTICO__ROUTES__FILTERTEST__URL=http://10.0.0.5:8081`

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::*;
pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, DEFAULT_ENV_PREFIX};
pub use schema::*;
