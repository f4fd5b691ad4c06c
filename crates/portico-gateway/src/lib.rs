//! # Portico Gateway
//!
//! HTTP front end for the Portico filter pipeline.
//!
//! ```text
//!   client ──► GatewayServer ──► Pipeline ──► ForwardingFilter ──► upstream
//!                  │                 │
//!                  │                 └── fallback / 500 on failure
//!                  └── /_portico/{health,failures,metrics}
//! ```
//!
//! The pipeline is assembled from [`PorticoConfig`](portico_config::PorticoConfig):
//! routes become the route table used by route resolution, `[fallbacks]`
//! become static fallback providers, and `[errors]` configures the 500 body.
//!
//! # Example
//!
//! ```no_run
//! use portico_config::ConfigLoader;
//! use portico_gateway::GatewayServer;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::new()
//!     .with_file("portico.toml")?
//!     .with_env_prefix("PORTICO")
//!     .load()?;
//!
//! GatewayServer::from_config(config)?.run().await?;
//! # Ok(())
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/portico-gateway/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod assembly;
pub mod error;
pub mod forward;
pub mod headers;
pub mod server;

pub use assembly::{build_pipeline, pipeline_builder, route_table};
pub use error::{GatewayError, GatewayResult};
pub use forward::{ForwardingFilter, ProxyClient};
pub use headers::ClientAddr;
pub use server::GatewayServer;

/// Gateway version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
