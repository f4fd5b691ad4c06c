//! Access log.
//!
//! The pipeline writes one access log record per request once the state
//! machine has settled on the final response, so failed requests are logged
//! with their 500 like any other. Each record is also fed to the request
//! metrics and attached to the response's extensions.
//!
//! # Log Fields
//!
//! - `route` - Resolved route, or `unrouted`
//! - `method` - Request method
//! - `path` - Request path
//! - `status` - Final response status
//! - `duration_ms` - Time since the request entered the pipeline

use std::time::Duration;

use portico_core::RequestContext;
use portico_telemetry::record_request;

/// Name used in `filters.disabled` to turn the access log off.
pub const NAME: &str = "access_log";

/// Route label for requests no route matched.
pub const UNROUTED: &str = "unrouted";

/// One access log record.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessLogEntry {
    /// Route label.
    pub route: String,
    /// HTTP method.
    pub method: String,
    /// Request path.
    pub path: String,
    /// Final response status, `0` if no response was attached.
    pub status: u16,
    /// Time spent in the pipeline.
    pub duration: Duration,
}

impl AccessLogEntry {
    /// Captures the outcome held by `ctx`.
    #[must_use]
    pub fn from_context(ctx: &RequestContext) -> Self {
        Self {
            route: ctx.route().unwrap_or(UNROUTED).to_string(),
            method: ctx.request().method().to_string(),
            path: ctx.path().to_string(),
            status: ctx.response().map_or(0, |r| r.status().as_u16()),
            duration: ctx.elapsed(),
        }
    }

    /// Writes the log line and records `portico_requests_total`.
    pub fn emit(&self) {
        tracing::info!(
            route = %self.route,
            method = %self.method,
            path = %self.path,
            status = self.status,
            duration_ms = self.duration.as_secs_f64() * 1000.0,
            "Request completed"
        );
        record_request(&self.route, self.status, self.duration);
    }
}
