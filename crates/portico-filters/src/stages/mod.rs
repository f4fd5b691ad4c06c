//! Built-in filters.
//!
//! | Filter | Phase | Order | Purpose |
//! |--------|-------|-------|---------|
//! | [`route_resolution`] | pre | 5 | Match the path against the route table |
//!
//! The forwarding filter that performs the upstream call lives in the
//! gateway crate, next to its HTTP client. The access log is written by the
//! pipeline itself, see [`crate::access_log`].

pub mod route_resolution;

pub use route_resolution::RouteResolutionFilter;
