//! # Portico Filters
//!
//! The phased filter pipeline at the heart of the Portico edge gateway.
//!
//! Every request runs through three ordered phases of filters:
//!
//! ```text
//! Request → PRE filters → ROUTE filters → POST filters → Response
//!                              │ fail
//!                              ▼
//!                      fallback provider
//! ```
//!
//! | Phase | Typical filters | On failure |
//! |-------|-----------------|------------|
//! | `pre` | route resolution, request checks | 500, counted as `pre` |
//! | `route` | upstream forwarding | fallback for the route, else 500 counted as `route` |
//! | `post` | response decoration | 500 (response discarded), counted as `post` |
//!
//! ## Key Features
//!
//! - **Fail-fast phases**: the first failing filter aborts its phase; its
//!   failure is recorded once and later filters are skipped
//! - **Panic isolation**: panics in filters, predicates and fallback providers
//!   are caught and handled like errors
//! - **Per-route fallbacks**: exact route match beats the `*` wildcard
//! - **Failure accounting**: unrecovered failures increment a `(phase, status)`
//!   counter in [`FailureMetrics`](portico_telemetry::FailureMetrics)
//! - **Access log**: one record per request with its final status, failures
//!   included
//!
//! ## Example
//!
//! ```
//! use portico_filters::{FilterError, FnFilter, Phase, Pipeline, StaticFallback};
//! use http::StatusCode;
//!
//! let pipeline = Pipeline::builder()
//!     .filter(
//!         FnFilter::new("fail_route", Phase::Route, i32::MIN, |_| {
//!             Err(FilterError::failed("failing on purpose in route"))
//!         })
//!         .when(|ctx| ctx.query_param("failroute").is_some()),
//!     )
//!     .fallback(StaticFallback::new("users", StatusCode::SERVICE_UNAVAILABLE, "try later"))
//!     .build();
//!
//! assert_eq!(pipeline.filter_names(Phase::Route), vec!["fail_route"]);
//! ```

#![doc(html_root_url = "https://docs.rs/portico-filters/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod access_log;
pub mod executor;
pub mod fallback;
pub mod filter;
pub mod pipeline;
pub mod responder;
pub mod routes;
pub mod stages;

pub use access_log::AccessLogEntry;
pub use executor::PhaseExecutor;
pub use fallback::{FallbackProvider, FallbackRegistry, FnFallback, StaticFallback, ANY_ROUTE};
pub use filter::{BoxFuture, BoxedFilter, Filter, FnFilter};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use responder::{ErrorResponder, DEFAULT_ERROR_MESSAGE, REQUEST_ID_HEADER};
pub use routes::{ProxyTarget, Route, RouteTable};

// Re-export the core types filter authors need
pub use portico_core::{
    FailureCause, FailureKind, FilterError, FilterResult, Phase, Request, RequestContext,
    RequestId, Response, ResponseExt,
};
