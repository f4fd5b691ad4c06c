//! The [`Filter`] trait and closure-based filters.
//!
//! A filter is bound to one [`Phase`], carries a signed order (lower runs
//! first) and a side-effect-free predicate deciding whether it applies to the
//! current request. Filters are registered once when the pipeline is built
//! and shared across all requests.
//!
//! # Example
//!
//! ```
//! use portico_filters::{BoxFuture, Filter, FilterResult, Phase, RequestContext};
//!
//! struct RequireTenant;
//!
//! impl Filter for RequireTenant {
//!     fn name(&self) -> &str {
//!         "require_tenant"
//!     }
//!
//!     fn phase(&self) -> Phase {
//!         Phase::Pre
//!     }
//!
//!     fn order(&self) -> i32 {
//!         10
//!     }
//!
//!     fn run<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, FilterResult<()>> {
//!         Box::pin(async move {
//!             if ctx.request().headers().contains_key("x-tenant") {
//!                 Ok(())
//!             } else {
//!                 Err(portico_filters::FilterError::failed("missing x-tenant"))
//!             }
//!         })
//!     }
//! }
//! ```

use portico_core::{FilterResult, Phase, RequestContext};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A type-erased filter that can be stored in a registration list.
pub type BoxedFilter = Arc<dyn Filter>;

/// A unit of request processing bound to one phase.
///
/// # Contract
///
/// - `should_run` must not mutate anything; it may be called at most once per
///   request, immediately before `run`.
/// - `run` returns `Err` to abort the rest of its phase. Panics are caught by
///   the executor and treated the same way.
/// - Mutations made to the context before a failure are kept.
pub trait Filter: Send + Sync + 'static {
    /// Returns the filter name, used in logs and failure records.
    fn name(&self) -> &str;

    /// Returns the phase this filter runs in.
    fn phase(&self) -> Phase;

    /// Returns the filter order within its phase. Lower runs first.
    fn order(&self) -> i32;

    /// Returns whether the filter applies to this request.
    fn should_run(&self, _ctx: &RequestContext) -> bool {
        true
    }

    /// Runs the filter.
    fn run<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, FilterResult<()>>;
}

type Action = Box<dyn Fn(&mut RequestContext) -> FilterResult<()> + Send + Sync>;
type Predicate = Box<dyn Fn(&RequestContext) -> bool + Send + Sync>;

/// A filter built from a closure.
///
/// # Example
///
/// ```
/// use portico_filters::{FilterError, FnFilter, Phase};
///
/// let fail_pre = FnFilter::new("fail_pre", Phase::Pre, i32::MIN, |_ctx| {
///     Err(FilterError::failed("failing on purpose in pre"))
/// })
/// .when(|ctx| ctx.query_param("failpre").is_some());
/// ```
pub struct FnFilter {
    name: String,
    phase: Phase,
    order: i32,
    action: Action,
    predicate: Option<Predicate>,
}

impl FnFilter {
    /// Creates a filter that always applies.
    pub fn new<F>(name: impl Into<String>, phase: Phase, order: i32, action: F) -> Self
    where
        F: Fn(&mut RequestContext) -> FilterResult<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            phase,
            order,
            action: Box::new(action),
            predicate: None,
        }
    }

    /// Restricts the filter to requests matching `predicate`.
    #[must_use]
    pub fn when<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&RequestContext) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Box::new(predicate));
        self
    }
}

impl Filter for FnFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn phase(&self) -> Phase {
        self.phase
    }

    fn order(&self) -> i32 {
        self.order
    }

    fn should_run(&self, ctx: &RequestContext) -> bool {
        self.predicate.as_ref().map_or(true, |predicate| predicate(ctx))
    }

    fn run<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, FilterResult<()>> {
        Box::pin(async move { (self.action)(ctx) })
    }
}

impl fmt::Debug for FnFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnFilter")
            .field("name", &self.name)
            .field("phase", &self.phase)
            .field("order", &self.order)
            .field("conditional", &self.predicate.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http_body_util::Full;
    use portico_core::FilterError;

    fn ctx(uri: &str) -> RequestContext {
        RequestContext::new(
            http::Request::builder()
                .uri(uri)
                .body(Full::new(Bytes::new()))
                .unwrap(),
        )
    }

    #[test]
    fn test_descriptor() {
        let filter = FnFilter::new("noop", Phase::Route, -5, |_| Ok(()));
        assert_eq!(filter.name(), "noop");
        assert_eq!(filter.phase(), Phase::Route);
        assert_eq!(filter.order(), -5);
    }

    #[test]
    fn test_unconditional_filter_always_applies() {
        let filter = FnFilter::new("noop", Phase::Pre, 0, |_| Ok(()));
        assert!(filter.should_run(&ctx("/")));
    }

    #[test]
    fn test_predicate() {
        let filter = FnFilter::new("fail_post", Phase::Post, 0, |_| {
            Err(FilterError::failed("failing on purpose in post"))
        })
        .when(|ctx| ctx.query_param("failpost").is_some());

        assert!(!filter.should_run(&ctx("/filtertest/get")));
        assert!(filter.should_run(&ctx("/filtertest/get?failpost=true")));
    }

    #[tokio::test]
    async fn test_run_mutates_context() {
        let filter = FnFilter::new("set_route", Phase::Pre, 0, |ctx| {
            ctx.set_route("filtertest");
            Ok(())
        });

        let mut ctx = ctx("/");
        filter.run(&mut ctx).await.unwrap();
        assert_eq!(ctx.route(), Some("filtertest"));
    }

    #[tokio::test]
    async fn test_run_returns_error() {
        let filter = FnFilter::new("fail", Phase::Route, 0, |_| Err(FilterError::upstream("down")));
        let mut ctx = ctx("/");
        let err = filter.run(&mut ctx).await.unwrap_err();
        assert_eq!(err.category(), "upstream");
    }

    #[test]
    fn test_debug() {
        let filter = FnFilter::new("noop", Phase::Pre, 1, |_| Ok(())).when(|_| true);
        let debug = format!("{filter:?}");
        assert!(debug.contains("noop"));
        assert!(debug.contains("conditional: true"));
    }
}
