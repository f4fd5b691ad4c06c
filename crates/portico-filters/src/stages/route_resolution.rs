//! Route resolution filter.
//!
//! Matches the request path against the [`RouteTable`], names the route on
//! the context and stores the [`ProxyTarget`] for the route phase.
//!
//! # Pipeline Position
//!
//! ```text
//! [RouteResolution] → other pre filters → forwarding → post filters
//! ```

use crate::filter::{BoxFuture, Filter};
use crate::routes::{ProxyTarget, RouteTable};
use portico_core::{FilterResult, Phase, RequestContext};
use std::sync::Arc;

/// Filter name.
pub const NAME: &str = "route_resolution";

/// Filter order within the pre phase.
pub const ORDER: i32 = 5;

/// Resolves the request's route from the route table.
///
/// Requests that match no route pass through with no route set; the route
/// phase then has nothing to forward and the pipeline answers 404.
#[derive(Debug, Clone)]
pub struct RouteResolutionFilter {
    table: Arc<RouteTable>,
}

impl RouteResolutionFilter {
    /// Creates the filter over `table`.
    #[must_use]
    pub fn new(table: Arc<RouteTable>) -> Self {
        Self { table }
    }
}

impl Filter for RouteResolutionFilter {
    fn name(&self) -> &str {
        NAME
    }

    fn phase(&self) -> Phase {
        Phase::Pre
    }

    fn order(&self) -> i32 {
        ORDER
    }

    fn should_run(&self, ctx: &RequestContext) -> bool {
        ctx.route().is_none()
    }

    fn run<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, FilterResult<()>> {
        Box::pin(async move {
            let uri = ctx.request().uri();
            let Some(target) = self.table.resolve(uri.path(), uri.query()) else {
                tracing::debug!(path = ctx.path(), "No route matched");
                return Ok(());
            };

            tracing::debug!(route = %target.route, upstream = %target.url, "Route resolved");
            ctx.set_route(target.route.clone());
            ctx.set_extension::<ProxyTarget>(target);
            Ok(())
        })
    }
}
