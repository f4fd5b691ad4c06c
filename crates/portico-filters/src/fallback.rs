//! Fallback providers and their registry.
//!
//! When the route phase fails, the pipeline asks the [`FallbackRegistry`] for
//! a provider registered under the request's route. A provider keyed by the
//! exact route name wins; otherwise the first provider registered under
//! [`ANY_ROUTE`] is used. If there is none, or the provider itself fails, the
//! route failure escalates to an error response.

use bytes::Bytes;
use http::{header, StatusCode};
use http_body_util::Full;
use portico_core::{FailureCause, FilterError, FilterResult, Response};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Route key matching every route.
pub const ANY_ROUTE: &str = "*";

/// Supplies a substitute response when the route phase fails.
pub trait FallbackProvider: Send + Sync + 'static {
    /// The route name this provider serves, or [`ANY_ROUTE`].
    fn route(&self) -> &str;

    /// Builds the substitute response.
    ///
    /// `route` is the request's resolved route, if any. `cause` is the route
    /// failure being absorbed.
    fn fallback_response(&self, route: Option<&str>, cause: &FailureCause) -> FilterResult<Response>;
}

/// A fallback provider that always returns the same response.
///
/// # Example
///
/// ```
/// use http::StatusCode;
/// use portico_filters::StaticFallback;
///
/// let fallback = StaticFallback::new("users", StatusCode::SERVICE_UNAVAILABLE, "users are unavailable")
///     .content_type("text/plain");
/// ```
#[derive(Debug, Clone)]
pub struct StaticFallback {
    route: String,
    status: StatusCode,
    body: Bytes,
    content_type: String,
}

impl StaticFallback {
    /// Creates a provider for `route` with a plain-text body.
    pub fn new(route: impl Into<String>, status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            route: route.into(),
            status,
            body: body.into(),
            content_type: "text/plain; charset=utf-8".to_string(),
        }
    }

    /// Sets the `Content-Type` of the fallback response.
    #[must_use]
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }
}

impl FallbackProvider for StaticFallback {
    fn route(&self) -> &str {
        &self.route
    }

    fn fallback_response(&self, _route: Option<&str>, _cause: &FailureCause) -> FilterResult<Response> {
        http::Response::builder()
            .status(self.status)
            .header(header::CONTENT_TYPE, self.content_type.as_str())
            .body(Full::new(self.body.clone()))
            .map_err(|e| FilterError::failed(format!("invalid fallback response: {e}")))
    }
}

type FallbackFn = Box<dyn Fn(Option<&str>, &FailureCause) -> FilterResult<Response> + Send + Sync>;

/// A fallback provider built from a closure.
pub struct FnFallback {
    route: String,
    func: FallbackFn,
}

impl FnFallback {
    /// Creates a provider for `route`.
    pub fn new<F>(route: impl Into<String>, func: F) -> Self
    where
        F: Fn(Option<&str>, &FailureCause) -> FilterResult<Response> + Send + Sync + 'static,
    {
        Self {
            route: route.into(),
            func: Box::new(func),
        }
    }
}

impl FallbackProvider for FnFallback {
    fn route(&self) -> &str {
        &self.route
    }

    fn fallback_response(&self, route: Option<&str>, cause: &FailureCause) -> FilterResult<Response> {
        (self.func)(route, cause)
    }
}

impl fmt::Debug for FnFallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnFallback")
            .field("route", &self.route)
            .finish_non_exhaustive()
    }
}

/// Registered fallback providers, in registration order.
#[derive(Default, Clone)]
pub struct FallbackRegistry {
    providers: Vec<Arc<dyn FallbackProvider>>,
}

impl FallbackRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a provider.
    pub fn register(&mut self, provider: Arc<dyn FallbackProvider>) {
        self.providers.push(provider);
    }

    /// Returns the number of registered providers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Returns true if no provider is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Finds the provider for `route`: exact match first, then the first
    /// wildcard provider.
    #[must_use]
    pub fn lookup(&self, route: Option<&str>) -> Option<&Arc<dyn FallbackProvider>> {
        route
            .and_then(|route| self.providers.iter().find(|p| p.route() == route))
            .or_else(|| self.providers.iter().find(|p| p.route() == ANY_ROUTE))
    }

    /// Tries to absorb a route failure.
    ///
    /// Returns the substitute response, or the escalated cause when no
    /// provider matches or the provider fails. A provider's own error or
    /// panic is logged and never propagated.
    pub fn recover(&self, route: Option<&str>, cause: &FailureCause) -> Result<Response, FailureCause> {
        let Some(provider) = self.lookup(route) else {
            tracing::debug!(route = route.unwrap_or("-"), "No fallback provider registered");
            return Err(cause.clone().escalate());
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| provider.fallback_response(route, cause)));
        let error = match outcome {
            Ok(Ok(response)) => return Ok(response),
            Ok(Err(error)) => error,
            Err(payload) => FilterError::from_panic(payload),
        };

        tracing::warn!(
            route = route.unwrap_or("-"),
            provider = provider.route(),
            error = %error,
            "Fallback provider failed"
        );
        Err(cause.clone().escalate())
    }
}

impl fmt::Debug for FallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.providers.iter().map(|p| p.route()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portico_core::{FailureKind, Phase};

    fn route_failure() -> FailureCause {
        FailureCause::new(Phase::Route, FilterError::upstream("connection refused")).with_filter("forwarding")
    }

    fn status_of(registry: &FallbackRegistry, route: Option<&str>) -> Option<StatusCode> {
        registry
            .recover(route, &route_failure())
            .ok()
            .map(|response| response.status())
    }

    #[test]
    fn test_exact_route_beats_wildcard() {
        let mut registry = FallbackRegistry::new();
        registry.register(Arc::new(StaticFallback::new(ANY_ROUTE, StatusCode::SERVICE_UNAVAILABLE, "any")));
        registry.register(Arc::new(StaticFallback::new("users", StatusCode::OK, "users")));

        assert_eq!(registry.lookup(Some("users")).unwrap().route(), "users");
        assert_eq!(status_of(&registry, Some("users")), Some(StatusCode::OK));
        assert_eq!(status_of(&registry, Some("orders")), Some(StatusCode::SERVICE_UNAVAILABLE));
    }

    #[test]
    fn test_first_wildcard_wins() {
        let mut registry = FallbackRegistry::new();
        registry.register(Arc::new(StaticFallback::new(ANY_ROUTE, StatusCode::BAD_GATEWAY, "first")));
        registry.register(Arc::new(StaticFallback::new(ANY_ROUTE, StatusCode::GATEWAY_TIMEOUT, "second")));

        assert_eq!(status_of(&registry, Some("anything")), Some(StatusCode::BAD_GATEWAY));
    }

    #[test]
    fn test_unresolved_route_uses_wildcard_only() {
        let mut registry = FallbackRegistry::new();
        registry.register(Arc::new(StaticFallback::new("users", StatusCode::OK, "users")));
        assert!(registry.lookup(None).is_none());

        registry.register(Arc::new(StaticFallback::new(ANY_ROUTE, StatusCode::SERVICE_UNAVAILABLE, "any")));
        assert_eq!(registry.lookup(None).unwrap().route(), ANY_ROUTE);
    }

    #[test]
    fn test_no_provider_escalates() {
        let registry = FallbackRegistry::new();
        let escalated = registry.recover(Some("filtertest"), &route_failure()).unwrap_err();

        assert_eq!(escalated.phase(), Phase::Route);
        assert_eq!(escalated.kind(), FailureKind::FallbackFailure);
        assert_eq!(escalated.filter(), Some("forwarding"));
    }

    #[test]
    fn test_provider_error_escalates() {
        let mut registry = FallbackRegistry::new();
        registry.register(Arc::new(FnFallback::new("users", |_, _| {
            Err(FilterError::failed("fallback unavailable"))
        })));

        let escalated = registry.recover(Some("users"), &route_failure()).unwrap_err();
        assert_eq!(escalated.kind(), FailureKind::FallbackFailure);
    }

    #[test]
    fn test_provider_panic_escalates() {
        let mut registry = FallbackRegistry::new();
        registry.register(Arc::new(FnFallback::new(ANY_ROUTE, |_, _| panic!("fallback exploded"))));

        let escalated = registry.recover(Some("users"), &route_failure()).unwrap_err();
        assert_eq!(escalated.kind(), FailureKind::FallbackFailure);
    }

    #[test]
    fn test_provider_receives_route_and_cause() {
        let mut registry = FallbackRegistry::new();
        registry.register(Arc::new(FnFallback::new(ANY_ROUTE, |route, cause| {
            let seen = format!("{}:{}", route.unwrap_or("none"), cause.filter().unwrap_or("none"));
            Ok(http::Response::builder()
                .header("x-fallback-seen", seen)
                .body(Full::new(Bytes::new()))
                .unwrap())
        })));

        let response = registry.recover(Some("users"), &route_failure()).unwrap();
        assert_eq!(response.headers()["x-fallback-seen"], "users:forwarding");
    }

    #[test]
    fn test_static_fallback_content_type() {
        let fallback = StaticFallback::new("users", StatusCode::SERVICE_UNAVAILABLE, r#"{"users":[]}"#)
            .content_type("application/json");
        let response = fallback.fallback_response(Some("users"), &route_failure()).unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    }

    #[test]
    fn test_debug_lists_routes() {
        let mut registry = FallbackRegistry::new();
        registry.register(Arc::new(StaticFallback::new("users", StatusCode::OK, "")));
        registry.register(Arc::new(FnFallback::new(ANY_ROUTE, |_, _| Err(FilterError::failed("x")))));
        assert_eq!(format!("{registry:?}"), r#"["users", "*"]"#);
        assert_eq!(registry.len(), 2);
    }
}
