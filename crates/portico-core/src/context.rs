//! Request context types.
//!
//! The [`RequestContext`] carries all per-request state through the filter
//! phases. It is created by the pipeline for exactly one request, passed to
//! every filter as an explicit `&mut` argument, and consumed when the final
//! response is produced.

use crate::error::{FilterError, FilterResult};
use crate::failure::FailureCause;
use crate::phase::Phase;
use crate::types::{Request, Response};
use serde::{Deserialize, Serialize};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// A unique identifier for each request, using UUID v7.
///
/// UUID v7 is time-ordered, which makes it ideal for request tracking
/// and log correlation.
///
/// # Example
///
/// ```
/// use portico_core::RequestId;
///
/// let id = RequestId::new();
/// println!("Request ID: {}", id);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new unique request ID using UUID v7.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a `RequestId` from an existing UUID.
    ///
    /// This is useful when the ID was propagated by a client in a header.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Request-scoped state shared by all filters during one request.
///
/// # Invariants
///
/// - At most one [`FailureCause`] is recorded per phase; the first wins.
/// - Once a response is attached it is final. Filters can only attach one
///   through [`set_response`](Self::set_response), which refuses to
///   overwrite. The pipeline alone replaces it, through
///   [`replace_response`](Self::replace_response) and
///   [`end_with_error`](Self::end_with_error).
///
/// # Example
///
/// ```
/// use portico_core::{RequestContext, Request};
/// use bytes::Bytes;
/// use http_body_util::Full;
///
/// let request: Request = http::Request::builder()
///     .uri("/filtertest/get?failpre=true")
///     .body(Full::new(Bytes::new()))
///     .unwrap();
///
/// let mut ctx = RequestContext::new(request);
/// ctx.set_route("filtertest");
///
/// assert_eq!(ctx.route(), Some("filtertest"));
/// assert_eq!(ctx.query_param("failpre"), Some("true"));
/// assert!(ctx.response().is_none());
/// ```
pub struct RequestContext {
    /// Unique identifier for this request.
    request_id: RequestId,

    /// The inbound request.
    request: Request,

    /// The route name, once resolved.
    route: Option<String>,

    /// The response attached by the route phase, a fallback, or the error responder.
    response: Option<Response>,

    /// First failure recorded in each phase, indexed by phase order.
    failures: [Option<FailureCause>; 3],

    /// Whether the request was ended by an error response.
    error_committed: bool,

    /// When the request started processing.
    started_at: Instant,

    /// Type-erased extension data.
    ///
    /// Filters can hand data to later filters here using type-safe keys.
    extensions: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl RequestContext {
    /// Creates a new context for `request` with a fresh request ID.
    #[must_use]
    pub fn new(request: Request) -> Self {
        Self::with_request_id(request, RequestId::new())
    }

    /// Creates a context with a specific request ID.
    #[must_use]
    pub fn with_request_id(request: Request, request_id: RequestId) -> Self {
        Self {
            request_id,
            request,
            route: None,
            response: None,
            failures: [None, None, None],
            error_committed: false,
            started_at: Instant::now(),
            extensions: HashMap::new(),
        }
    }

    /// Returns the request ID.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the inbound request.
    #[must_use]
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Returns the request path.
    #[must_use]
    pub fn path(&self) -> &str {
        self.request.uri().path()
    }

    /// Returns the raw value of the first query parameter named `name`.
    ///
    /// A parameter present without `=` yields `Some("")`.
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.request.uri().query().and_then(|query| {
            query.split('&').find_map(|pair| {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                (key == name).then_some(value)
            })
        })
    }

    /// Returns the resolved route name, if any.
    #[must_use]
    pub fn route(&self) -> Option<&str> {
        self.route.as_deref()
    }

    /// Sets the route name.
    ///
    /// This is normally called by the route-resolution filter in the pre phase.
    pub fn set_route(&mut self, route: impl Into<String>) {
        self.route = Some(route.into());
    }

    /// Returns the attached response, if any.
    #[must_use]
    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    /// Returns true if a response has been attached.
    #[must_use]
    pub fn has_response(&self) -> bool {
        self.response.is_some()
    }

    /// Attaches the response produced by the route phase.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::ResponseAlreadySet`] if a response is already
    /// attached; the existing response is left untouched.
    pub fn set_response(&mut self, response: Response) -> FilterResult<()> {
        if self.response.is_some() {
            return Err(FilterError::ResponseAlreadySet);
        }
        self.response = Some(response);
        Ok(())
    }

    /// Replaces any attached response.
    ///
    /// Reserved for the pipeline: it substitutes a fallback response after a
    /// route failure, and a not-found response when no route matched.
    pub fn replace_response(&mut self, response: Response) {
        self.response = Some(response);
    }

    /// Ends the request with an error response, discarding any attached response.
    ///
    /// Reserved for the pipeline's error step.
    pub fn end_with_error(&mut self, response: Response) {
        self.response = Some(response);
        self.error_committed = true;
    }

    /// Returns true if the request was ended by an error response.
    #[must_use]
    pub fn is_error_committed(&self) -> bool {
        self.error_committed
    }

    /// Records a failure for its phase.
    ///
    /// Returns `false` and keeps the existing record if the phase already has one.
    pub fn record_failure(&mut self, cause: FailureCause) -> bool {
        let slot = &mut self.failures[cause.phase().index()];
        if slot.is_some() {
            return false;
        }
        *slot = Some(cause);
        true
    }

    /// Returns the failure recorded for `phase`, if any.
    #[must_use]
    pub fn failure(&self, phase: Phase) -> Option<&FailureCause> {
        self.failures[phase.index()].as_ref()
    }

    /// Iterates over recorded failures in phase order.
    pub fn failures(&self) -> impl Iterator<Item = &FailureCause> {
        self.failures.iter().flatten()
    }

    /// Returns when the request started processing.
    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Returns the elapsed time since the request started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Stores a typed extension value.
    ///
    /// # Example
    ///
    /// ```
    /// use portico_core::{RequestContext, Request};
    /// use bytes::Bytes;
    /// use http_body_util::Full;
    ///
    /// #[derive(Clone)]
    /// struct Tenant(String);
    ///
    /// let request: Request = http::Request::new(Full::new(Bytes::new()));
    /// let mut ctx = RequestContext::new(request);
    /// ctx.set_extension(Tenant("acme".into()));
    ///
    /// assert_eq!(ctx.get_extension::<Tenant>().unwrap().0, "acme");
    /// ```
    pub fn set_extension<T: Send + Sync + 'static>(&mut self, value: T) {
        self.extensions.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Retrieves a typed extension value.
    #[must_use]
    pub fn get_extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref())
    }

    /// Removes and returns a typed extension value.
    pub fn remove_extension<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.extensions
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast().ok())
            .map(|b| *b)
    }

    /// Checks if an extension of the given type exists.
    #[must_use]
    pub fn has_extension<T: Send + Sync + 'static>(&self) -> bool {
        self.extensions.contains_key(&TypeId::of::<T>())
    }

    /// Consumes the context, yielding the attached response.
    #[must_use]
    pub fn into_response(self) -> Option<Response> {
        self.response
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("request_id", &self.request_id)
            .field("method", self.request.method())
            .field("uri", self.request.uri())
            .field("route", &self.route)
            .field("response_status", &self.response.as_ref().map(Response::status))
            .field("failures", &self.failures)
            .field("error_committed", &self.error_committed)
            .finish_non_exhaustive()
    }
}
