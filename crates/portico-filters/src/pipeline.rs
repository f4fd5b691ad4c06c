//! The phased request pipeline.
//!
//! Every request walks the same state machine:
//!
//! ```text
//!          ok            ok                ok
//!   PRE ───────▶ ROUTE ───────▶ POST ───────▶ DONE
//!    │             │ fail        ▲  │ fail      ▲
//!    │ fail        ▼      ok     │  │           │
//!    │          FALLBACK ────────┘  │           │
//!    │             │ none/fail      │           │
//!    ▼             ▼                ▼           │
//!   ERROR ◀────────┴────────────────┘───────────┘
//! ```
//!
//! - **PRE** failure goes straight to ERROR; route and post filters never run.
//! - **ROUTE** failure is offered to the fallback registry. A fallback
//!   response replaces whatever was attached and the request continues to
//!   POST, which runs against it.
//! - **POST** failure discards any attached response.
//! - **ERROR** builds the fixed 500 response and increments the failure
//!   counter for the phase the failure originated in.
//!
//! Once DONE is reached the access log record is written with the final
//! status, whichever path led there.

use crate::access_log::AccessLogEntry;
use crate::executor::PhaseExecutor;
use crate::fallback::{FallbackProvider, FallbackRegistry};
use crate::filter::{BoxedFilter, Filter};
use crate::responder::{set_request_id, ErrorResponder, REQUEST_ID_HEADER};
use portico_core::{FailureCause, Phase, Request, RequestContext, RequestId, Response};
use portico_telemetry::FailureMetrics;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

/// Pipeline states.
#[derive(Debug)]
enum PipelineState {
    Pre,
    Route,
    Fallback(FailureCause),
    Post,
    Error(FailureCause),
    Done,
}

/// The PRE → ROUTE → POST filter pipeline.
///
/// A pipeline is built once and shared by all requests; every request gets
/// its own [`RequestContext`]. The only state shared between requests is
/// the [`FailureMetrics`] counter.
///
/// # Example
///
/// ```
/// use portico_filters::{FilterError, FnFilter, Phase, Pipeline};
/// use portico_telemetry::FailureMetrics;
/// use std::sync::Arc;
///
/// let metrics = Arc::new(FailureMetrics::new());
/// let pipeline = Pipeline::builder()
///     .filter(FnFilter::new("fail_pre", Phase::Pre, i32::MIN, |_| {
///         Err(FilterError::failed("failing on purpose in pre"))
///     }))
///     .metrics(Arc::clone(&metrics))
///     .build();
///
/// assert_eq!(pipeline.filter_names(Phase::Pre), vec!["fail_pre"]);
/// ```
pub struct Pipeline {
    pre: PhaseExecutor,
    route: PhaseExecutor,
    post: PhaseExecutor,
    fallbacks: FallbackRegistry,
    responder: ErrorResponder,
    metrics: Arc<FailureMetrics>,
    access_log: bool,
}

impl Pipeline {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Handles one request end to end.
    ///
    /// A valid UUID in the inbound `x-request-id` header is reused as the
    /// request ID; otherwise a new one is generated. The response always
    /// carries `x-request-id`.
    pub async fn handle(&self, request: Request) -> Response {
        let request_id = request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value).ok())
            .map_or_else(RequestId::new, RequestId::from_uuid);

        self.run(RequestContext::with_request_id(request, request_id))
            .await
    }

    /// Runs the state machine over an existing context.
    pub async fn run(&self, mut ctx: RequestContext) -> Response {
        let span = tracing::info_span!(
            "request",
            request_id = %ctx.request_id(),
            method = %ctx.request().method(),
            path = %ctx.path(),
        );

        async move {
            let mut state = PipelineState::Pre;
            loop {
                state = match state {
                    PipelineState::Pre => match self.pre.execute(&mut ctx).await {
                        Ok(()) => PipelineState::Route,
                        Err(cause) => PipelineState::Error(cause),
                    },
                    PipelineState::Route => match self.route.execute(&mut ctx).await {
                        Ok(()) => {
                            if !ctx.has_response() {
                                tracing::debug!("Route phase attached no response");
                                let not_found = self.responder.not_found(ctx.request_id());
                                ctx.replace_response(not_found);
                            }
                            PipelineState::Post
                        }
                        Err(cause) => PipelineState::Fallback(cause),
                    },
                    PipelineState::Fallback(cause) => {
                        match self.fallbacks.recover(ctx.route(), &cause) {
                            Ok(response) => {
                                tracing::info!(
                                    route = ctx.route().unwrap_or("-"),
                                    status = response.status().as_u16(),
                                    "Fallback response substituted"
                                );
                                ctx.replace_response(response);
                                PipelineState::Post
                            }
                            Err(escalated) => PipelineState::Error(escalated),
                        }
                    }
                    PipelineState::Post => match self.post.execute(&mut ctx).await {
                        Ok(()) => PipelineState::Done,
                        Err(cause) => PipelineState::Error(cause),
                    },
                    PipelineState::Error(cause) => {
                        self.fail(&mut ctx, &cause);
                        PipelineState::Done
                    }
                    PipelineState::Done => break,
                };
            }

            let request_id = ctx.request_id();
            if !ctx.has_response() {
                ctx.replace_response(self.responder.not_found(request_id));
            }
            let entry = self.access_log.then(|| AccessLogEntry::from_context(&ctx));

            let mut response = ctx
                .into_response()
                .unwrap_or_else(|| self.responder.not_found(request_id));
            set_request_id(&mut response, request_id);
            if let Some(entry) = entry {
                entry.emit();
                response.extensions_mut().insert(entry);
            }
            response
        }
        .instrument(span)
        .await
    }

    /// Ends the request with the error response and counts the failure.
    fn fail(&self, ctx: &mut RequestContext, cause: &FailureCause) {
        let response = self.responder.build(ctx.request_id(), cause);
        let status = response.status().as_u16();
        let count = self.metrics.record(cause.phase(), status);

        tracing::error!(
            phase = %cause.phase(),
            kind = cause.kind().as_str(),
            filter = cause.filter().unwrap_or("-"),
            route = ctx.route().unwrap_or("-"),
            error = %cause.error(),
            status,
            count,
            "Request failed"
        );
        ctx.end_with_error(response);
    }

    /// Returns the filter names of `phase` in execution order.
    #[must_use]
    pub fn filter_names(&self, phase: Phase) -> Vec<&str> {
        self.executor(phase).filter_names()
    }

    /// Returns the registered fallback providers.
    #[must_use]
    pub fn fallbacks(&self) -> &FallbackRegistry {
        &self.fallbacks
    }

    /// Returns the failure counters this pipeline records into.
    #[must_use]
    pub fn metrics(&self) -> &Arc<FailureMetrics> {
        &self.metrics
    }

    /// Returns true if every response gets an access log record.
    #[must_use]
    pub fn access_log_enabled(&self) -> bool {
        self.access_log
    }

    fn executor(&self, phase: Phase) -> &PhaseExecutor {
        match phase {
            Phase::Pre => &self.pre,
            Phase::Route => &self.route,
            Phase::Post => &self.post,
        }
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("pre", &self.pre)
            .field("route", &self.route)
            .field("post", &self.post)
            .field("fallbacks", &self.fallbacks)
            .field("access_log", &self.access_log)
            .finish_non_exhaustive()
    }
}

/// Builder for constructing a [`Pipeline`].
///
/// Filters and fallback providers are kept in registration order, which
/// breaks ties between filters of equal order and between wildcard
/// fallbacks.
pub struct PipelineBuilder {
    filters: Vec<BoxedFilter>,
    fallbacks: FallbackRegistry,
    responder: ErrorResponder,
    metrics: Option<Arc<FailureMetrics>>,
    access_log: bool,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            fallbacks: FallbackRegistry::new(),
            responder: ErrorResponder::default(),
            metrics: None,
            access_log: true,
        }
    }
}

impl PipelineBuilder {
    /// Creates an empty builder with the access log on.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a filter.
    #[must_use]
    pub fn filter<F: Filter>(self, filter: F) -> Self {
        self.boxed_filter(Arc::new(filter))
    }

    /// Registers an already shared filter.
    #[must_use]
    pub fn boxed_filter(mut self, filter: BoxedFilter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Registers a fallback provider.
    #[must_use]
    pub fn fallback<P: FallbackProvider>(mut self, provider: P) -> Self {
        self.fallbacks.register(Arc::new(provider));
        self
    }

    /// Sets the error responder.
    #[must_use]
    pub fn responder(mut self, responder: ErrorResponder) -> Self {
        self.responder = responder;
        self
    }

    /// Sets the failure counters; defaults to [`FailureMetrics::global`].
    #[must_use]
    pub fn metrics(mut self, metrics: Arc<FailureMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Turns the per-request access log on or off.
    #[must_use]
    pub fn access_log(mut self, enabled: bool) -> Self {
        self.access_log = enabled;
        self
    }

    /// Builds the pipeline.
    #[must_use]
    pub fn build(self) -> Pipeline {
        Pipeline {
            pre: PhaseExecutor::new(Phase::Pre, &self.filters),
            route: PhaseExecutor::new(Phase::Route, &self.filters),
            post: PhaseExecutor::new(Phase::Post, &self.filters),
            fallbacks: self.fallbacks,
            responder: self.responder,
            metrics: self.metrics.unwrap_or_else(FailureMetrics::global),
            access_log: self.access_log,
        }
    }
}
