//! End-to-end pipeline integration tests.
//!
//! These tests drive complete requests through PRE → ROUTE → POST and check
//! the response, which filters ran, and the failure counters:
//!
//! 1. PRE failure - 500, counted as `pre`, nothing else runs
//! 2. ROUTE failure with fallback - fallback response, POST still runs
//! 3. ROUTE failure without fallback - 500, counted as `route`
//! 4. POST failure - 500 replaces the response, counted as `post`
//! 5. Access log - one record per request with the final status

use bytes::Bytes;
use http::{Request as HttpRequest, StatusCode};
use http_body_util::{BodyExt, Full};
use portico_filters::{
    stages::RouteResolutionFilter, AccessLogEntry, FallbackRegistry, FilterError, FnFallback,
    FnFilter, Phase, Pipeline, PipelineBuilder, ProxyTarget, Request, RequestContext, Response,
    Route, RouteTable, StaticFallback, ANY_ROUTE,
};
use portico_telemetry::FailureMetrics;
use std::sync::{Arc, Mutex};

/// Names of the filters that ran, in order.
#[derive(Clone, Default)]
struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    fn filter(&self, name: &'static str, phase: Phase, order: i32) -> FnFilter {
        let journal = self.clone();
        FnFilter::new(name, phase, order, move |_ctx| {
            journal.0.lock().unwrap().push(name.to_string());
            Ok(())
        })
    }

    fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    fn contains(&self, name: &str) -> bool {
        self.entries().iter().any(|entry| entry == name)
    }
}

/// Creates a test request.
fn make_request(uri: &str) -> Request {
    HttpRequest::builder()
        .uri(uri)
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// Collects a response body as a string.
async fn body_string(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// A route filter standing in for the upstream call.
fn upstream_ok(journal: &Journal) -> FnFilter {
    let journal = journal.clone();
    FnFilter::new("upstream", Phase::Route, 100, move |ctx| {
        journal.0.lock().unwrap().push("upstream".to_string());
        ctx.set_response(
            http::Response::builder()
                .status(StatusCode::OK)
                .body(Full::new(Bytes::from("upstream body")))
                .unwrap(),
        )
    })
}

/// Filters failing on demand, one per phase, ahead of everything else.
fn failure_filters(builder: PipelineBuilder) -> PipelineBuilder {
    builder
        .filter(
            FnFilter::new("fail_pre", Phase::Pre, i32::MIN, |_| {
                Err(FilterError::failed("failing on purpose in pre"))
            })
            .when(|ctx| ctx.query_param("failpre").is_some()),
        )
        .filter(
            FnFilter::new("fail_route", Phase::Route, i32::MIN, |_| {
                Err(FilterError::failed("failing on purpose in route"))
            })
            .when(|ctx| ctx.query_param("failroute").is_some()),
        )
        .filter(
            FnFilter::new("fail_post", Phase::Post, i32::MIN, |_| {
                Err(FilterError::failed("failing on purpose in post"))
            })
            .when(|ctx| ctx.query_param("failpost").is_some()),
        )
}

/// Route table with the `filtertest` route and no fallback.
fn filtertest_routes() -> Arc<RouteTable> {
    Arc::new(RouteTable::new(vec![Route::new(
        "filtertest",
        "/filtertest/**",
        "http://127.0.0.1:9",
    )]))
}

/// Builds the standard test pipeline.
fn build_pipeline(journal: &Journal, metrics: &Arc<FailureMetrics>) -> PipelineBuilder {
    failure_filters(Pipeline::builder())
        .filter(RouteResolutionFilter::new(filtertest_routes()))
        .filter(journal.filter("pre_check", Phase::Pre, 10))
        .filter(upstream_ok(journal))
        .filter(journal.filter("post_decorate", Phase::Post, 10))
        .metrics(Arc::clone(metrics))
}

// ============================================================================
// Happy Path
// ============================================================================

#[tokio::test]
async fn test_successful_request_runs_every_phase() {
    let journal = Journal::default();
    let metrics = Arc::new(FailureMetrics::new());
    let pipeline = build_pipeline(&journal, &metrics).build();

    let response = pipeline.handle(make_request("/filtertest/get")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "upstream body");
    assert_eq!(journal.entries(), vec!["pre_check", "upstream", "post_decorate"]);
    assert_eq!(metrics.total(), 0);
}

// ============================================================================
// PRE Failures
// ============================================================================

#[tokio::test]
async fn test_pre_failure_skips_route_and_post() {
    let journal = Journal::default();
    let metrics = Arc::new(FailureMetrics::new());
    let pipeline = build_pipeline(&journal, &metrics).build();

    let response = pipeline.handle(make_request("/filtertest/get?failpre=true")).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(journal.entries().is_empty());
    assert_eq!(metrics.count_by_name("pre", 500).unwrap(), 1);
    assert_eq!(metrics.count_by_name("route", 500).unwrap(), 0);
    assert_eq!(metrics.count_by_name("post", 500).unwrap(), 0);
}

#[tokio::test]
async fn test_error_body_hides_internal_text() {
    let journal = Journal::default();
    let metrics = Arc::new(FailureMetrics::new());
    let pipeline = build_pipeline(&journal, &metrics).build();

    let response = pipeline.handle(make_request("/filtertest/get?failpre=true")).await;
    let body = body_string(response).await;

    assert!(!body.is_empty());
    assert!(!body.contains("on purpose"));
}

// ============================================================================
// ROUTE Failures
// ============================================================================

#[tokio::test]
async fn test_route_failure_without_fallback() {
    let journal = Journal::default();
    let metrics = Arc::new(FailureMetrics::new());
    let pipeline = build_pipeline(&journal, &metrics).build();

    let response = pipeline.handle(make_request("/filtertest/get?failroute=true")).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(metrics.count(Phase::Route, 500), 1);
    assert_eq!(metrics.count(Phase::Pre, 500), 0);
    assert_eq!(journal.entries(), vec!["pre_check"]);
}

#[tokio::test]
async fn test_route_failure_with_fallback_runs_post() {
    let journal = Journal::default();
    let metrics = Arc::new(FailureMetrics::new());
    let pipeline = build_pipeline(&journal, &metrics)
        .fallback(StaticFallback::new("filtertest", StatusCode::SERVICE_UNAVAILABLE, "fallback body"))
        .build();

    let response = pipeline.handle(make_request("/filtertest/get?failroute=true")).await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_string(response).await, "fallback body");
    assert!(journal.contains("post_decorate"));
    assert!(!journal.contains("upstream"));
    assert_eq!(metrics.count(Phase::Route, 500), 0);
}

#[tokio::test]
async fn test_post_filters_see_fallback_response() {
    let seen = Arc::new(Mutex::new(None));
    let seen_in_filter = Arc::clone(&seen);
    let metrics = Arc::new(FailureMetrics::new());

    let pipeline = failure_filters(Pipeline::builder())
        .filter(RouteResolutionFilter::new(filtertest_routes()))
        .filter(FnFilter::new("observe", Phase::Post, 0, move |ctx| {
            *seen_in_filter.lock().unwrap() = ctx.response().map(|r| r.status());
            Ok(())
        }))
        .fallback(StaticFallback::new(ANY_ROUTE, StatusCode::ACCEPTED, "queued"))
        .metrics(Arc::clone(&metrics))
        .build();

    pipeline.handle(make_request("/filtertest/get?failroute=true")).await;
    assert_eq!(*seen.lock().unwrap(), Some(StatusCode::ACCEPTED));
}

#[tokio::test]
async fn test_fallback_replaces_partial_response() {
    let metrics = Arc::new(FailureMetrics::new());
    let pipeline = Pipeline::builder()
        .filter(FnFilter::new("attach_then_fail", Phase::Route, 0, |ctx| {
            ctx.set_response(
                http::Response::builder()
                    .status(StatusCode::OK)
                    .body(Full::new(Bytes::from("partial")))
                    .unwrap(),
            )?;
            Err(FilterError::upstream("connection reset"))
        }))
        .fallback(StaticFallback::new(ANY_ROUTE, StatusCode::SERVICE_UNAVAILABLE, "fallback"))
        .metrics(Arc::clone(&metrics))
        .build();

    let response = pipeline.handle(make_request("/")).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_string(response).await, "fallback");
}

#[tokio::test]
async fn test_failing_fallback_counts_as_route() {
    let metrics = Arc::new(FailureMetrics::new());
    let journal = Journal::default();
    let pipeline = build_pipeline(&journal, &metrics)
        .fallback(FnFallback::new("filtertest", |_, _| {
            Err(FilterError::failed("fallback is down too"))
        }))
        .build();

    let response = pipeline.handle(make_request("/filtertest/get?failroute=true")).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(metrics.count(Phase::Route, 500), 1);
    assert!(!journal.contains("post_decorate"));
}

#[tokio::test]
async fn test_panicking_fallback_is_contained() {
    let metrics = Arc::new(FailureMetrics::new());
    let journal = Journal::default();
    let pipeline = build_pipeline(&journal, &metrics)
        .fallback(FnFallback::new(ANY_ROUTE, |_, _| panic!("fallback panicked")))
        .build();

    let response = pipeline.handle(make_request("/filtertest/get?failroute=true")).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(metrics.count(Phase::Route, 500), 1);
}

#[tokio::test]
async fn test_exact_fallback_beats_wildcard() {
    let metrics = Arc::new(FailureMetrics::new());
    let journal = Journal::default();
    let pipeline = build_pipeline(&journal, &metrics)
        .fallback(StaticFallback::new(ANY_ROUTE, StatusCode::BAD_GATEWAY, "any"))
        .fallback(StaticFallback::new("filtertest", StatusCode::SERVICE_UNAVAILABLE, "exact"))
        .build();

    let response = pipeline.handle(make_request("/filtertest/get?failroute=true")).await;
    assert_eq!(body_string(response).await, "exact");
}

// ============================================================================
// POST Failures
// ============================================================================

#[tokio::test]
async fn test_post_failure_discards_response() {
    let journal = Journal::default();
    let metrics = Arc::new(FailureMetrics::new());
    let pipeline = build_pipeline(&journal, &metrics).build();

    let response = pipeline.handle(make_request("/filtertest/get?failpost=true")).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_ne!(body_string(response).await, "upstream body");
    assert_eq!(metrics.count(Phase::Post, 500), 1);
    assert!(journal.contains("upstream"));
    assert!(!journal.contains("post_decorate"));
}

#[tokio::test]
async fn test_post_failure_after_fallback() {
    let journal = Journal::default();
    let metrics = Arc::new(FailureMetrics::new());
    let pipeline = build_pipeline(&journal, &metrics)
        .fallback(StaticFallback::new("filtertest", StatusCode::SERVICE_UNAVAILABLE, "fallback"))
        .build();

    let response = pipeline
        .handle(make_request("/filtertest/get?failroute=true&failpost=true"))
        .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(metrics.count(Phase::Post, 500), 1);
    assert_eq!(metrics.count(Phase::Route, 500), 0);
}

#[tokio::test]
async fn test_post_panic_is_contained() {
    let metrics = Arc::new(FailureMetrics::new());
    let pipeline = Pipeline::builder()
        .filter(FnFilter::new("panics", Phase::Post, 0, |_| panic!("post panicked")))
        .metrics(Arc::clone(&metrics))
        .build();

    let response = pipeline.handle(make_request("/")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(metrics.count(Phase::Post, 500), 1);
}

// ============================================================================
// Failure Scenario (failpre / failroute / failpost)
// ============================================================================

#[tokio::test]
async fn test_each_flag_counts_once_for_its_phase() {
    for (flag, phase) in [
        ("failpre", Phase::Pre),
        ("failroute", Phase::Route),
        ("failpost", Phase::Post),
    ] {
        let journal = Journal::default();
        let metrics = Arc::new(FailureMetrics::new());
        let pipeline = build_pipeline(&journal, &metrics).build();

        let uri = format!("/filtertest/get?{flag}=true");
        let response = pipeline.handle(make_request(&uri)).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR, "{flag}");
        assert_eq!(metrics.count(phase, 500), 1, "{flag}");
        assert_eq!(metrics.total(), 1, "{flag}");
    }
}

#[tokio::test]
async fn test_counts_are_stable_between_reads() {
    let journal = Journal::default();
    let metrics = Arc::new(FailureMetrics::new());
    let pipeline = build_pipeline(&journal, &metrics).build();

    pipeline.handle(make_request("/filtertest/get?failroute=true")).await;
    let first = metrics.count(Phase::Route, 500);
    let second = metrics.count(Phase::Route, 500);
    assert_eq!(first, second);

    pipeline.handle(make_request("/filtertest/get")).await;
    assert_eq!(metrics.count(Phase::Route, 500), first);
}

#[tokio::test]
async fn test_concurrent_requests_share_counters() {
    let journal = Journal::default();
    let metrics = Arc::new(FailureMetrics::new());
    let pipeline = Arc::new(build_pipeline(&journal, &metrics).build());

    let mut handles = Vec::new();
    for _ in 0..32 {
        let pipeline = Arc::clone(&pipeline);
        handles.push(tokio::spawn(async move {
            pipeline.handle(make_request("/filtertest/get?failpre=true")).await.status()
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    assert_eq!(metrics.count(Phase::Pre, 500), 32);
}

// ============================================================================
// Built-in Filters
// ============================================================================

#[tokio::test]
async fn test_unrouted_request_is_not_found() {
    let journal = Journal::default();
    let metrics = Arc::new(FailureMetrics::new());
    let pipeline = failure_filters(Pipeline::builder())
        .filter(RouteResolutionFilter::new(filtertest_routes()))
        .filter(FnFilter::new("forward", Phase::Route, 100, |ctx| {
            if ctx.has_extension::<ProxyTarget>() {
                return Err(FilterError::upstream("unexpected forward"));
            }
            Ok(())
        }))
        .filter(journal.filter("post", Phase::Post, 0))
        .metrics(Arc::clone(&metrics))
        .build();

    let response = pipeline.handle(make_request("/not-a-route")).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(journal.contains("post"));
    assert_eq!(metrics.total(), 0);
}

// ============================================================================
// Access Log
// ============================================================================

/// Returns the access log record attached to a response.
fn access_log(response: &Response) -> AccessLogEntry {
    response
        .extensions()
        .get::<AccessLogEntry>()
        .cloned()
        .expect("response carries an access log record")
}

#[tokio::test]
async fn test_access_log_records_final_status() {
    let journal = Journal::default();
    let metrics = Arc::new(FailureMetrics::new());
    let pipeline = build_pipeline(&journal, &metrics).build();

    let response = pipeline.handle(make_request("/filtertest/get?a=1")).await;

    let entry = access_log(&response);
    assert_eq!(entry.route, "filtertest");
    assert_eq!(entry.method, "GET");
    assert_eq!(entry.path, "/filtertest/get");
    assert_eq!(entry.status, 200);
}

#[tokio::test]
async fn test_access_log_records_failed_requests() {
    for flag in ["failpre", "failroute", "failpost"] {
        let journal = Journal::default();
        let metrics = Arc::new(FailureMetrics::new());
        let pipeline = build_pipeline(&journal, &metrics).build();

        let response = pipeline
            .handle(make_request(&format!("/filtertest/get?{flag}=true")))
            .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR, "{flag}");
        let entry = access_log(&response);
        assert_eq!(entry.status, 500, "{flag}");
        assert_eq!(entry.path, "/filtertest/get", "{flag}");
        assert_eq!(metrics.total(), 1, "{flag}");
    }
}

#[tokio::test]
async fn test_access_log_records_escalated_route_failure() {
    let journal = Journal::default();
    let metrics = Arc::new(FailureMetrics::new());
    let pipeline = build_pipeline(&journal, &metrics)
        .fallback(FnFallback::new("filtertest", |_, _| {
            Err(FilterError::failed("fallback unavailable"))
        }))
        .build();

    let response = pipeline
        .handle(make_request("/filtertest/get?failroute=true"))
        .await;

    assert!(!journal.contains("post_decorate"));
    let entry = access_log(&response);
    assert_eq!(entry.route, "filtertest");
    assert_eq!(entry.status, 500);
    assert_eq!(metrics.count(Phase::Route, 500), 1);
}

#[tokio::test]
async fn test_access_log_records_unrouted_not_found() {
    let pipeline = Pipeline::builder()
        .metrics(Arc::new(FailureMetrics::new()))
        .build();

    let response = pipeline.handle(make_request("/nowhere")).await;

    let entry = access_log(&response);
    assert_eq!(entry.route, "unrouted");
    assert_eq!(entry.status, 404);
}

#[tokio::test]
async fn test_access_log_can_be_disabled() {
    let journal = Journal::default();
    let metrics = Arc::new(FailureMetrics::new());
    let pipeline = build_pipeline(&journal, &metrics).access_log(false).build();

    assert!(!pipeline.access_log_enabled());
    let response = pipeline.handle(make_request("/filtertest/get")).await;
    assert!(response.extensions().get::<AccessLogEntry>().is_none());
}

#[tokio::test]
async fn test_run_with_prepared_context() {
    let metrics = Arc::new(FailureMetrics::new());
    let pipeline = Pipeline::builder()
        .filter(FnFilter::new("needs_route", Phase::Pre, 0, |ctx| {
            if ctx.route() == Some("preset") {
                Ok(())
            } else {
                Err(FilterError::failed("route missing"))
            }
        }))
        .metrics(Arc::clone(&metrics))
        .build();

    let mut ctx = RequestContext::new(make_request("/"));
    ctx.set_route("preset");
    let response = pipeline.run(ctx).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(metrics.total(), 0);
}

#[test]
fn test_registry_is_reusable() {
    let mut registry = FallbackRegistry::new();
    registry.register(Arc::new(StaticFallback::new(ANY_ROUTE, StatusCode::OK, "")));
    let copy = registry.clone();
    assert_eq!(copy.len(), 1);
}
