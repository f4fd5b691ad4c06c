//! Failure accounting and Prometheus metrics for Portico.
//!
//! Two kinds of counters live here:
//!
//! - [`FailureMetrics`], the in-process `(phase, status)` failure counter the
//!   pipeline records into and tests read back from.
//! - Prometheus series emitted through the `metrics` facade, rendered by the
//!   exporter installed with [`init_metrics`].
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `portico_filter_failures_total` | Counter | `phase`, `status` | Unrecovered pipeline failures |
//! | `portico_requests_total` | Counter | `route`, `status` | Completed requests |
//! | `portico_request_duration_seconds` | Histogram | `route` | Request latency |
//! | `portico_in_flight_requests` | Gauge | - | Requests currently in the pipeline |

use crate::error::TelemetryError;
use crate::TelemetryResult;
use dashmap::DashMap;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use portico_core::{ParsePhaseError, Phase};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Global Prometheus handle for rendering.
static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Process-wide failure counters.
static GLOBAL_FAILURES: OnceLock<Arc<FailureMetrics>> = OnceLock::new();

/// Key of a failure counter: the phase the failure originated in and the
/// status code sent to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FailureKey {
    /// Phase the failure originated in.
    pub phase: Phase,
    /// HTTP status code returned for the failure.
    pub status: u16,
}

impl FailureKey {
    /// Creates a key.
    #[must_use]
    pub const fn new(phase: Phase, status: u16) -> Self {
        Self { phase, status }
    }
}

impl fmt::Display for FailureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.phase, self.status)
    }
}

/// Monotonic `(phase, status)` failure counters, safe under concurrent use.
///
/// A counter is created the first time its key is recorded and only ever
/// grows afterwards. Production code shares the process-wide instance from
/// [`FailureMetrics::global`]; tests that want isolation build their own with
/// [`FailureMetrics::new`].
///
/// # Example
///
/// ```
/// use portico_core::Phase;
/// use portico_telemetry::FailureMetrics;
///
/// let metrics = FailureMetrics::new();
/// metrics.record(Phase::Route, 500);
///
/// assert_eq!(metrics.count(Phase::Route, 500), 1);
/// assert_eq!(metrics.count_by_name("route", 500).unwrap(), 1);
/// assert_eq!(metrics.count(Phase::Pre, 500), 0);
/// ```
#[derive(Debug, Default)]
pub struct FailureMetrics {
    counters: DashMap<FailureKey, AtomicU64>,
}

impl FailureMetrics {
    /// Creates an empty, independent set of counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide counters.
    #[must_use]
    pub fn global() -> Arc<Self> {
        Arc::clone(GLOBAL_FAILURES.get_or_init(|| Arc::new(Self::new())))
    }

    /// Increments the counter for `(phase, status)` and returns the new value.
    ///
    /// The matching `portico_filter_failures_total` Prometheus series is
    /// incremented as well.
    pub fn record(&self, phase: Phase, status: u16) -> u64 {
        let key = FailureKey::new(phase, status);
        let previous = match self.counters.get(&key) {
            Some(counter) => counter.fetch_add(1, Ordering::Relaxed),
            None => self
                .counters
                .entry(key)
                .or_default()
                .fetch_add(1, Ordering::Relaxed),
        };

        counter!(
            "portico_filter_failures_total",
            "phase" => phase.as_str(),
            "status" => status.to_string()
        )
        .increment(1);

        previous + 1
    }

    /// Returns the current count for `(phase, status)`; zero if never recorded.
    #[must_use]
    pub fn count(&self, phase: Phase, status: u16) -> u64 {
        self.counters
            .get(&FailureKey::new(phase, status))
            .map_or(0, |counter| counter.load(Ordering::Relaxed))
    }

    /// Returns the count for a phase given by name (`pre`, `route`, `post`).
    pub fn count_by_name(&self, phase: &str, status: u16) -> Result<u64, ParsePhaseError> {
        Ok(self.count(phase.parse()?, status))
    }

    /// Returns the sum of all counters.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counters
            .iter()
            .map(|entry| entry.value().load(Ordering::Relaxed))
            .sum()
    }

    /// Returns every counter, sorted by phase then status.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(FailureKey, u64)> {
        let mut entries: Vec<_> = self
            .counters
            .iter()
            .map(|entry| (*entry.key(), entry.value().load(Ordering::Relaxed)))
            .collect();
        entries.sort_by_key(|(key, _)| *key);
        entries
    }

    /// Drops every counter.
    ///
    /// Only available to test harnesses.
    #[cfg(any(test, feature = "test-util"))]
    pub fn reset(&self) {
        self.counters.clear();
    }
}

/// Metrics exporter configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Whether the Prometheus exporter is installed.
    pub enabled: bool,

    /// Histogram buckets for request duration, in seconds.
    pub duration_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            // 1ms .. 10s
            duration_buckets: vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ],
        }
    }
}

/// Installs the Prometheus recorder.
///
/// The rendered text is served by the gateway; no listener is started here.
///
/// # Errors
///
/// Returns `TelemetryError::MetricsInit` if the buckets are invalid or a
/// recorder is already installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .set_buckets(&config.duration_buckets)
        .map_err(|e| TelemetryError::metrics_init(e.to_string()))?
        .install_recorder()
        .map_err(|e| TelemetryError::metrics_init(e.to_string()))?;

    let _ = METRICS_HANDLE.set(handle);
    register_metric_descriptions();

    Ok(())
}

/// Renders metrics in Prometheus text format.
///
/// Returns `None` if the exporter is not installed.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

fn register_metric_descriptions() {
    describe_counter!(
        "portico_filter_failures_total",
        "Unrecovered pipeline failures by originating phase and status"
    );
    describe_counter!(
        "portico_requests_total",
        "Total number of requests completed by the pipeline"
    );
    describe_histogram!(
        "portico_request_duration_seconds",
        "Pipeline request duration in seconds"
    );
    describe_gauge!(
        "portico_in_flight_requests",
        "Number of requests currently in the pipeline"
    );
}

/// Records a completed request.
///
/// `route` is the resolved route name, or `"unrouted"` when none matched.
pub fn record_request(route: &str, status_code: u16, duration: Duration) {
    counter!(
        "portico_requests_total",
        "route" => route.to_string(),
        "status" => status_code.to_string()
    )
    .increment(1);

    histogram!(
        "portico_request_duration_seconds",
        "route" => route.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Keeps `portico_in_flight_requests` raised for as long as it lives.
pub struct InFlightGuard {
    _private: (),
}

impl InFlightGuard {
    /// Increments the in-flight gauge.
    #[must_use]
    pub fn new() -> Self {
        gauge!("portico_in_flight_requests").increment(1.0);
        Self { _private: () }
    }
}

impl Default for InFlightGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        gauge!("portico_in_flight_requests").decrement(1.0);
    }
}
