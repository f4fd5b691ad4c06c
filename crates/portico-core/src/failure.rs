//! Structured failure records.

use crate::error::FilterError;
use crate::phase::Phase;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Classification of a failure for propagation decisions.
///
/// | Kind | Raised by | Recoverable |
/// |------|-----------|-------------|
/// | `FilterFailure` | a `pre` or `post` filter | never |
/// | `RouteFailure` | a `route` filter | by a fallback provider |
/// | `FallbackFailure` | a route failure no provider could absorb | never |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A pre or post filter failed.
    FilterFailure,
    /// The route phase failed.
    RouteFailure,
    /// No fallback matched, or the matching fallback itself failed.
    FallbackFailure,
}

impl FailureKind {
    /// Returns the kind a fresh failure in `phase` starts with.
    #[must_use]
    pub const fn for_phase(phase: Phase) -> Self {
        match phase {
            Phase::Route => Self::RouteFailure,
            Phase::Pre | Phase::Post => Self::FilterFailure,
        }
    }

    /// Returns the kind name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FilterFailure => "filter_failure",
            Self::RouteFailure => "route_failure",
            Self::FallbackFailure => "fallback_failure",
        }
    }
}

/// Which phase and filter failed, why, and when.
///
/// A `FailureCause` is created by the phase executor the moment a filter
/// fails and is never mutated afterwards; [`escalate`](Self::escalate)
/// produces a new value. It is cheap to clone: the underlying error is
/// shared.
///
/// # Example
///
/// ```
/// use portico_core::{FailureCause, FailureKind, FilterError, Phase};
///
/// let cause = FailureCause::new(Phase::Route, FilterError::upstream("connection refused"))
///     .with_filter("forwarding");
///
/// assert_eq!(cause.phase(), Phase::Route);
/// assert_eq!(cause.filter(), Some("forwarding"));
/// assert_eq!(cause.kind(), FailureKind::RouteFailure);
/// ```
#[derive(Debug, Clone)]
pub struct FailureCause {
    phase: Phase,
    kind: FailureKind,
    filter: Option<String>,
    error: Arc<FilterError>,
    occurred_at: DateTime<Utc>,
}

impl FailureCause {
    /// Creates a failure for `phase`, timestamped now.
    #[must_use]
    pub fn new(phase: Phase, error: FilterError) -> Self {
        Self {
            phase,
            kind: FailureKind::for_phase(phase),
            filter: None,
            error: Arc::new(error),
            occurred_at: Utc::now(),
        }
    }

    /// Names the filter that failed.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Marks a route failure as unrecoverable by any fallback.
    ///
    /// The phase is left untouched so the failure is still accounted
    /// against the phase it originated in.
    #[must_use]
    pub fn escalate(mut self) -> Self {
        self.kind = FailureKind::FallbackFailure;
        self
    }

    /// The phase the failure originated in.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The failure classification.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    /// The name of the failing filter, if known.
    #[must_use]
    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    /// The underlying error.
    #[must_use]
    pub fn error(&self) -> &FilterError {
        &self.error
    }

    /// When the failure was captured.
    #[must_use]
    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.filter {
            Some(filter) => write!(f, "{} filter '{}' failed: {}", self.phase, filter, self.error),
            None => write!(f, "{} phase failed: {}", self.phase, self.error),
        }
    }
}

impl std::error::Error for FailureCause {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.error.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_kind_for_phase() {
        assert_eq!(FailureKind::for_phase(Phase::Pre), FailureKind::FilterFailure);
        assert_eq!(FailureKind::for_phase(Phase::Route), FailureKind::RouteFailure);
        assert_eq!(FailureKind::for_phase(Phase::Post), FailureKind::FilterFailure);
    }

    #[test]
    fn test_escalate_keeps_phase() {
        let cause = FailureCause::new(Phase::Route, FilterError::upstream("down")).escalate();
        assert_eq!(cause.phase(), Phase::Route);
        assert_eq!(cause.kind(), FailureKind::FallbackFailure);
    }

    #[test]
    fn test_display_with_and_without_filter() {
        let cause = FailureCause::new(Phase::Pre, FilterError::failed("nope"));
        assert_eq!(cause.to_string(), "pre phase failed: Filter failed: nope");

        let cause = cause.with_filter("auth");
        assert_eq!(cause.to_string(), "pre filter 'auth' failed: Filter failed: nope");
    }

    #[test]
    fn test_clone_shares_error() {
        let cause = FailureCause::new(Phase::Post, FilterError::failed("x"));
        let copy = cause.clone();
        assert!(std::ptr::eq(cause.error(), copy.error()));
        assert_eq!(cause.occurred_at(), copy.occurred_at());
        assert!(copy.source().is_some());
    }
}
