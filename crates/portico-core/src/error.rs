//! Error types returned by filters and fallback providers.
//!
//! [`FilterError`] is what a filter's `run` returns when it cannot complete.
//! The pipeline never lets one escape to the client: it is wrapped in a
//! [`FailureCause`](crate::FailureCause), logged, counted, and turned into a
//! fixed error response.

use std::any::Any;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using [`FilterError`].
pub type FilterResult<T> = Result<T, FilterError>;

/// Errors raised while running a filter or a fallback provider.
///
/// # Example
///
/// ```
/// use portico_core::{FilterError, FilterResult};
///
/// fn check_header(value: Option<&str>) -> FilterResult<()> {
///     if value.is_none() {
///         return Err(FilterError::failed("missing x-tenant header"));
///     }
///     Ok(())
/// }
///
/// assert!(check_header(None).is_err());
/// ```
#[derive(Error, Debug)]
pub enum FilterError {
    /// A filter rejected or could not process the request.
    #[error("Filter failed: {message}")]
    Failed {
        /// Human-readable error message.
        message: String,
    },

    /// The backend call made during the route phase failed.
    #[error("Upstream error: {message}")]
    Upstream {
        /// Human-readable error message.
        message: String,
    },

    /// The backend call did not complete in time.
    #[error("Upstream timed out after {timeout_ms}ms")]
    Timeout {
        /// The timeout that elapsed, in milliseconds.
        timeout_ms: u64,
    },

    /// A filter tried to attach a response after one was already attached.
    #[error("A response has already been attached to this request")]
    ResponseAlreadySet,

    /// A filter, predicate or fallback provider panicked.
    #[error("Panicked: {message}")]
    Panicked {
        /// The panic payload, when it was a string.
        message: String,
    },

    /// Any other error propagated from filter code.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FilterError {
    /// Creates a generic filter failure.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    /// Creates an upstream transport failure.
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
        }
    }

    /// Creates a timeout failure.
    pub fn timeout(timeout: Duration) -> Self {
        Self::Timeout {
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Converts a caught panic payload into an error.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::Panicked { message }
    }

    /// Returns a short category name for logs.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Failed { .. } => "filter",
            Self::Upstream { .. } => "upstream",
            Self::Timeout { .. } => "timeout",
            Self::ResponseAlreadySet => "response_already_set",
            Self::Panicked { .. } => "panic",
            Self::Other(_) => "other",
        }
    }
}
