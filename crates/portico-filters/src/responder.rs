//! Error responses for unrecovered failures.
//!
//! Every failure that is not absorbed by a fallback ends the request with the
//! same response: HTTP 500 with a JSON error envelope.
//!
//! ```json
//! {
//!   "error": {
//!     "code": "INTERNAL_ERROR",
//!     "message": "An internal error occurred"
//!   }
//! }
//! ```
//!
//! The failure itself never reaches the body unless
//! [`expose_internal_errors`](ErrorResponder::expose_internal_errors) is
//! enabled, which adds a `detail` field for development use.

use http::{header, HeaderValue, StatusCode};
use portico_core::{FailureCause, RequestId, Response, ResponseExt};

/// Message used when none is configured.
pub const DEFAULT_ERROR_MESSAGE: &str = "An internal error occurred";

/// Header carrying the request ID on pipeline responses.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Builds the final response for unrecovered failures and unrouted requests.
#[derive(Debug, Clone)]
pub struct ErrorResponder {
    /// Whether to include the failure description in the body.
    expose_internal_errors: bool,
    /// Message sent to clients.
    internal_error_message: String,
}

impl Default for ErrorResponder {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorResponder {
    /// Creates a responder with the default message and no internal details.
    #[must_use]
    pub fn new() -> Self {
        Self {
            expose_internal_errors: false,
            internal_error_message: DEFAULT_ERROR_MESSAGE.to_string(),
        }
    }

    /// Sets whether the failure description is included in the body.
    ///
    /// **Warning**: Only enable this in development environments.
    #[must_use]
    pub fn expose_internal_errors(mut self, expose: bool) -> Self {
        self.expose_internal_errors = expose;
        self
    }

    /// Sets the message sent to clients.
    #[must_use]
    pub fn internal_error_message(mut self, message: impl Into<String>) -> Self {
        self.internal_error_message = message.into();
        self
    }

    /// The status every error response carries.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    /// Builds the error response for `cause`.
    #[must_use]
    pub fn build(&self, request_id: RequestId, cause: &FailureCause) -> Response {
        let mut error = serde_json::json!({
            "code": "INTERNAL_ERROR",
            "message": self.internal_error_message,
        });
        if self.expose_internal_errors {
            error["detail"] = serde_json::Value::String(cause.to_string());
        }

        let mut response = Response::json(self.status(), &serde_json::json!({ "error": error }));
        set_request_id(&mut response, request_id);
        response
    }

    /// Builds the response for a request no route matched.
    #[must_use]
    pub fn not_found(&self, request_id: RequestId) -> Response {
        let mut response = Response::json_error(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "No route matches the request path",
        );
        set_request_id(&mut response, request_id);
        response
    }
}

/// Sets the `x-request-id` header on `response`.
pub fn set_request_id(response: &mut Response, request_id: RequestId) {
    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
}

/// Returns true if `response` carries the JSON content type.
#[must_use]
pub fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .is_some_and(|value| value.as_bytes().starts_with(b"application/json"))
}
