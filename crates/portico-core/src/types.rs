//! HTTP request and response types used at the pipeline boundary.
//!
//! Bodies are fully buffered: the gateway collects the inbound body before
//! the pipeline starts, and every response is built from a single `Bytes`.

use bytes::Bytes;
use http_body_util::Full;

/// The HTTP request type used by the pipeline.
///
/// This is a standard `http::Request` with a `Full<Bytes>` body.
pub type Request = http::Request<Full<Bytes>>;

/// The HTTP response type used by the pipeline.
///
/// This is a standard `http::Response` with a `Full<Bytes>` body.
pub type Response = http::Response<Full<Bytes>>;

/// Extension trait for building simple responses.
pub trait ResponseExt {
    /// Creates a plain-text response with the given status code and message.
    fn text(status: http::StatusCode, message: &str) -> Response;

    /// Creates a JSON error envelope response.
    fn json_error(status: http::StatusCode, code: &str, message: &str) -> Response;

    /// Creates a JSON response from a value.
    fn json(status: http::StatusCode, body: &serde_json::Value) -> Response;
}

impl ResponseExt for Response {
    fn text(status: http::StatusCode, message: &str) -> Response {
        http::Response::builder()
            .status(status)
            .header(http::header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(Full::new(Bytes::from(message.to_string())))
            .expect("failed to build text response")
    }

    fn json_error(status: http::StatusCode, code: &str, message: &str) -> Response {
        let body = serde_json::json!({
            "error": {
                "code": code,
                "message": message
            }
        });

        Self::json(status, &body)
    }

    fn json(status: http::StatusCode, body: &serde_json::Value) -> Response {
        http::Response::builder()
            .status(status)
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body.to_string())))
            .expect("failed to build JSON response")
    }
}
