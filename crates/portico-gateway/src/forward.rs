//! Upstream forwarding for the route phase.
//!
//! [`ForwardingFilter`] sends the client request to the [`ProxyTarget`]
//! chosen during the pre phase and attaches the upstream response. Transport
//! errors and timeouts fail the route phase, which hands the request to the
//! route's fallback. Upstream error statuses are ordinary responses.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::{HeaderMap, Method};
use http_body_util::{BodyExt, Full};
use portico_core::{FilterError, FilterResult, Phase, RequestContext, Response};
use portico_filters::{BoxFuture, Filter, ProxyTarget};
use reqwest::Client;
use tracing::debug;

use crate::error::{GatewayError, GatewayResult};
use crate::headers::{downstream_headers, upstream_headers, ClientAddr};

/// Filter name.
pub const NAME: &str = "forward";

/// Filter order within the route phase.
pub const ORDER: i32 = 100;

/// HTTP client for forwarding requests to upstreams.
#[derive(Debug, Clone)]
pub struct ProxyClient {
    client: Client,
    timeout: Duration,
}

impl ProxyClient {
    /// Create a client whose requests time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Client` if the TLS backend cannot be
    /// initialized.
    pub fn new(timeout: Duration) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(100)
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .build()
            .map_err(|e| GatewayError::client(format!("failed to create client: {e}")))?;

        Ok(Self { client, timeout })
    }

    /// Get the timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send one request and buffer the upstream response.
    ///
    /// # Errors
    ///
    /// Returns `FilterError::Timeout` when the upstream does not answer in
    /// time and `FilterError::Upstream` for any other transport error.
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        headers: HeaderMap,
        body: Bytes,
    ) -> FilterResult<Response> {
        let upstream = self
            .client
            .request(method, url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| self.map_error(url, &e))?;

        let status = upstream.status();
        let headers = downstream_headers(upstream.headers());
        let body = upstream
            .bytes()
            .await
            .map_err(|e| self.map_error(url, &e))?;

        let mut response = Response::new(Full::new(body));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }

    fn map_error(&self, url: &str, error: &reqwest::Error) -> FilterError {
        if error.is_timeout() {
            FilterError::timeout(self.timeout)
        } else {
            FilterError::upstream(format!("request to {url} failed: {error}"))
        }
    }
}

/// Route-phase filter that forwards routed requests upstream.
#[derive(Debug, Clone)]
pub struct ForwardingFilter {
    client: Arc<ProxyClient>,
}

impl ForwardingFilter {
    /// Create the filter over a shared client.
    pub fn new(client: Arc<ProxyClient>) -> Self {
        Self { client }
    }
}

impl Filter for ForwardingFilter {
    fn name(&self) -> &str {
        NAME
    }

    fn phase(&self) -> Phase {
        Phase::Route
    }

    fn order(&self) -> i32 {
        ORDER
    }

    fn should_run(&self, ctx: &RequestContext) -> bool {
        ctx.has_extension::<ProxyTarget>() && !ctx.has_response()
    }

    fn run<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, FilterResult<()>> {
        Box::pin(async move {
            let target = ctx
                .get_extension::<ProxyTarget>()
                .cloned()
                .ok_or_else(|| FilterError::failed("no proxy target for routed request"))?;

            let request = ctx.request();
            let method = request.method().clone();
            let headers = upstream_headers(
                request.headers(),
                request.extensions().get::<ClientAddr>().copied(),
                target.stripped_prefix.as_deref(),
                ctx.request_id(),
            );
            let body = match request.body().clone().collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(never) => match never {},
            };

            let started = Instant::now();
            let response = self.client.send(method, &target.url, headers, body).await?;

            debug!(
                route = %target.route,
                upstream = %target.url,
                status = response.status().as_u16(),
                duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                "Upstream responded"
            );

            ctx.set_response(response)
        })
    }
}
