//! Gateway HTTP server.
//!
//! One task per connection; each request body is buffered (up to
//! `server.max_body_bytes`) and handed to the filter pipeline. Paths under
//! `/_portico/` are served by the gateway itself and bypass the pipeline.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::{Request, StatusCode};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use portico_config::PorticoConfig;
use portico_core::{Response, ResponseExt};
use portico_filters::Pipeline;
use portico_telemetry::{render_metrics, FailureMetrics, InFlightGuard};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::assembly::build_pipeline;
use crate::error::{GatewayError, GatewayResult};
use crate::headers::ClientAddr;

/// Prefix of the gateway's own endpoints.
pub const INTERNAL_PREFIX: &str = "/_portico/";

/// Gateway server.
pub struct GatewayServer {
    config: Arc<PorticoConfig>,
    pipeline: Arc<Pipeline>,
}

impl GatewayServer {
    /// Create a server around an assembled pipeline.
    pub fn new(config: PorticoConfig, pipeline: Pipeline) -> Self {
        Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
        }
    }

    /// Create a server whose pipeline is built from `config`, counting
    /// failures in the process-wide metrics.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` if the pipeline cannot be assembled.
    pub fn from_config(config: PorticoConfig) -> GatewayResult<Self> {
        let pipeline = build_pipeline(&config, FailureMetrics::global())?;
        Ok(Self::new(config, pipeline))
    }

    /// The pipeline requests run through.
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Bind `server.http_addr` and serve until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` if the address is invalid or cannot be bound.
    pub async fn run(self) -> GatewayResult<()> {
        let addr: SocketAddr = self.config.server.http_addr.parse().map_err(|_| {
            portico_config::ConfigError::invalid_value(
                "server.http_addr",
                format!("invalid socket address: {}", self.config.server.http_addr),
            )
        })?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::bind(addr, e))?;

        self.serve_with_shutdown(listener, shutdown_signal()).await
    }

    /// Serve connections from `listener` until the process exits.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Io` if the listener's address cannot be read.
    pub async fn serve(self, listener: TcpListener) -> GatewayResult<()> {
        self.serve_with_shutdown(listener, std::future::pending::<()>())
            .await
    }

    /// Serve connections from `listener` until `signal` completes, then wait
    /// up to `server.shutdown_timeout_secs` for open connections to finish.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Io` if the listener's address cannot be read.
    pub async fn serve_with_shutdown<S>(self, listener: TcpListener, signal: S) -> GatewayResult<()>
    where
        S: Future<Output = ()> + Send,
    {
        let local_addr = listener.local_addr()?;
        info!(
            addr = %local_addr,
            routes = self.config.routes.len(),
            fallbacks = self.pipeline.fallbacks().len(),
            "Portico gateway listening"
        );

        let graceful = GracefulShutdown::new();
        tokio::pin!(signal);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer_addr) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                            continue;
                        }
                    };

                    let config = Arc::clone(&self.config);
                    let pipeline = Arc::clone(&self.pipeline);

                    let service = service_fn(move |req| {
                        let config = Arc::clone(&config);
                        let pipeline = Arc::clone(&pipeline);
                        async move { Ok::<_, Infallible>(handle_request(req, &config, &pipeline, peer_addr).await) }
                    });

                    let connection = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service);
                    let connection = graceful.watch(connection);

                    tokio::spawn(async move {
                        if let Err(e) = connection.await {
                            debug!(error = %e, peer = %peer_addr, "Connection error");
                        }
                    });
                }
                () = &mut signal => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        drop(listener);

        let timeout = Duration::from_secs(self.config.server.shutdown_timeout_secs);
        if tokio::time::timeout(timeout, graceful.shutdown()).await.is_err() {
            warn!(
                timeout_secs = timeout.as_secs(),
                "Connections still open after shutdown timeout"
            );
        }

        info!("Portico gateway stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

/// Handle one request.
async fn handle_request(
    req: Request<Incoming>,
    config: &PorticoConfig,
    pipeline: &Pipeline,
    peer_addr: SocketAddr,
) -> Response {
    if req.uri().path().starts_with(INTERNAL_PREFIX) {
        return internal_endpoint(req.uri().path(), pipeline.metrics());
    }

    let _in_flight = InFlightGuard::new();
    let (parts, body) = req.into_parts();

    let body = match read_body(body, config.server.max_body_bytes).await {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, path = %parts.uri.path(), "Rejecting request body");
            let status =
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::BAD_REQUEST);
            let code = if status == StatusCode::PAYLOAD_TOO_LARGE {
                "PAYLOAD_TOO_LARGE"
            } else {
                "BAD_REQUEST"
            };
            return Response::json_error(status, code, &e.to_string());
        }
    };

    let mut request = Request::from_parts(parts, Full::new(body));
    request.extensions_mut().insert(ClientAddr(peer_addr));

    pipeline.handle(request).await
}

/// Buffer a request body, failing once it exceeds `limit` bytes.
async fn read_body(body: Incoming, limit: usize) -> GatewayResult<Bytes> {
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            Err(GatewayError::BodyTooLarge { limit })
        }
        Err(e) => Err(GatewayError::body_read(e.to_string())),
    }
}

/// Serve the gateway's own endpoints.
fn internal_endpoint(path: &str, metrics: &FailureMetrics) -> Response {
    match path {
        "/_portico/health" => Response::json(
            StatusCode::OK,
            &serde_json::json!({
                "status": "ok",
                "version": crate::VERSION,
            }),
        ),
        "/_portico/failures" => {
            let failures: Vec<_> = metrics
                .snapshot()
                .into_iter()
                .map(|(key, count)| {
                    serde_json::json!({
                        "phase": key.phase,
                        "status": key.status,
                        "count": count,
                    })
                })
                .collect();

            Response::json(
                StatusCode::OK,
                &serde_json::json!({
                    "total": metrics.total(),
                    "failures": failures,
                }),
            )
        }
        "/_portico/metrics" => match render_metrics() {
            Some(text) => {
                let mut response = Response::text(StatusCode::OK, &text);
                response.headers_mut().insert(
                    http::header::CONTENT_TYPE,
                    http::HeaderValue::from_static("text/plain; version=0.0.4"),
                );
                response
            }
            None => Response::json_error(
                StatusCode::SERVICE_UNAVAILABLE,
                "METRICS_DISABLED",
                "metrics exporter is not installed",
            ),
        },
        _ => Response::json_error(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            &format!("unknown internal endpoint: {path}"),
        ),
    }
}
