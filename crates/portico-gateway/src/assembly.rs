//! Pipeline assembly from configuration.

use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use portico_config::{ConfigError, PorticoConfig};
use portico_filters::access_log;
use portico_filters::stages::{route_resolution, RouteResolutionFilter};
use portico_filters::{
    ErrorResponder, Pipeline, PipelineBuilder, Route, RouteTable, StaticFallback,
};
use portico_telemetry::FailureMetrics;

use crate::error::GatewayResult;
use crate::forward::{self, ForwardingFilter, ProxyClient};

/// Builds the route table in declaration order.
pub fn route_table(config: &PorticoConfig) -> RouteTable {
    RouteTable::new(
        config
            .routes
            .iter()
            .map(|(name, route)| {
                Route::new(name.clone(), route.path.clone(), route.url.clone())
                    .strip_prefix(route.strip_prefix)
            })
            .collect(),
    )
}

/// Returns a builder holding the built-in filters, static fallbacks and the
/// error responder described by `config`.
///
/// Built-in filters named in `filters.disabled` are left out, and
/// `access_log` there turns off the access log. Callers may add
/// their own filters and fallbacks before building.
///
/// # Errors
///
/// Returns an error if a fallback status is not a valid HTTP status or the
/// upstream client cannot be created.
pub fn pipeline_builder(
    config: &PorticoConfig,
    metrics: Arc<FailureMetrics>,
) -> GatewayResult<PipelineBuilder> {
    let disabled = &config.filters;
    let mut builder = Pipeline::builder()
        .metrics(metrics)
        .access_log(!disabled.is_disabled(access_log::NAME))
        .responder(
            ErrorResponder::new()
                .expose_internal_errors(config.errors.expose_internal_errors)
                .internal_error_message(config.errors.message.clone()),
        );

    if !disabled.is_disabled(route_resolution::NAME) {
        builder = builder.filter(RouteResolutionFilter::new(Arc::new(route_table(config))));
    }

    if !disabled.is_disabled(forward::NAME) {
        let client = ProxyClient::new(Duration::from_millis(config.server.request_timeout_ms))?;
        builder = builder.filter(ForwardingFilter::new(Arc::new(client)));
    }

    for (route, fallback) in &config.fallbacks {
        let status = StatusCode::from_u16(fallback.status).map_err(|_| {
            ConfigError::invalid_value(
                format!("fallbacks.{route}.status"),
                format!("{} is not a valid HTTP status", fallback.status),
            )
        })?;

        builder = builder.fallback(
            StaticFallback::new(route.clone(), status, fallback.body.clone())
                .content_type(fallback.content_type.clone()),
        );
    }

    Ok(builder)
}

/// Builds the pipeline described by `config`.
///
/// # Errors
///
/// See [`pipeline_builder`].
pub fn build_pipeline(
    config: &PorticoConfig,
    metrics: Arc<FailureMetrics>,
) -> GatewayResult<Pipeline> {
    Ok(pipeline_builder(config, metrics)?.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use portico_config::{FallbackConfig, FiltersConfig, RouteConfig};
    use portico_core::Phase;

    fn config() -> PorticoConfig {
        PorticoConfig::builder()
            .route("users", RouteConfig::new("/users/**", "http://127.0.0.1:9000"))
            .route(
                "health",
                RouteConfig {
                    strip_prefix: false,
                    ..RouteConfig::new("/health", "http://127.0.0.1:9001")
                },
            )
            .fallback("users", FallbackConfig::default())
            .fallback("*", FallbackConfig::default())
            .build()
    }

    #[test]
    fn test_route_table_keeps_declaration_order() {
        let table = route_table(&config());
        let ids: Vec<_> = table.routes().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["users", "health"]);
    }

    #[test]
    fn test_builtin_filters_installed() {
        let pipeline = build_pipeline(&config(), Arc::new(FailureMetrics::new())).unwrap();

        assert_eq!(pipeline.filter_names(Phase::Pre), vec!["route_resolution"]);
        assert_eq!(pipeline.filter_names(Phase::Route), vec!["forward"]);
        assert!(pipeline.filter_names(Phase::Post).is_empty());
        assert!(pipeline.access_log_enabled());
        assert_eq!(pipeline.fallbacks().len(), 2);
    }

    #[test]
    fn test_disabled_filters_skipped() {
        let mut config = config();
        config.filters = FiltersConfig {
            disabled: vec!["access_log".to_string(), "forward".to_string()],
        };

        let pipeline = build_pipeline(&config, Arc::new(FailureMetrics::new())).unwrap();
        assert!(pipeline.filter_names(Phase::Route).is_empty());
        assert!(!pipeline.access_log_enabled());
        assert_eq!(pipeline.filter_names(Phase::Pre), vec!["route_resolution"]);
    }

    #[test]
    fn test_invalid_fallback_status_rejected() {
        let mut config = config();
        config.fallbacks.insert(
            "health".to_string(),
            FallbackConfig {
                status: 42,
                ..Default::default()
            },
        );

        let result = build_pipeline(&config, Arc::new(FailureMetrics::new()));
        assert!(result.is_err());
    }
}
