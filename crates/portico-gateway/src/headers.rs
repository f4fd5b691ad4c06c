//! Header handling between clients and upstreams.
//!
//! Hop-by-hop headers are connection-scoped and never cross the gateway in
//! either direction. Upstream requests gain `X-Forwarded-*` headers and the
//! request ID.

use std::net::SocketAddr;

use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use portico_core::RequestId;

/// Header name for request ID.
pub static HEADER_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Header name for the original client address chain.
pub static HEADER_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Header name for the original `Host`.
pub static HEADER_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");

/// Header name for the original scheme.
pub static HEADER_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

/// Header name for the path prefix removed by the route.
pub static HEADER_FORWARDED_PREFIX: HeaderName = HeaderName::from_static("x-forwarded-prefix");

/// Hop-by-hop headers (RFC 9110 §7.6.1).
pub static HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Address of the client that sent a request.
///
/// The server stores it in the request's extensions for the forwarding
/// filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientAddr(pub SocketAddr);

/// Check if a header is hop-by-hop.
pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP_HEADERS
        .iter()
        .any(|hop| hop.eq_ignore_ascii_case(name))
}

/// Copies `headers`, dropping hop-by-hop headers, any header the
/// `Connection` header nominates, and `content-length`.
///
/// Bodies are re-framed by the gateway, so the length is recomputed.
pub fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let nominated: Vec<String> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect();

    let mut filtered = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if is_hop_by_hop(name.as_str())
            || name == header::CONTENT_LENGTH
            || nominated.iter().any(|n| n == name.as_str())
        {
            continue;
        }
        filtered.append(name.clone(), value.clone());
    }
    filtered
}

/// Builds the headers sent upstream for a client request.
///
/// `Host` is dropped so the client sets it for the upstream; the original
/// value travels in `X-Forwarded-Host`. The client address is appended to any
/// existing `X-Forwarded-For` chain.
pub fn upstream_headers(
    inbound: &HeaderMap,
    client: Option<ClientAddr>,
    stripped_prefix: Option<&str>,
    request_id: RequestId,
) -> HeaderMap {
    let mut headers = strip_hop_by_hop(inbound);
    headers.remove(header::HOST);

    if let Some(host) = inbound.get(header::HOST) {
        headers.insert(HEADER_FORWARDED_HOST.clone(), host.clone());
    }

    headers.insert(
        HEADER_FORWARDED_PROTO.clone(),
        HeaderValue::from_static("http"),
    );

    if let Some(ClientAddr(addr)) = client {
        let ip = addr.ip().to_string();
        let chain = match inbound
            .get(&HEADER_FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
        {
            Some(existing) if !existing.trim().is_empty() => format!("{existing}, {ip}"),
            _ => ip,
        };
        if let Ok(value) = HeaderValue::from_str(&chain) {
            headers.insert(HEADER_FORWARDED_FOR.clone(), value);
        }
    }

    if let Some(prefix) = stripped_prefix.filter(|p| !p.is_empty()) {
        if let Ok(value) = HeaderValue::from_str(prefix) {
            headers.insert(HEADER_FORWARDED_PREFIX.clone(), value);
        }
    }

    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        headers.insert(HEADER_REQUEST_ID.clone(), value);
    }

    headers
}

/// Builds the headers returned to the client from an upstream response.
pub fn downstream_headers(upstream: &HeaderMap) -> HeaderMap {
    strip_hop_by_hop(upstream)
}
