//! Route table: maps request paths to named upstream routes.
//!
//! A route pattern ending in `/**` matches its prefix and everything below
//! it; any other pattern matches the path exactly. Routes are tried in
//! declaration order and the first match wins.

use serde::Serialize;

/// Pattern suffix matching a prefix and everything below it.
const WILDCARD_SUFFIX: &str = "/**";

/// A named upstream route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Route {
    /// Route name, used as the fallback key and in metrics.
    pub id: String,
    /// Path pattern, e.g. `/filtertest/**`.
    pub path: String,
    /// Upstream base URL, e.g. `http://127.0.0.1:8081`.
    pub url: String,
    /// Whether the matched prefix is removed before forwarding.
    pub strip_prefix: bool,
}

impl Route {
    /// Creates a route that strips its prefix.
    pub fn new(id: impl Into<String>, path: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            url: url.into(),
            strip_prefix: true,
        }
    }

    /// Sets whether the matched prefix is removed before forwarding.
    #[must_use]
    pub fn strip_prefix(mut self, strip: bool) -> Self {
        self.strip_prefix = strip;
        self
    }

    /// Returns the prefix of a `/**` pattern.
    fn prefix(&self) -> Option<&str> {
        self.path.strip_suffix(WILDCARD_SUFFIX)
    }

    /// Returns true if the route matches `path`.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        match self.prefix() {
            Some("") => true,
            Some(prefix) => {
                path == prefix
                    || path
                        .strip_prefix(prefix)
                        .is_some_and(|rest| rest.starts_with('/'))
            }
            None => path == self.path,
        }
    }

    /// Builds the forwarding target for a request matching this route.
    fn target(&self, path: &str, query: Option<&str>) -> ProxyTarget {
        let (forwarded, stripped) = match self.prefix() {
            Some(prefix) if self.strip_prefix && !prefix.is_empty() => {
                let rest = &path[prefix.len()..];
                let rest = if rest.is_empty() { "/" } else { rest };
                (rest.to_string(), Some(prefix.to_string()))
            }
            _ => (path.to_string(), None),
        };

        let mut url = format!("{}{}", self.url.trim_end_matches('/'), forwarded);
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(query);
        }

        ProxyTarget {
            route: self.id.clone(),
            url,
            stripped_prefix: stripped,
        }
    }
}

/// Where a routed request is forwarded to.
///
/// Stored as a request-context extension by the route-resolution filter and
/// read by the forwarding filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyTarget {
    /// Route name.
    pub route: String,
    /// Full upstream URL, including path and query.
    pub url: String,
    /// The prefix removed from the path, if any.
    pub stripped_prefix: Option<String>,
}

/// Ordered collection of routes.
///
/// # Example
///
/// ```
/// use portico_filters::{Route, RouteTable};
///
/// let table = RouteTable::new(vec![
///     Route::new("filtertest", "/filtertest/**", "http://127.0.0.1:8081"),
/// ]);
///
/// let target = table.resolve("/filtertest/get", Some("a=1")).unwrap();
/// assert_eq!(target.route, "filtertest");
/// assert_eq!(target.url, "http://127.0.0.1:8081/get?a=1");
/// ```
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Creates a table; routes are tried in the given order.
    #[must_use]
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    /// Returns the routes in match order.
    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Returns true if the table has no routes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Returns the first route matching `path`.
    #[must_use]
    pub fn find(&self, path: &str) -> Option<&Route> {
        self.routes.iter().find(|route| route.matches(path))
    }

    /// Resolves `path` to a forwarding target.
    #[must_use]
    pub fn resolve(&self, path: &str, query: Option<&str>) -> Option<ProxyTarget> {
        self.find(path).map(|route| route.target(path, query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RouteTable {
        RouteTable::new(vec![
            Route::new("filtertest", "/filtertest/**", "http://localhost:8081"),
            Route::new("health", "/status", "http://localhost:8082/"),
            Route::new("legacy", "/legacy/**", "http://localhost:8083").strip_prefix(false),
        ])
    }

    #[test]
    fn test_wildcard_match() {
        let route = Route::new("a", "/api/**", "http://x");
        assert!(route.matches("/api"));
        assert!(route.matches("/api/"));
        assert!(route.matches("/api/users/1"));
        assert!(!route.matches("/apis"));
        assert!(!route.matches("/other"));
    }

    #[test]
    fn test_exact_match() {
        let route = Route::new("s", "/status", "http://x");
        assert!(route.matches("/status"));
        assert!(!route.matches("/status/deep"));
    }

    #[test]
    fn test_root_wildcard_matches_everything() {
        let route = Route::new("all", "/**", "http://x");
        assert!(route.matches("/"));
        assert!(route.matches("/anything/at/all"));
    }

    #[test]
    fn test_resolve_strips_prefix_and_keeps_query() {
        let target = table().resolve("/filtertest/get", Some("failroute=true")).unwrap();
        assert_eq!(target.route, "filtertest");
        assert_eq!(target.url, "http://localhost:8081/get?failroute=true");
        assert_eq!(target.stripped_prefix.as_deref(), Some("/filtertest"));
    }

    #[test]
    fn test_resolve_bare_prefix_forwards_root() {
        let target = table().resolve("/filtertest", None).unwrap();
        assert_eq!(target.url, "http://localhost:8081/");
    }

    #[test]
    fn test_resolve_exact_route_keeps_path() {
        let target = table().resolve("/status", Some("")).unwrap();
        assert_eq!(target.route, "health");
        assert_eq!(target.url, "http://localhost:8082/status");
        assert_eq!(target.stripped_prefix, None);
    }

    #[test]
    fn test_resolve_without_strip() {
        let target = table().resolve("/legacy/v1/items", None).unwrap();
        assert_eq!(target.url, "http://localhost:8083/legacy/v1/items");
        assert_eq!(target.stripped_prefix, None);
    }

    #[test]
    fn test_first_declared_route_wins() {
        let table = RouteTable::new(vec![
            Route::new("specific", "/api/users/**", "http://users"),
            Route::new("general", "/api/**", "http://api"),
        ]);
        assert_eq!(table.find("/api/users/7").unwrap().id, "specific");
        assert_eq!(table.find("/api/orders/7").unwrap().id, "general");
    }

    #[test]
    fn test_unmatched() {
        assert!(table().resolve("/nowhere", None).is_none());
        assert!(RouteTable::default().is_empty());
    }
}
