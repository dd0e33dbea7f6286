//! Service resolution from the inbound path.

use crate::routing::matcher::PathPrefixMatcher;

/// Where an inbound request goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTarget {
    pub service: String,
    /// Backend path, always starting with `/`.
    pub path: String,
}

/// Maps `<prefix>/<service>/<rest>` to a [`RouteTarget`].
#[derive(Debug, Clone)]
pub struct Router {
    matcher: PathPrefixMatcher,
}

impl Router {
    pub fn new(route_prefix: &str) -> Self {
        Self {
            matcher: PathPrefixMatcher::new(route_prefix),
        }
    }

    pub fn prefix(&self) -> &str {
        self.matcher.prefix()
    }

    /// Resolve `path` (no query string).
    pub fn resolve(&self, path: &str) -> Option<RouteTarget> {
        let rest = self.matcher.strip(path)?;
        let rest = rest.strip_prefix('/').unwrap_or(rest);
        let (service, remainder) = match rest.split_once('/') {
            Some((service, remainder)) => (service, remainder),
            None => (rest, ""),
        };
        if service.is_empty() {
            return None;
        }
        Some(RouteTarget {
            service: service.to_string(),
            path: format!("/{}", remainder),
        })
    }
}

/// One-shot form of [`Router::resolve`].
pub fn resolve(path: &str, route_prefix: &str) -> Option<RouteTarget> {
    Router::new(route_prefix).resolve(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(service: &str, path: &str) -> Option<RouteTarget> {
        Some(RouteTarget {
            service: service.into(),
            path: path.into(),
        })
    }

    #[test]
    fn first_segment_is_the_service() {
        assert_eq!(resolve("/orders/42", "/"), target("orders", "/42"));
        assert_eq!(resolve("/orders/42/items", "/"), target("orders", "/42/items"));
    }

    #[test]
    fn bare_service_maps_to_root() {
        assert_eq!(resolve("/orders", "/"), target("orders", "/"));
        assert_eq!(resolve("/orders/", "/"), target("orders", "/"));
    }

    #[test]
    fn prefix_is_stripped_first() {
        assert_eq!(resolve("/api/orders/42", "/api"), target("orders", "/42"));
        assert_eq!(resolve("/orders/42", "/api"), None);
        assert_eq!(resolve("/api", "/api"), None);
    }

    #[test]
    fn empty_service_does_not_resolve() {
        assert_eq!(resolve("/", "/"), None);
        assert_eq!(resolve("//42", "/"), None);
    }
}
