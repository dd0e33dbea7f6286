//! Route prefix matching.
//!
//! # Responsibilities
//! - Match the configured route prefix on segment boundaries
//! - Hand back the remainder of the path
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - `/api` matches `/api` and `/api/...`, never `/apix`
//! - No regex to guarantee O(n) matching

/// Matches the request path prefix under which services are mounted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPrefixMatcher {
    /// Normalized: no trailing slash; empty for the root prefix.
    prefix: String,
}

impl PathPrefixMatcher {
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix: String = prefix.into();
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn prefix(&self) -> &str {
        if self.prefix.is_empty() {
            "/"
        } else {
            &self.prefix
        }
    }

    /// Strip the prefix from `path`, returning the rest (possibly empty).
    pub fn strip<'a>(&self, path: &'a str) -> Option<&'a str> {
        let rest = path.strip_prefix(self.prefix.as_str())?;
        if rest.is_empty() || rest.starts_with('/') {
            Some(rest)
        } else {
            None
        }
    }
}
