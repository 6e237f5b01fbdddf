//! Validated route definitions.
//!
//! These are produced from raw configuration by
//! [`RouteValidator`](crate::config::validation::RouteValidator) and never
//! mutated afterwards. The "exactly one of" rules of the configuration format
//! are expressed as enums here, so an invalid combination cannot be
//! represented once validation has passed.
use std::collections::BTreeMap;

use bytes::Bytes;
use http::{Method, StatusCode};

use crate::core::backend::Backend;

/// Name given to the catch-all capture when a pattern ends in `/*`.
pub const WILDCARD_PARAM: &str = "wildcard";

/// Method set a route is bound under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodSelector {
    /// `*` or `ALL` was configured: one binding matching every method.
    Any,
    /// One binding per distinct verb, sorted by name.
    Methods(Vec<Method>),
}

impl MethodSelector {
    pub fn is_any(&self) -> bool {
        matches!(self, MethodSelector::Any)
    }
}

/// Query parameters to overwrite before forwarding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryRewrite {
    /// Parameter name to value template. Names are literal.
    pub set: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyTarget {
    pub backend: Backend,
    /// Path template; when absent the inbound path is forwarded as is.
    pub path: Option<String>,
    /// When present the query string is always re-encoded, even with no rules.
    pub query: Option<QueryRewrite>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticResponse {
    pub status: StatusCode,
    pub body: Option<Bytes>,
}

/// What a matched request is answered with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteAction {
    Proxy(ProxyTarget),
    Static(StaticResponse),
}

/// A single validated route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDefinition {
    /// Router pattern in dispatcher syntax (`/users/{id}`, `/files/{*rest}`).
    pub path: String,
    pub methods: MethodSelector,
    pub action: RouteAction,
}

impl RouteDefinition {
    /// Name of the catch-all parameter in the pattern, if it has one.
    pub fn wildcard_param(&self) -> Option<&str> {
        wildcard_param(&self.path)
    }
}

/// Rewrite a trailing `/*` segment to the dispatcher's catch-all syntax.
pub fn normalize_pattern(pattern: &str) -> String {
    match pattern.strip_suffix("/*") {
        Some(prefix) => format!("{prefix}/{{*{WILDCARD_PARAM}}}"),
        None => pattern.to_string(),
    }
}

/// Extract the name of a `{*name}` segment from a dispatcher pattern.
pub fn wildcard_param(pattern: &str) -> Option<&str> {
    pattern
        .rsplit('/')
        .next()
        .and_then(|seg| seg.strip_prefix("{*"))
        .and_then(|seg| seg.strip_suffix('}'))
}

/// The bare prefix a trailing catch-all leaves unmatched, including its
/// final slash: `/files/` for `/files/{*rest}`, `/` for `/{*rest}`.
pub fn catch_all_prefix(pattern: &str) -> Option<&str> {
    wildcard_param(pattern)?;
    pattern.rfind('/').map(|i| &pattern[..=i])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_trailing_star() {
        assert_eq!(normalize_pattern("/files/*"), "/files/{*wildcard}");
        assert_eq!(normalize_pattern("/*"), "/{*wildcard}");
    }

    #[test]
    fn test_normalize_leaves_other_patterns() {
        assert_eq!(normalize_pattern("/users/{id}"), "/users/{id}");
        assert_eq!(normalize_pattern("/a*"), "/a*");
    }

    #[test]
    fn test_wildcard_param_name() {
        assert_eq!(wildcard_param("/files/{*rest}"), Some("rest"));
        assert_eq!(wildcard_param("/users/{id}"), None);
        assert_eq!(wildcard_param("/"), None);
    }

    #[test]
    fn test_catch_all_prefix() {
        assert_eq!(catch_all_prefix("/files/{*wildcard}"), Some("/files/"));
        assert_eq!(catch_all_prefix("/{*wildcard}"), Some("/"));
        assert_eq!(catch_all_prefix("/a/{id}/{*rest}"), Some("/a/{id}/"));
        assert_eq!(catch_all_prefix("/files/{id}"), None);
    }
}
