use std::fmt;

use thiserror::Error;
use url::Url;

/// Scheme used when a proxy target leaves it empty
pub const DEFAULT_SCHEME: &str = "http";
/// Host used when a proxy target leaves it empty
pub const DEFAULT_HOST: &str = "localhost";

/// Errors related to backend construction
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BackendError {
    /// Port was zero or missing
    #[error("port is required")]
    MissingPort,

    /// The scheme/host/port triple does not form a usable URL
    #[error("invalid backend URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// The forwarding target of a proxy route.
///
/// Built once at registration from scheme, host and port; the path and query
/// of every forwarded request are applied on top of it per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backend {
    base: Url,
}

impl Backend {
    /// Resolve a backend, defaulting an empty scheme to `http` and an empty
    /// host to `localhost`.
    pub fn new(scheme: &str, host: &str, port: u16) -> BackendResult<Self> {
        let scheme = if scheme.is_empty() {
            DEFAULT_SCHEME
        } else {
            scheme
        };
        let host = if host.is_empty() { DEFAULT_HOST } else { host };
        if port == 0 {
            return Err(BackendError::MissingPort);
        }

        let raw = format!("{scheme}://{host}:{port}");
        let base = Url::parse(&raw).map_err(|e| BackendError::InvalidUrl {
            url: raw.clone(),
            reason: e.to_string(),
        })?;
        if base.host_str().is_none() {
            return Err(BackendError::InvalidUrl {
                url: raw,
                reason: "missing host".to_string(),
            });
        }

        Ok(Self { base })
    }

    pub fn scheme(&self) -> &str {
        self.base.scheme()
    }

    pub fn host(&self) -> &str {
        self.base.host_str().unwrap_or(DEFAULT_HOST)
    }

    /// The configured port. Default ports (80 for http, 443 for https) are
    /// normalised away by `Url`, so fall back to the scheme default.
    pub fn port(&self) -> u16 {
        self.base.port_or_known_default().unwrap_or_default()
    }

    /// Build the outbound URL for `path` and an already encoded `query`.
    ///
    /// Characters not allowed in a path are percent-encoded; a path without a
    /// leading slash is joined with one.
    pub fn url_for(&self, path: &str, query: Option<&str>) -> Url {
        let mut url = self.base.clone();
        if path.starts_with('/') {
            url.set_path(path);
        } else {
            url.set_path(&format!("/{path}"));
        }
        url.set_query(query.filter(|q| !q.is_empty()));
        url
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme(), self.host(), self.port())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied() {
        let backend = Backend::new("", "", 8080).unwrap();
        assert_eq!(backend.scheme(), "http");
        assert_eq!(backend.host(), "localhost");
        assert_eq!(backend.port(), 8080);
        assert_eq!(backend.to_string(), "http://localhost:8080");
    }

    #[test]
    fn test_missing_port_rejected() {
        assert_eq!(
            Backend::new("http", "api", 0).unwrap_err(),
            BackendError::MissingPort
        );
    }

    #[test]
    fn test_invalid_host_rejected() {
        let err = Backend::new("http", "bad host", 80).unwrap_err();
        assert!(matches!(err, BackendError::InvalidUrl { .. }));
    }

    #[test]
    fn test_url_for_keeps_query_and_encodes_path() {
        let backend = Backend::new("https", "api.internal", 9443).unwrap();
        let url = backend.url_for("/a b/c", Some("x=1&y=2"));
        assert_eq!(url.as_str(), "https://api.internal:9443/a%20b/c?x=1&y=2");
    }

    #[test]
    fn test_url_for_adds_leading_slash() {
        let backend = Backend::new("http", "localhost", 3000).unwrap();
        let url = backend.url_for("api/42", None);
        assert_eq!(url.as_str(), "http://localhost:3000/api/42");
    }

    #[test]
    fn test_url_for_drops_empty_query() {
        let backend = Backend::new("http", "localhost", 3000).unwrap();
        let url = backend.url_for("/x", Some(""));
        assert_eq!(url.as_str(), "http://localhost:3000/x");
    }
}
