use std::collections::BTreeSet;

use axum::routing::MethodFilter;
use bytes::Bytes;
use http::{Method, StatusCode};

use crate::{
    config::models::{ApiConfig, HttpConfig, InputConfig, ProxyConfig},
    core::{
        backend::{Backend, BackendError},
        route::{
            MethodSelector, ProxyTarget, QueryRewrite, RouteAction, RouteDefinition,
            StaticResponse, normalize_pattern,
        },
    },
};

/// Validation result type alias
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Reasons a route entry is rejected. Each one only disqualifies its own route.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("only one of method or methods can be specified")]
    AmbiguousMethods,

    #[error("one of method or methods must be specified")]
    MissingMethod,

    #[error("invalid method '{method}'")]
    InvalidMethod { method: String },

    #[error("input path is required")]
    MissingPath,

    #[error("invalid path '{path}': must start with '/'")]
    InvalidPath { path: String },

    #[error("invalid path '{path}': use {{name}} and {{*name}} for captures")]
    UnsupportedPathSyntax { path: String },

    #[error("either proxy or http must be specified")]
    MissingTarget,

    #[error("only one of proxy or http can be specified")]
    MultipleTargets,

    #[error("port is required")]
    MissingPort,

    #[error("invalid backend: {0}")]
    InvalidBackend(String),

    #[error("invalid status {status}: must be between 100 and 999")]
    InvalidStatus { status: u16 },
}

impl From<BackendError> for ValidationError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::MissingPort => ValidationError::MissingPort,
            other => ValidationError::InvalidBackend(other.to_string()),
        }
    }
}

/// Turns raw route entries into [`RouteDefinition`]s.
pub struct RouteValidator;

impl RouteValidator {
    /// Validate one route entry. Checks run in a fixed order and the first
    /// failure is returned.
    pub fn validate(api: &ApiConfig) -> ValidationResult<RouteDefinition> {
        let verbs = Self::method_set(&api.input)?;
        let path = Self::validate_path(&api.input.path)?;

        let action = match (&api.proxy, &api.http) {
            (None, None) => return Err(ValidationError::MissingTarget),
            (Some(_), Some(_)) => return Err(ValidationError::MultipleTargets),
            (Some(proxy), None) => RouteAction::Proxy(Self::validate_proxy(proxy)?),
            (None, Some(http)) => RouteAction::Static(Self::validate_static(http)?),
        };

        let methods = Self::method_selector(verbs)?;

        Ok(RouteDefinition {
            path,
            methods,
            action,
        })
    }

    /// Union of `method` and `methods`, rejecting ambiguous or empty selectors.
    fn method_set(input: &InputConfig) -> ValidationResult<BTreeSet<&str>> {
        if !input.method.is_empty() && !input.methods.is_empty() {
            return Err(ValidationError::AmbiguousMethods);
        }

        let verbs: BTreeSet<&str> = std::iter::once(input.method.as_str())
            .chain(input.methods.iter().map(String::as_str))
            .filter(|m| !m.is_empty())
            .collect();

        if verbs.is_empty() {
            return Err(ValidationError::MissingMethod);
        }
        Ok(verbs)
    }

    fn method_selector(verbs: BTreeSet<&str>) -> ValidationResult<MethodSelector> {
        if verbs.contains("*") || verbs.contains("ALL") {
            return Ok(MethodSelector::Any);
        }

        let mut methods = Vec::with_capacity(verbs.len());
        for verb in verbs {
            let method = Method::from_bytes(verb.as_bytes()).map_err(|_| {
                ValidationError::InvalidMethod {
                    method: verb.to_string(),
                }
            })?;
            // The dispatcher can only bind the standard verbs.
            if MethodFilter::try_from(method.clone()).is_err() {
                return Err(ValidationError::InvalidMethod {
                    method: verb.to_string(),
                });
            }
            methods.push(method);
        }
        Ok(MethodSelector::Methods(methods))
    }

    fn validate_path(path: &str) -> ValidationResult<String> {
        if path.is_empty() {
            return Err(ValidationError::MissingPath);
        }
        if !path.starts_with('/') {
            return Err(ValidationError::InvalidPath {
                path: path.to_string(),
            });
        }
        let pattern = normalize_pattern(path);
        if pattern
            .split('/')
            .any(|seg| seg.starts_with(':') || seg.starts_with('*'))
        {
            return Err(ValidationError::UnsupportedPathSyntax {
                path: path.to_string(),
            });
        }
        Ok(pattern)
    }

    fn validate_proxy(proxy: &ProxyConfig) -> ValidationResult<ProxyTarget> {
        let backend = Backend::new(&proxy.scheme, &proxy.host, proxy.port)?;

        Ok(ProxyTarget {
            backend,
            path: Some(proxy.path.clone()).filter(|p| !p.is_empty()),
            query: proxy.query.as_ref().map(|q| QueryRewrite { set: q.set.clone() }),
        })
    }

    fn validate_static(http: &HttpConfig) -> ValidationResult<StaticResponse> {
        let status = match http.status {
            0 => StatusCode::OK,
            code => StatusCode::from_u16(code)
                .map_err(|_| ValidationError::InvalidStatus { status: code })?,
        };

        Ok(StaticResponse {
            status,
            body: Some(Bytes::from(http.body.clone())).filter(|b| !b.is_empty()),
        })
    }
}
