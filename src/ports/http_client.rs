//! Outbound transport used by proxy routes.
use async_trait::async_trait;
use axum::{extract::Request, response::Response};
use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum HttpClientError {
    /// Connecting to or exchanging with the backend failed
    #[error("backend request {uri} failed: {reason}")]
    Unreachable { uri: String, reason: String },

    /// The outbound URI is not absolute
    #[error("outbound URI '{uri}' has no host")]
    MissingHost { uri: String },
}

pub type HttpClientResult<T> = Result<T, HttpClientError>;

/// Forwards a fully rewritten request to its backend.
///
/// The request URI is absolute and names the backend. The backend's response
/// is returned as is, status included; only connection-scoped headers may be
/// dropped.
#[async_trait]
pub trait HttpClient: Send + Sync + 'static {
    async fn send_request(&self, req: Request) -> HttpClientResult<Response>;
}
