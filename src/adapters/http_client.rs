use std::net::SocketAddr;

use async_trait::async_trait;
use axum::{body::Body as AxumBody, extract::ConnectInfo};
use eyre::Result;
use hyper::{
    HeaderMap, Request, Response, Version,
    header::{self, HeaderName, HeaderValue},
};
use hyper_rustls::HttpsConnector;
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use rustls_native_certs::load_native_certs;

use crate::ports::http_client::{HttpClient, HttpClientError, HttpClientResult};

/// Headers that describe a single connection and must not be forwarded.
static HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

static X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Reverse-proxy transport built on the Hyper legacy client with Rustls.
///
/// Responsibilities:
/// * Strips hop-by-hop headers in both directions
/// * Appends the client address to `X-Forwarded-For` when it is known
/// * Keeps the inbound `Host` header so backends see the public host name
/// * Pools connections per backend (handled by the Hyper client)
///
/// Retries, timeouts and backoff are intentionally absent.
pub struct HttpClientAdapter {
    client: Client<HttpsConnector<HttpConnector>, AxumBody>,
}

impl HttpClientAdapter {
    /// Create a new HTTP client adapter.
    pub fn new() -> Result<Self> {
        // Install default crypto provider for rustls if not already set
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

        let mut http_connector = HttpConnector::new();
        http_connector.enforce_http(false); // Allow HTTPS URLs

        let mut root_cert_store = rustls::RootCertStore::empty();
        let native_certs = load_native_certs();

        if !native_certs.certs.is_empty() {
            for cert in native_certs.certs {
                if root_cert_store.add(cert).is_err() {
                    tracing::warn!("Failed to add native certificate to rustls RootCertStore");
                }
            }
            tracing::debug!(count = root_cert_store.len(), "Loaded native root certificates");
        }

        if !native_certs.errors.is_empty() {
            tracing::warn!(
                errors = ?native_certs.errors,
                "Some native certificates failed to load"
            );
        }

        let tls_config = rustls::ClientConfig::builder()
            .with_root_certificates(root_cert_store)
            .with_no_client_auth();

        let https_connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(tls_config)
            .https_or_http()
            .enable_http1()
            .wrap_connector(http_connector);

        let client = Client::builder(TokioExecutor::new()).build::<_, AxumBody>(https_connector);

        Ok(Self { client })
    }

    fn strip_hop_by_hop(headers: &mut HeaderMap) {
        // Headers named in `Connection` are connection-scoped as well.
        let listed: Vec<HeaderName> = headers
            .get_all(header::CONNECTION)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
            .collect();
        for name in listed.iter().chain(HOP_BY_HOP.iter()) {
            headers.remove(name);
        }
    }

    fn append_forwarded_for(req: &mut Request<AxumBody>) {
        let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>().copied()
        else {
            return;
        };
        let client_ip = addr.ip().to_string();
        let value = match req
            .headers()
            .get(&X_FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
        {
            Some(prior) => format!("{prior}, {client_ip}"),
            None => client_ip,
        };
        if let Ok(value) = HeaderValue::from_str(&value) {
            req.headers_mut().insert(X_FORWARDED_FOR.clone(), value);
        }
    }
}

#[async_trait]
impl HttpClient for HttpClientAdapter {
    async fn send_request(
        &self,
        mut req: Request<AxumBody>,
    ) -> HttpClientResult<Response<AxumBody>> {
        if req.uri().host().is_none() {
            return Err(HttpClientError::MissingHost {
                uri: req.uri().to_string(),
            });
        }

        Self::strip_hop_by_hop(req.headers_mut());
        Self::append_forwarded_for(&mut req);

        let (mut parts, body) = req.into_parts();
        parts.version = Version::HTTP_11;
        tracing::debug!(method = %parts.method, uri = %parts.uri, "Forwarding request");

        let method = parts.method.clone();
        let uri = parts.uri.clone();

        match self.client.request(Request::from_parts(parts, body)).await {
            Ok(response) => {
                let (mut parts, body) = response.into_parts();
                Self::strip_hop_by_hop(&mut parts.headers);
                Ok(Response::from_parts(parts, AxumBody::new(body)))
            }
            Err(e) => Err(HttpClientError::Unreachable {
                uri: format!("{method} {uri}"),
                reason: e.to_string(),
            }),
        }
    }
}
