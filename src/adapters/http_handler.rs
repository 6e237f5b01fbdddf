use std::{
    convert::Infallible,
    sync::Arc,
    task::{Context, Poll},
};

use axum::{
    body::Body as AxumBody,
    extract::{FromRequestParts, RawPathParams, Request},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use futures_util::future::{BoxFuture, FutureExt};
use tower::{Service, ServiceExt};

use crate::{
    adapters::status_observer::StatusObserver,
    core::{
        mapper::VariableMapper,
        rewrite::{self, RewriteError},
        route::{ProxyTarget, RouteAction, RouteDefinition, StaticResponse},
    },
    ports::http_client::HttpClient,
};

/// Per-route request handler bound into the dispatcher.
///
/// Cheap to clone; every binding of a route shares the same inner handler.
#[derive(Clone)]
pub enum RouteHandler {
    Proxy(Arc<ProxyHandler>),
    Static(Arc<StaticHandler>),
}

impl RouteHandler {
    pub fn new(route: &RouteDefinition, client: Arc<dyn HttpClient>) -> Self {
        match &route.action {
            RouteAction::Proxy(target) => RouteHandler::Proxy(Arc::new(ProxyHandler::new(
                target.clone(),
                route.wildcard_param().map(str::to_string),
                client,
            ))),
            RouteAction::Static(response) => {
                RouteHandler::Static(Arc::new(StaticHandler::new(response.clone())))
            }
        }
    }

    pub async fn handle(&self, req: Request) -> Response {
        match self {
            RouteHandler::Proxy(handler) => handler.handle(req).await,
            RouteHandler::Static(handler) => handler.handle(req),
        }
    }
}

/// Rewrites and forwards requests for one proxy route.
pub struct ProxyHandler {
    target: ProxyTarget,
    wildcard_param: Option<String>,
    client: Arc<dyn HttpClient>,
}

impl ProxyHandler {
    pub fn new(
        target: ProxyTarget,
        wildcard_param: Option<String>,
        client: Arc<dyn HttpClient>,
    ) -> Self {
        Self {
            target,
            wildcard_param,
            client,
        }
    }

    pub async fn handle(&self, req: Request) -> Response {
        let (mut parts, body) = req.into_parts();
        let params = path_params(&mut parts).await;

        let rewritten = {
            let mapper = VariableMapper::new(
                &params,
                parts.uri.query(),
                self.wildcard_param.as_deref(),
            );
            rewrite::rewrite(&self.target, &mapper, parts.uri.path(), parts.uri.query())
        };

        let rewritten = match rewritten {
            Ok(rewritten) => rewritten,
            Err(RewriteError::Path(e)) => {
                tracing::error!(error = %e, request = %parts.uri.path(), "Failed to substitute path");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
            Err(RewriteError::Query { param, source }) => {
                tracing::error!(
                    param = %param,
                    error = %source,
                    request = %parts.uri.path(),
                    "Failed to substitute query"
                );
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };

        let outbound = self
            .target
            .backend
            .url_for(&rewritten.path, rewritten.query.as_deref());
        parts.uri = match outbound.as_str().parse() {
            Ok(uri) => uri,
            Err(e) => {
                tracing::error!(error = %e, url = %outbound, "Failed to build outbound URI");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };

        let method = parts.method.clone();
        let observer = StatusObserver::new(Forwarder {
            client: self.client.clone(),
        });
        let status = observer.status();

        let response = match observer.oneshot(Request::from_parts(parts, body)).await {
            Ok(response) => response,
            Err(never) => match never {},
        };

        tracing::info!(
            status = status.get().map(|s| s.as_u16()).unwrap_or_default(),
            "Proxy url: {} {}",
            method,
            rewritten.path_and_query()
        );
        response
    }
}

/// Hands a rewritten request to the transport.
///
/// Transport failures are answered with `502 Bad Gateway`.
#[derive(Clone)]
struct Forwarder {
    client: Arc<dyn HttpClient>,
}

impl Service<Request> for Forwarder {
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let client = self.client.clone();
        async move {
            let uri = req.uri().clone();
            match client.send_request(req).await {
                Ok(response) => Ok(response),
                Err(e) => {
                    tracing::error!(error = %e, backend = %uri, "Proxy error");
                    Ok(StatusCode::BAD_GATEWAY.into_response())
                }
            }
        }
        .boxed()
    }
}

/// Answers every request of a route with a fixed status and body.
pub struct StaticHandler {
    response: StaticResponse,
}

impl StaticHandler {
    pub fn new(response: StaticResponse) -> Self {
        Self { response }
    }

    pub fn handle(&self, req: Request) -> Response {
        tracing::info!(
            status = self.response.status.as_u16(),
            "Status url: {} {}",
            req.method(),
            req.uri()
        );

        let body = match &self.response.body {
            Some(bytes) => AxumBody::from(bytes.clone()),
            None => AxumBody::empty(),
        };
        let mut response = Response::new(body);
        *response.status_mut() = self.response.status;
        response
    }
}

/// Path parameters captured by the dispatcher, percent-decoded.
async fn path_params(parts: &mut Parts) -> Vec<(String, String)> {
    match RawPathParams::from_request_parts(parts, &()).await {
        Ok(params) => params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        Err(_) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use bytes::Bytes;
    use http::Uri;
    use http_body_util::BodyExt;

    use super::*;
    use crate::{
        core::{backend::Backend, route::QueryRewrite},
        ports::http_client::{HttpClientError, HttpClientResult},
    };

    /// Records the outbound URI and answers with a fixed status.
    struct RecordingClient {
        status: StatusCode,
        seen: Mutex<Vec<Uri>>,
    }

    impl RecordingClient {
        fn new(status: StatusCode) -> Arc<Self> {
            Arc::new(Self {
                status,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn seen(&self) -> Vec<Uri> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpClient for RecordingClient {
        async fn send_request(&self, req: Request) -> HttpClientResult<Response> {
            self.seen.lock().unwrap().push(req.uri().clone());
            let mut response = Response::new(AxumBody::from("from backend"));
            *response.status_mut() = self.status;
            Ok(response)
        }
    }

    struct FailingClient;

    #[async_trait]
    impl HttpClient for FailingClient {
        async fn send_request(&self, _req: Request) -> HttpClientResult<Response> {
            Err(HttpClientError::Unreachable {
                uri: "GET http://backend:9000/x".to_string(),
                reason: "connection refused".to_string(),
            })
        }
    }

    fn proxy_target(path: Option<&str>, set: Option<&[(&str, &str)]>) -> ProxyTarget {
        ProxyTarget {
            backend: Backend::new("http", "backend", 9000).unwrap(),
            path: path.map(str::to_string),
            query: set.map(|set| QueryRewrite {
                set: set
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            }),
        }
    }

    fn request(uri: &str) -> Request {
        Request::builder().uri(uri).body(AxumBody::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_forwards_unchanged_without_templates() {
        let client = RecordingClient::new(StatusCode::OK);
        let handler = ProxyHandler::new(proxy_target(None, None), None, client.clone());

        let response = handler.handle(request("/orders?id=1")).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, Bytes::from_static(b"from backend"));
        assert_eq!(client.seen(), vec![
            "http://backend:9000/orders?id=1".parse::<Uri>().unwrap()
        ]);
    }

    #[tokio::test]
    async fn test_query_rewrite_applied() {
        let client = RecordingClient::new(StatusCode::OK);
        let handler = ProxyHandler::new(
            proxy_target(Some("/v2/search"), Some(&[("region", "${loc}")])),
            None,
            client.clone(),
        );

        handler
            .handle(request("/search?region=old&x=1&loc=eu"))
            .await;

        assert_eq!(client.seen(), vec![
            "http://backend:9000/v2/search?loc=eu&region=eu&x=1"
                .parse::<Uri>()
                .unwrap()
        ]);
    }

    #[tokio::test]
    async fn test_unresolved_path_is_500_and_not_forwarded() {
        let client = RecordingClient::new(StatusCode::OK);
        let handler = ProxyHandler::new(proxy_target(Some("/x/${missing}"), None), None, client.clone());

        let response = handler.handle(request("/x")).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(client.seen().is_empty());
    }

    #[tokio::test]
    async fn test_unresolved_query_is_500_and_not_forwarded() {
        let client = RecordingClient::new(StatusCode::OK);
        let handler = ProxyHandler::new(
            proxy_target(None, Some(&[("region", "${loc}")])),
            None,
            client.clone(),
        );

        let response = handler.handle(request("/x?region=old")).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(client.seen().is_empty());
    }

    #[tokio::test]
    async fn test_backend_status_passed_through() {
        let client = RecordingClient::new(StatusCode::SERVICE_UNAVAILABLE);
        let handler = ProxyHandler::new(proxy_target(None, None), None, client);

        let response = handler.handle(request("/x")).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_transport_error_is_bad_gateway() {
        let handler = ProxyHandler::new(proxy_target(None, None), None, Arc::new(FailingClient));

        let response = handler.handle(request("/x")).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_static_handler_writes_status_and_body() {
        let handler = StaticHandler::new(StaticResponse {
            status: StatusCode::CREATED,
            body: Some(Bytes::from_static(b"${not_a_template}")),
        });

        let response = handler.handle(request("/made"));

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, Bytes::from_static(b"${not_a_template}"));
    }

    #[tokio::test]
    async fn test_static_handler_without_body() {
        let handler = StaticHandler::new(StaticResponse {
            status: StatusCode::NO_CONTENT,
            body: None,
        });

        let response = handler.handle(request("/empty"));

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(body.is_empty());
    }
}
