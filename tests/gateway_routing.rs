use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    extract::Request,
    http::{Method, StatusCode},
    response::Response,
};
use http_body_util::BodyExt;
use http_rewrite::{
    Gateway, GatewayError, HttpClient,
    config::{ApiConfig, GatewayConfig, InputConfig, ProxyConfig},
    ports::http_client::HttpClientResult,
};
use tower::ServiceExt;

/// Echoes the outbound request line so tests can see the rewritten target.
struct EchoClient;

#[async_trait]
impl HttpClient for EchoClient {
    async fn send_request(&self, req: Request) -> HttpClientResult<Response> {
        Ok(Response::new(Body::from(format!(
            "{} {}",
            req.method(),
            req.uri()
        ))))
    }
}

fn status(method: &str, path: &str, code: u16, body: &str) -> ApiConfig {
    ApiConfig::status(InputConfig::method(method, path), code, body)
}

fn proxy(method: &str, path: &str, target_path: &str) -> ApiConfig {
    ApiConfig::proxy(InputConfig::method(method, path), ProxyConfig {
        port: 9000,
        path: target_path.to_string(),
        ..Default::default()
    })
}

fn router(apis: Vec<ApiConfig>) -> Router {
    let config = apis
        .into_iter()
        .fold(GatewayConfig::builder().listen(8080), |b, api| b.api(api))
        .build()
        .unwrap();
    Gateway::build(&config, Arc::new(EchoClient))
        .unwrap()
        .into_router()
}

async fn call(router: &Router, method: Method, uri: &str) -> (StatusCode, String) {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn test_static_route_and_wrong_method() {
    let router = router(vec![status("GET", "/health", 200, "ok")]);

    assert_eq!(
        call(&router, Method::GET, "/health").await,
        (StatusCode::OK, "ok".to_string())
    );
    let (code, _) = call(&router, Method::POST, "/health").await;
    assert_eq!(code, StatusCode::METHOD_NOT_ALLOWED);
    let (code, _) = call(&router, Method::GET, "/missing").await;
    assert_eq!(code, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_wildcard_method_matches_everything() {
    let router = router(vec![ApiConfig::status(
        InputConfig::methods(["*"], "/any"),
        202,
        "",
    )]);

    for method in [Method::GET, Method::DELETE, Method::PATCH, Method::OPTIONS] {
        let (code, _) = call(&router, method, "/any").await;
        assert_eq!(code, StatusCode::ACCEPTED);
    }
}

#[tokio::test]
async fn test_method_list_binds_each_verb() {
    let router = router(vec![ApiConfig::status(
        InputConfig::methods(["GET", "PUT"], "/items/{id}"),
        204,
        "",
    )]);

    assert_eq!(
        call(&router, Method::GET, "/items/1").await.0,
        StatusCode::NO_CONTENT
    );
    assert_eq!(
        call(&router, Method::PUT, "/items/1").await.0,
        StatusCode::NO_CONTENT
    );
    assert_eq!(
        call(&router, Method::POST, "/items/1").await.0,
        StatusCode::METHOD_NOT_ALLOWED
    );
}

#[tokio::test]
async fn test_invalid_routes_are_skipped() {
    let mut ambiguous = InputConfig::method("GET", "/ambiguous");
    ambiguous.methods = vec!["POST".to_string()];

    let router = router(vec![
        ApiConfig::status(ambiguous, 200, "never"),
        ApiConfig {
            input: InputConfig::method("GET", "/no-target"),
            ..Default::default()
        },
        status("GET", "/health", 200, "ok"),
    ]);

    assert_eq!(
        call(&router, Method::GET, "/ambiguous").await.0,
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        call(&router, Method::GET, "/no-target").await.0,
        StatusCode::NOT_FOUND
    );
    assert_eq!(call(&router, Method::GET, "/health").await.0, StatusCode::OK);
}

#[tokio::test]
async fn test_duplicate_binding_keeps_first() {
    let router = router(vec![
        status("GET", "/dup", 200, "first"),
        status("GET", "/dup", 201, "second"),
    ]);

    assert_eq!(
        call(&router, Method::GET, "/dup").await,
        (StatusCode::OK, "first".to_string())
    );
}

#[tokio::test]
async fn test_static_segment_wins_over_capture() {
    let router = router(vec![
        proxy("GET", "/users/{id}", "/api/users/${id}"),
        status("GET", "/users/me", 200, "me"),
    ]);

    assert_eq!(
        call(&router, Method::GET, "/users/me").await,
        (StatusCode::OK, "me".to_string())
    );
    assert_eq!(
        call(&router, Method::GET, "/users/42").await,
        (
            StatusCode::OK,
            "GET http://localhost:9000/api/users/42".to_string()
        )
    );
}

#[tokio::test]
async fn test_catch_all_route() {
    let router = router(vec![proxy("GET", "/files/*", "/storage/${*}")]);

    assert_eq!(
        call(&router, Method::GET, "/files/a/b.txt").await,
        (
            StatusCode::OK,
            "GET http://localhost:9000/storage/a/b.txt".to_string()
        )
    );
}

#[tokio::test]
async fn test_catch_all_matches_bare_prefix() {
    let router = router(vec![proxy("GET", "/static/*", "/files/${*}")]);

    assert_eq!(
        call(&router, Method::GET, "/static/").await,
        (
            StatusCode::OK,
            "GET http://localhost:9000/files/".to_string()
        )
    );
    assert_eq!(
        call(&router, Method::POST, "/static/").await.0,
        StatusCode::METHOD_NOT_ALLOWED
    );
}

#[tokio::test]
async fn test_root_catch_all_matches_root() {
    let router = router(vec![ApiConfig::proxy(
        InputConfig::methods(["*"], "/*"),
        ProxyConfig {
            port: 9000,
            ..Default::default()
        },
    )]);

    assert_eq!(
        call(&router, Method::GET, "/").await,
        (StatusCode::OK, "GET http://localhost:9000/".to_string())
    );
    assert_eq!(
        call(&router, Method::DELETE, "/a/b").await,
        (StatusCode::OK, "DELETE http://localhost:9000/a/b".to_string())
    );
}

#[tokio::test]
async fn test_explicit_prefix_route_wins_over_catch_all() {
    let router = router(vec![
        ApiConfig::proxy(InputConfig::methods(["*"], "/*"), ProxyConfig {
            port: 9000,
            ..Default::default()
        }),
        status("GET", "/", 200, "home"),
    ]);

    assert_eq!(
        call(&router, Method::GET, "/").await,
        (StatusCode::OK, "home".to_string())
    );
    assert_eq!(
        call(&router, Method::PUT, "/").await,
        (StatusCode::OK, "PUT http://localhost:9000/".to_string())
    );

    let router = self::router(vec![
        proxy("GET", "/docs/*", "/d/${*}"),
        proxy("POST", "/docs/*", "/upload/${*}"),
        status("GET", "/docs/", 200, "index"),
    ]);

    assert_eq!(
        call(&router, Method::GET, "/docs/").await,
        (StatusCode::OK, "index".to_string())
    );
    assert_eq!(
        call(&router, Method::POST, "/docs/").await,
        (
            StatusCode::OK,
            "POST http://localhost:9000/upload/".to_string()
        )
    );
}

#[tokio::test]
async fn test_decoded_capture_is_reescaped() {
    let router = router(vec![proxy("GET", "/p/{id}", "/api/${id}")]);

    assert_eq!(
        call(&router, Method::GET, "/p/100%25").await,
        (
            StatusCode::OK,
            "GET http://localhost:9000/api/100%25".to_string()
        )
    );
}

#[tokio::test]
async fn test_star_query_param_does_not_replace_capture() {
    let router = router(vec![proxy("GET", "/files/*", "/storage/${*}")]);

    assert_eq!(
        call(&router, Method::GET, "/files/a/b?*=evil").await,
        (
            StatusCode::OK,
            "GET http://localhost:9000/storage/a/b?*=evil".to_string()
        )
    );
}

#[tokio::test]
async fn test_no_valid_routes_is_error() {
    let config = GatewayConfig::builder()
        .listen(8080)
        .api(status("GET", "relative", 200, ""))
        .build()
        .unwrap();

    assert_eq!(
        Gateway::build(&config, Arc::new(EchoClient)).err(),
        Some(GatewayError::NoRoutes)
    );
}
