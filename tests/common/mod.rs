// Each integration test file is a separate binary; helpers not used in every
// binary would otherwise trigger dead_code warnings from clippy.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    routing,
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use wiremock::MockServer;

use link_resolver::{config::ResolverConfig, handlers, resolver, state::AppState};

/// Resolver settings for tests: mock servers live on loopback, so the private
/// address guard is off, and the deadline is short enough to keep timeout
/// tests quick.
pub fn test_resolver_config() -> ResolverConfig {
    ResolverConfig {
        timeout: Duration::from_secs(3),
        block_private_addresses: false,
        favicon_service_url: "https://icons.test/s2/favicons?sz=128".into(),
        ..ResolverConfig::default()
    }
}

/// Build the full application router around the given resolver settings.
pub fn create_test_app(config: ResolverConfig) -> Router {
    let state = AppState {
        http_client: resolver::build_client(config.block_private_addresses).expect("client builds"),
        resolver: Arc::new(config),
    };
    Router::new()
        .route("/health", routing::get(handlers::health_check))
        .route(
            "/resolve-link-metadata",
            routing::get(handlers::link_metadata::resolve_link_metadata),
        )
        .with_state(state)
}

/// `/resolve-link-metadata` URI for `target`, percent-encoded.
pub fn resolve_uri(target: &str) -> String {
    format!("/resolve-link-metadata?url={}", urlencoding::encode(target))
}

/// Absolute URL of `path` on the mock server.
pub fn page_url(server: &MockServer, path: &str) -> String {
    format!("{}{}", server.uri(), path)
}

/// Host of the mock server, which is what domain fallback titles carry.
pub fn mock_host(server: &MockServer) -> String {
    server.address().ip().to_string()
}

// ── Request helpers ──────────────────────────────────────────────────────────

pub async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let req = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, req).await
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}
