#![allow(dead_code)]

use axum::{
    body::{Body, Bytes},
    http::{HeaderMap, Request, StatusCode},
    Router,
};
use serde_json::Value;
use std::time::Duration;
use story_relay::{config::AppConfig, router, state::AppState};
use tower::ServiceExt; // for `oneshot`
use url::Url;
use wiremock::MockServer;

pub const HOST: &str = "relay.local";

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

/// Relay config pointing at mock upstreams, with timings short enough for tests.
pub fn test_config(llm: &str, comfy: &str) -> AppConfig {
    let mut config = AppConfig::with_upstreams(
        Url::parse(&format!("{}/v1/chat/completions", llm)).unwrap(),
        Url::parse(comfy).unwrap(),
    );
    config.checkpoint = "test.safetensors".to_string();
    config.llm_timeout = Duration::from_secs(5);
    config.generation_timeout = Duration::from_secs(5);
    config.poll_interval = Duration::from_millis(10);
    config
}

pub fn app(config: AppConfig) -> Router {
    router(AppState::new(config))
}

/// Address nothing listens on.
pub async fn unreachable_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

pub async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    TestResponse {
        status,
        headers,
        body,
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("host", HOST)
        .body(Body::empty())
        .unwrap()
}

pub fn post_json(uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("host", HOST)
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

pub async fn request_count(server: &MockServer, path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == path)
        .count()
}
