#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use warden_api::config::ServerConfig;
use warden_api::fleet::FleetManager;
use warden_api::router::build_app_router;
use warden_api::state::AppState;
use warden_jobs::{InMemoryBackend, JobController};

pub const API_KEY: &str = "client-secret";
pub const WORKER_KEY: &str = "worker-secret";

/// Build a test `ServerConfig` with both keys set and no database.
pub fn test_config(command_timeout: Duration) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        api_key: API_KEY.to_string(),
        worker_api_key: WORKER_KEY.to_string(),
        queue_backend_url: None,
        request_timeout_secs: 30,
        command_timeout,
    }
}

pub struct TestApp {
    pub app: Router,
    pub backend: Arc<InMemoryBackend>,
    pub fleet: Arc<FleetManager>,
}

/// The production router over an in-memory backend.
pub fn build_test_app() -> TestApp {
    build_test_app_with_timeout(Duration::from_secs(5))
}

pub fn build_test_app_with_timeout(command_timeout: Duration) -> TestApp {
    let config = test_config(command_timeout);
    let backend = Arc::new(InMemoryBackend::new());
    let fleet = Arc::new(FleetManager::new(command_timeout));

    let state = AppState {
        controller: JobController::new(backend.clone()),
        fleet: Arc::clone(&fleet),
        config: Arc::new(config.clone()),
    };

    TestApp {
        app: build_app_router(state, &config),
        backend,
        fleet,
    }
}

/// Serve `app` on an ephemeral port. Returns the bound address.
pub async fn serve(app: Router) -> std::net::SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    app.clone().oneshot(builder.body(body).unwrap()).await.unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response {
    send(app, Method::GET, uri, Some(API_KEY), None).await
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> Response {
    send(app, Method::POST, uri, Some(API_KEY), Some(body)).await
}

pub async fn post(app: &Router, uri: &str) -> Response {
    send(app, Method::POST, uri, Some(API_KEY), None).await
}

pub async fn delete(app: &Router, uri: &str) -> Response {
    send(app, Method::DELETE, uri, Some(API_KEY), None).await
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
