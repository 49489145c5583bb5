//! Integration tests for the job routes over the in-memory backend.

mod common;

use axum::http::{Method, StatusCode};
use common::{body_bytes, body_json, build_test_app, delete, get, post_json, send, API_KEY};
use serde_json::json;
use warden_core::backend::QueueBackend;
use warden_core::job::JobOutcome;

/// Submit a job and return its id.
async fn create(app: &axum::Router, job_type: &str, payload: serde_json::Value) -> String {
    let response = post_json(app, &format!("/job/{job_type}"), payload).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"]["job_id"]
        .as_str()
        .unwrap()
        .to_string()
}

// ---------------------------------------------------------------------------
// Test: POST /job/{type} enqueues on the type's queue
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_job_returns_201_with_queue() {
    let t = build_test_app();
    let response = post_json(&t.app, "/job/enrichment", json!({ "plugin": "ip_info" })).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["queue"], "enrichment");
    assert!(json["data"]["job_id"].is_string());

    let counters = t.backend.counters("enrichment").await.unwrap();
    assert_eq!(counters.queued, 1);
}

#[tokio::test]
async fn correlate_is_routed_to_the_correlation_queue() {
    let t = build_test_app();
    let response = post_json(&t.app, "/job/correlate", json!({ "value": "1.1.1.1" })).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["data"]["queue"], "correlation");
    let job = t.backend.dequeue("correlation").await.unwrap().unwrap();
    assert_eq!(job.payload["value"], "1.1.1.1");
}

#[tokio::test]
async fn unknown_job_type_is_400() {
    let t = build_test_app();
    let response = post_json(&t.app, "/job/reboot", json!({})).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn non_object_payload_is_400() {
    let t = build_test_app();
    let response = post_json(&t.app, "/job/correlate_value", json!(["x"])).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn offline_backend_is_503() {
    let t = build_test_app();
    t.backend.set_available(false);

    let response = post_json(&t.app, "/job/correlate_value", json!({ "value": "x" })).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(response).await["code"], "QUEUE_BACKEND_UNAVAILABLE");
}

// ---------------------------------------------------------------------------
// Test: job routes require the client API key
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_token_is_401_and_wrong_token_is_403() {
    let t = build_test_app();

    let response = send(&t.app, Method::POST, "/job/enrichment", None, Some(json!({}))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send(
        &t.app,
        Method::POST,
        "/job/enrichment",
        Some("not-the-key"),
        Some(json!({})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// ---------------------------------------------------------------------------
// Test: status and result through the lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_job_is_404() {
    let t = build_test_app();
    for uri in ["/job/nope/status", "/job/nope/result"] {
        let response = get(&t.app, uri).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(body_json(response).await["code"], "NOT_FOUND");
    }
}

#[tokio::test]
async fn result_before_completion_is_409() {
    let t = build_test_app();
    let id = create(&t.app, "correlate_value", json!({ "value": "x" })).await;

    let response = get(&t.app, &format!("/job/{id}/status")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["status"], "queued");

    let response = get(&t.app, &format!("/job/{id}/result")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "JOB_NOT_FINISHED");
}

#[tokio::test]
async fn successful_job_returns_its_result() {
    let t = build_test_app();
    let id = create(&t.app, "correlate_value", json!({ "value": "x" })).await;

    let job = t.backend.dequeue("correlation").await.unwrap().unwrap();
    assert_eq!(job.id, id);
    t.backend
        .complete(&id, JobOutcome::Success(Some(json!({ "correlations": [] }))))
        .await
        .unwrap();

    let response = get(&t.app, &format!("/job/{id}/result")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["job_id"], id.as_str());
    assert_eq!(json["data"]["result"], json!({ "correlations": [] }));
}

#[tokio::test]
async fn fire_and_forget_result_is_204_with_empty_body() {
    let t = build_test_app();
    let id = create(
        &t.app,
        "webhook_notify",
        json!({ "url": "http://127.0.0.1:1/hook", "payload": {} }),
    )
    .await;

    t.backend.dequeue("notification").await.unwrap().unwrap();
    t.backend
        .complete(&id, JobOutcome::Success(None))
        .await
        .unwrap();

    let response = get(&t.app, &format!("/job/{id}/result")).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(body_bytes(response).await.is_empty());
}

#[tokio::test]
async fn failed_job_result_is_409_job_failed() {
    let t = build_test_app();
    let id = create(&t.app, "enrichment", json!({ "plugin": "ip_info" })).await;

    t.backend.dequeue("enrichment").await.unwrap().unwrap();
    t.backend
        .complete(&id, JobOutcome::Failed("plugin crashed".into()))
        .await
        .unwrap();

    let response = get(&t.app, &format!("/job/{id}/result")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert_eq!(json["code"], "JOB_FAILED");
    assert!(json["error"].as_str().unwrap().contains("plugin crashed"));
}

// ---------------------------------------------------------------------------
// Test: DELETE /job/{id}/cancel
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancel_reports_whether_job_was_cancelable() {
    let t = build_test_app();
    let id = create(&t.app, "correlate_value", json!({ "value": "x" })).await;

    let response = delete(&t.app, &format!("/job/{id}/cancel")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["canceled"], true);

    // Already terminal: a no-op, not an error.
    let response = delete(&t.app, &format!("/job/{id}/cancel")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["canceled"], false);

    let response = get(&t.app, &format!("/job/{id}/result")).await;
    assert_eq!(response.status(), StatusCode::GONE);
    assert_eq!(body_json(response).await["code"], "JOB_REVOKED");

    let response = delete(&t.app, "/job/nope/cancel").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Test: GET /health is public and carries a request id
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_is_public_and_reports_backend() {
    let t = build_test_app();
    let response = send(&t.app, Method::GET, "/health", None, None).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("x-request-id").is_some());

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["queue_backend_healthy"], true);
    assert_eq!(json["nodes"], 0);

    t.backend.set_available(false);
    let response = send(&t.app, Method::GET, "/health", Some(API_KEY), None).await;
    assert_eq!(body_json(response).await["status"], "degraded");
}
