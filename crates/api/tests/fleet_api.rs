//! Fleet routes without any node connected.

mod common;

use axum::http::{Method, StatusCode};
use common::{body_json, build_test_app, get, post, post_json, send, API_KEY, WORKER_KEY};
use serde_json::json;

// ---------------------------------------------------------------------------
// Test: /worker/ws checks the worker key before upgrading
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ws_without_token_is_401() {
    let t = build_test_app();
    let response = send(&t.app, Method::GET, "/worker/ws", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn ws_with_wrong_token_is_403() {
    let t = build_test_app();

    let response = send(&t.app, Method::GET, "/worker/ws", Some("nope"), None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // The client key is not the worker key.
    let response = send(&t.app, Method::GET, "/worker/ws", Some(API_KEY), None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn worker_key_does_not_open_fleet_routes() {
    let t = build_test_app();
    let response = send(&t.app, Method::GET, "/worker/list_workers", Some(WORKER_KEY), None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// ---------------------------------------------------------------------------
// Test: empty fleet
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_fleet_lists_nothing() {
    let t = build_test_app();

    let json = body_json(get(&t.app, "/worker/list_workers").await).await;
    assert_eq!(json["data"], json!([]));

    let json = body_json(get(&t.app, "/worker/ping").await).await;
    assert_eq!(json["data"], json!({}));
}

#[tokio::test]
async fn queues_lists_every_routed_queue() {
    let t = build_test_app();
    post_json(&t.app, "/job/correlate_value", json!({ "value": "x" })).await;

    let response = get(&t.app, "/worker/queues").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;

    let queues: Vec<&str> = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|q| q["queue"].as_str().unwrap())
        .collect();
    assert_eq!(queues, vec!["correlation", "enrichment", "notification"]);
    assert_eq!(json["data"][0]["counters"]["queued"], 1);
    assert_eq!(json["data"][0]["consumers"], json!([]));
}

// ---------------------------------------------------------------------------
// Test: node operations against an unknown node are 404
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_node_is_404_on_every_node_route() {
    let t = build_test_app();
    let body = json!({ "queue_name": "correlation" });

    let responses = vec![
        post_json(&t.app, "/worker/addQueue/ghost", body.clone()).await,
        post_json(&t.app, "/worker/removeQueue/ghost", body).await,
        post(&t.app, "/worker/pause/ghost").await,
        post(&t.app, "/worker/unpause/ghost").await,
        get(&t.app, "/worker/jobqueue/ghost").await,
    ];

    for response in responses {
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json["code"], "NOT_FOUND");
        assert!(json["error"].as_str().unwrap().contains("ghost"));
    }
}
