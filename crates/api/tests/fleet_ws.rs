//! Fleet control over real websocket connections.
//!
//! The master is served on an ephemeral port. Nodes are either the real
//! agent session (with `sh` standing in for the worker binary) or a bare
//! tungstenite client that answers by hand.

mod common;

use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use axum::http::StatusCode;
use axum::Router;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::connect_async;
use tokio_util::sync::CancellationToken;

use common::{
    body_json, build_test_app, build_test_app_with_timeout, get, post, post_json, serve,
    WORKER_KEY,
};
use warden_agent::handlers::{register_handlers, NodeControl};
use warden_agent::session::{self, SessionConfig, SessionError};
use warden_agent::supervisor::{ProcessSupervisor, SupervisorConfig};
use warden_protocol::reconnect::ReconnectConfig;
use warden_protocol::ConnectionManager;

struct Agent {
    cancel: CancellationToken,
    handle: JoinHandle<Result<(), SessionError>>,
    supervisor: Arc<ProcessSupervisor>,
}

impl Agent {
    fn spawn(addr: SocketAddr, desired: &[&str]) -> Self {
        Self::spawn_with(addr, desired, "exec sleep 30", Duration::from_secs(2))
    }

    /// Spawn an agent whose workers run `script` under `sh -c`.
    fn spawn_with(addr: SocketAddr, desired: &[&str], script: &str, stop_grace: Duration) -> Self {
        let supervisor = Arc::new(ProcessSupervisor::new(SupervisorConfig {
            program: PathBuf::from("sh"),
            args: vec!["-c".to_string(), script.to_string()],
            stop_grace,
            env: Vec::new(),
        }));
        let desired: BTreeSet<String> = desired.iter().map(|q| q.to_string()).collect();

        let manager = ConnectionManager::new();
        register_handlers(
            &manager,
            Arc::new(NodeControl::new(Arc::clone(&supervisor), desired)),
        );

        let config = SessionConfig {
            url: format!("ws://{addr}/worker/ws"),
            api_key: WORKER_KEY.to_string(),
            worker_name: "node-1".to_string(),
            reconnect: ReconnectConfig::fixed(Duration::from_millis(50)),
        };
        let cancel = CancellationToken::new();
        let handle = {
            let cancel = cancel.clone();
            tokio::spawn(async move { session::run(&config, Arc::new(manager), cancel).await })
        };

        Self {
            cancel,
            handle,
            supervisor,
        }
    }

    async fn shutdown(self) {
        self.cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        self.supervisor.stop_all().await;
    }
}

/// Poll `/worker/list_workers` until `count` nodes are connected.
async fn wait_for_nodes(app: &Router, count: usize) -> Vec<Value> {
    for _ in 0..100 {
        let json = body_json(get(app, "/worker/list_workers").await).await;
        let nodes = json["data"].as_array().unwrap().clone();
        if nodes.len() == count {
            return nodes;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("expected {count} connected nodes");
}

fn queues(json: &Value) -> Vec<String> {
    serde_json::from_value(json["data"]["queues"].clone()).unwrap()
}

// ---------------------------------------------------------------------------
// Test: a real agent managed through the HTTP routes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn agent_is_managed_through_fleet_routes() {
    let t = build_test_app();
    let addr = serve(t.app.clone()).await;
    let agent = Agent::spawn(addr, &["enrichment"]);

    let nodes = wait_for_nodes(&t.app, 1).await;
    let id = nodes[0]["id"].as_str().unwrap().to_string();
    assert_eq!(nodes[0]["name"], "node-1");

    // Ping
    let json = body_json(get(&t.app, "/worker/ping").await).await;
    assert_eq!(json["data"][&id], "pong");

    // Add
    let response = post_json(
        &t.app,
        &format!("/worker/addQueue/{id}"),
        json!({ "queue_name": "correlation" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(queues(&body_json(response).await), vec!["correlation"]);
    assert_eq!(agent.supervisor.list_running(), vec!["correlation"]);

    // The mirror feeds /worker/queues.
    let json = body_json(get(&t.app, "/worker/queues").await).await;
    let correlation = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|q| q["queue"] == "correlation")
        .unwrap()
        .clone();
    assert_eq!(correlation["consumers"], json!([id.clone()]));

    // Ask the node directly.
    let json = body_json(get(&t.app, &format!("/worker/jobqueue/{id}")).await).await;
    assert_eq!(queues(&json), vec!["correlation"]);

    // Remove
    let json = body_json(
        post_json(
            &t.app,
            &format!("/worker/removeQueue/{id}"),
            json!({ "queue_name": "correlation" }),
        )
        .await,
    )
    .await;
    assert!(queues(&json).is_empty());

    // Unpause resets to the desired set, pause stops everything.
    let json = body_json(post(&t.app, &format!("/worker/unpause/{id}")).await).await;
    assert_eq!(queues(&json), vec!["enrichment"]);
    let json = body_json(post(&t.app, &format!("/worker/pause/{id}")).await).await;
    assert!(queues(&json).is_empty());
    assert!(agent.supervisor.list_running().is_empty());

    // A bad queue name never reaches the node.
    let response = post_json(
        &t.app,
        &format!("/worker/addQueue/{id}"),
        json!({ "queue_name": "../etc" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    agent.shutdown().await;
    wait_for_nodes(&t.app, 0).await;
}

// ---------------------------------------------------------------------------
// Test: a stop that outlasts the command timeout still updates the mirror
// ---------------------------------------------------------------------------

#[tokio::test]
async fn slow_stop_reply_refreshes_queue_listing() {
    let t = build_test_app_with_timeout(Duration::from_millis(300));
    let addr = serve(t.app.clone()).await;
    let agent = Agent::spawn_with(
        addr,
        &[],
        "trap '' TERM; while :; do sleep 0.1; done",
        Duration::from_secs(1),
    );

    let nodes = wait_for_nodes(&t.app, 1).await;
    let id = nodes[0]["id"].as_str().unwrap().to_string();
    let body = json!({ "queue_name": "correlation" });

    let response = post_json(&t.app, &format!("/worker/addQueue/{id}"), body.clone()).await;
    assert_eq!(response.status(), StatusCode::OK);

    // The worker ignores SIGTERM, so the reply waits for the kill.
    let response = post_json(&t.app, &format!("/worker/removeQueue/{id}"), body).await;
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);

    let mut refreshed = false;
    for _ in 0..100 {
        let nodes = wait_for_nodes(&t.app, 1).await;
        if nodes[0]["queues"] == json!([]) {
            refreshed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(refreshed, "mirror still lists the stopped queue");
    assert!(agent.supervisor.list_running().is_empty());

    let json = body_json(get(&t.app, "/worker/queues").await).await;
    let correlation = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|q| q["queue"] == "correlation")
        .unwrap()
        .clone();
    assert_eq!(correlation["consumers"], json!([]));

    agent.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: the upgrade is refused with the HTTP status
// ---------------------------------------------------------------------------

#[tokio::test]
async fn upgrade_without_valid_token_is_refused() {
    let t = build_test_app();
    let addr = serve(t.app.clone()).await;
    let url = format!("ws://{addr}/worker/ws");

    let err = connect_async(url.as_str()).await.unwrap_err();
    assert_matches!(err, tungstenite::Error::Http(response) if response.status() == 401);

    let mut request = url.as_str().into_client_request().unwrap();
    request
        .headers_mut()
        .insert("authorization", "Bearer wrong".parse().unwrap());
    let err = connect_async(request).await.unwrap_err();
    assert_matches!(err, tungstenite::Error::Http(response) if response.status() == 403);

    assert_eq!(t.fleet.node_count(), 0);
}

// ---------------------------------------------------------------------------
// Test: hand-driven node: seeding, timeout, disconnect
// ---------------------------------------------------------------------------

#[tokio::test]
async fn silent_node_is_seeded_then_times_out() {
    let t = build_test_app_with_timeout(Duration::from_millis(300));
    let addr = serve(t.app.clone()).await;

    let mut request = format!("ws://{addr}/worker/ws").into_client_request().unwrap();
    request
        .headers_mut()
        .insert("authorization", format!("Bearer {WORKER_KEY}").parse().unwrap());
    let (mut ws, _) = connect_async(request).await.unwrap();

    // The master asks for the running queues right after connecting.
    let seed = loop {
        if let Some(Ok(Message::Text(text))) = ws.next().await {
            break serde_json::from_str::<Value>(&text).unwrap();
        }
    };
    assert_eq!(seed["msg"], "currently_listened_queues");
    let reply = json!({ "conversation_id": seed["conversation_id"], "msg": ["enrichment"] });
    ws.send(Message::Text(reply.to_string())).await.unwrap();

    let mut seeded = false;
    for _ in 0..100 {
        let nodes = wait_for_nodes(&t.app, 1).await;
        if nodes[0]["queues"] == json!(["enrichment"]) {
            seeded = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(seeded, "mirror was not seeded");
    let id = t.fleet.list_nodes()[0].id.clone();
    assert!(t.fleet.list_nodes()[0].name.is_none());

    // Nobody answers now.
    let response = post(&t.app, &format!("/worker/pause/{id}")).await;
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body_json(response).await["code"], "NODE_TIMEOUT");

    let json = body_json(get(&t.app, "/worker/ping").await).await;
    assert_eq!(json["data"][&id], "timeout");

    // Hanging up removes the node.
    ws.close(None).await.unwrap();
    drop(ws);
    wait_for_nodes(&t.app, 0).await;
}

#[tokio::test]
async fn master_shutdown_closes_node_connections() {
    let t = build_test_app();
    let addr = serve(t.app.clone()).await;

    let mut request = format!("ws://{addr}/worker/ws").into_client_request().unwrap();
    request
        .headers_mut()
        .insert("authorization", format!("Bearer {WORKER_KEY}").parse().unwrap());
    let (mut ws, _) = connect_async(request).await.unwrap();
    wait_for_nodes(&t.app, 1).await;

    t.fleet.shutdown_all();

    let closed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "node connection was not closed");
}
