use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};

use crate::fleet::{FleetManager, NodeSession};
use crate::middleware::auth::RequireWorkerKey;
use crate::state::AppState;

/// Interval between protocol-level Ping frames on each node connection.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Upgrade header carrying the node's display name.
pub const WORKER_NAME_HEADER: &str = "x-worker-name";

/// GET /worker/ws -- upgrade an authenticated node to the control connection.
///
/// The bearer token is checked before the upgrade, so a rejected node gets
/// a plain 401/403 response.
pub async fn ws_handler(
    _: RequireWorkerKey,
    headers: HeaderMap,
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let name = headers
        .get(WORKER_NAME_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    ws.on_upgrade(move |socket| handle_socket(socket, state.fleet, name))
}

/// Drive one node connection until either side hangs up.
///
/// Outbound envelopes, heartbeat pings and inbound frames share one loop,
/// so frames from the node are demultiplexed in arrival order.
async fn handle_socket(socket: WebSocket, fleet: Arc<FleetManager>, name: Option<String>) {
    let NodeSession {
        id: node_id,
        mut outbound,
        dropped,
    } = fleet.on_connect(name);
    let (mut sink, mut stream) = socket.split();

    // Seed the queue mirror. The reply comes back through the loop below.
    {
        let fleet = Arc::clone(&fleet);
        let node_id = node_id.clone();
        tokio::spawn(async move {
            if let Err(e) = fleet.node_queues(&node_id).await {
                tracing::warn!(node_id = %node_id, error = %e, "Could not seed node queues");
            }
        });
    }

    let mut heartbeat = tokio::time::interval_at(
        tokio::time::Instant::now() + HEARTBEAT_INTERVAL,
        HEARTBEAT_INTERVAL,
    );

    loop {
        tokio::select! {
            _ = dropped.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
            Some(envelope) = outbound.recv() => {
                let text = match envelope.to_text() {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(node_id = %node_id, error = %e, "Failed to serialize envelope");
                        continue;
                    }
                };
                if sink.send(Message::Text(text.into())).await.is_err() {
                    tracing::debug!(node_id = %node_id, "Node socket sink closed");
                    break;
                }
            }
            _ = heartbeat.tick() => {
                tracing::trace!(node_id = %node_id, "Heartbeat ping");
                if sink.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if fleet.on_message(&node_id, text.as_str()).await.is_none() {
                        break;
                    }
                }
                Some(Ok(Message::Pong(_))) => {
                    tracing::trace!(node_id = %node_id, "Pong received");
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(node_id = %node_id, error = %e, "Node socket receive error");
                    break;
                }
            },
        }
    }

    fleet.on_disconnect(&node_id);
}
