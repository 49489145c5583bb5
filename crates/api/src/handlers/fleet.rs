//! Handlers for fleet management.
//!
//! Every route targeting a node answers with the node's resulting queue
//! list. An unknown node is a 404 and a node that does not answer is a 504.

use std::collections::{BTreeMap, BTreeSet};

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use warden_core::queue::QueueCounters;
use warden_core::types::NodeId;

use crate::error::AppResult;
use crate::fleet::NodeInfo;
use crate::middleware::auth::RequireApiKey;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct QueueNameBody {
    pub queue_name: String,
}

#[derive(Debug, Serialize)]
pub struct NodeQueues {
    pub node_id: NodeId,
    pub queues: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct QueueView {
    pub queue: String,
    pub counters: QueueCounters,
    pub consumers: BTreeSet<NodeId>,
}

type NodeQueuesResponse = AppResult<Json<DataResponse<NodeQueues>>>;

fn node_queues_response(node_id: NodeId, queues: Vec<String>) -> NodeQueuesResponse {
    Ok(Json(DataResponse {
        data: NodeQueues { node_id, queues },
    }))
}

// ---------------------------------------------------------------------------
// Fleet-wide
// ---------------------------------------------------------------------------

/// GET /worker/ping -- `{node_id: "pong" | "timeout"}`.
pub async fn ping_workers(
    _: RequireApiKey,
    State(state): State<AppState>,
) -> Json<DataResponse<BTreeMap<NodeId, Value>>> {
    Json(DataResponse {
        data: state.fleet.ping_all().await,
    })
}

/// GET /worker/list_workers
pub async fn list_workers(
    _: RequireApiKey,
    State(state): State<AppState>,
) -> Json<DataResponse<Vec<NodeInfo>>> {
    Json(DataResponse {
        data: state.fleet.list_nodes(),
    })
}

/// GET /worker/queues -- counters from the backend, consumers from the mirrors.
pub async fn list_queues(
    _: RequireApiKey,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<QueueView>>>> {
    let mut consumers = state.fleet.queue_consumers();
    let mut queues: Vec<QueueView> = state
        .controller
        .queue_overview()
        .await?
        .into_iter()
        .map(|(queue, counters)| QueueView {
            consumers: consumers.remove(&queue).unwrap_or_default(),
            queue,
            counters,
        })
        .collect();

    // Queues nodes consume that no job type routes to.
    queues.extend(consumers.into_iter().map(|(queue, consumers)| QueueView {
        queue,
        counters: QueueCounters::default(),
        consumers,
    }));

    Ok(Json(DataResponse { data: queues }))
}

// ---------------------------------------------------------------------------
// Per-node
// ---------------------------------------------------------------------------

/// POST /worker/addQueue/{node}
pub async fn add_queue(
    _: RequireApiKey,
    State(state): State<AppState>,
    Path(node_id): Path<NodeId>,
    Json(body): Json<QueueNameBody>,
) -> NodeQueuesResponse {
    let queues = state.fleet.add_queue(&node_id, &body.queue_name).await?;
    tracing::info!(node_id = %node_id, queue = %body.queue_name, "Queue added to node");
    node_queues_response(node_id, queues)
}

/// POST /worker/removeQueue/{node}
pub async fn remove_queue(
    _: RequireApiKey,
    State(state): State<AppState>,
    Path(node_id): Path<NodeId>,
    Json(body): Json<QueueNameBody>,
) -> NodeQueuesResponse {
    let queues = state.fleet.remove_queue(&node_id, &body.queue_name).await?;
    tracing::info!(node_id = %node_id, queue = %body.queue_name, "Queue removed from node");
    node_queues_response(node_id, queues)
}

/// POST /worker/pause/{node}
pub async fn pause(
    _: RequireApiKey,
    State(state): State<AppState>,
    Path(node_id): Path<NodeId>,
) -> NodeQueuesResponse {
    let queues = state.fleet.pause(&node_id).await?;
    tracing::info!(node_id = %node_id, "Node paused");
    node_queues_response(node_id, queues)
}

/// POST /worker/unpause/{node}
pub async fn unpause(
    _: RequireApiKey,
    State(state): State<AppState>,
    Path(node_id): Path<NodeId>,
) -> NodeQueuesResponse {
    let queues = state.fleet.unpause(&node_id).await?;
    tracing::info!(node_id = %node_id, queues = ?queues, "Node unpaused");
    node_queues_response(node_id, queues)
}

/// GET /worker/jobqueue/{node} -- asks the node, not the mirror.
pub async fn node_queues(
    _: RequireApiKey,
    State(state): State<AppState>,
    Path(node_id): Path<NodeId>,
) -> NodeQueuesResponse {
    let queues = state.fleet.node_queues(&node_id).await?;
    node_queues_response(node_id, queues)
}
