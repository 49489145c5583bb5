use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use warden_core::job::JobType;
use warden_core::naming::validate_queue_name;
use warden_core::types::{NodeId, Timestamp};
use warden_protocol::commands::{queue_list, reply_error, Command, CMD_PING, REPLY_PONG};
use warden_protocol::{
    new_conversation_id, Connection, ConnectionManager, Envelope, Inbound, ProtocolError, Response,
};

use super::error::FleetError;

/// Reported by [`FleetManager::ping_all`] for a node that did not answer.
pub const PING_TIMEOUT: &str = "timeout";

/// Queue commands per node whose replies may still refresh the mirror.
const MAX_TRACKED_COMMANDS: usize = 64;

/// Local view of one connected node.
#[derive(Debug, Clone, Serialize)]
pub struct NodeInfo {
    pub id: NodeId,
    /// Display name from the `X-Worker-Name` upgrade header.
    pub name: Option<String>,
    pub connected_at: Timestamp,
    /// Mirror of the node's running queues, refreshed from every
    /// queue-affecting reply.
    pub queues: BTreeSet<String>,
}

/// What the socket task of a newly registered node drives.
pub struct NodeSession {
    pub id: NodeId,
    /// Envelopes to write to the node's socket.
    pub outbound: UnboundedReceiver<Envelope>,
    /// Cancelled when the fleet drops the node.
    pub dropped: CancellationToken,
}

struct NodeEntry {
    conn: Connection,
    info: NodeInfo,
    dropped: CancellationToken,
    /// Conversation ids of queue commands sent to this node that have not
    /// been answered in time. A late queue-list reply still updates the mirror.
    tracked: VecDeque<String>,
}

/// Membership of connected nodes plus the fleet operations on them.
///
/// The node map is only locked for lookups and mirror updates. Round trips
/// run on a cloned [`Connection`], so a node that disconnects mid-command
/// simply lets the command time out.
pub struct FleetManager {
    connections: ConnectionManager,
    nodes: RwLock<HashMap<NodeId, NodeEntry>>,
}

impl FleetManager {
    pub fn new(command_timeout: Duration) -> Self {
        let connections = ConnectionManager::with_default_timeout(command_timeout);
        connections.register_handler(CMD_PING, |_: Envelope| async {
            Some(Value::from(REPLY_PONG))
        });

        Self {
            connections,
            nodes: RwLock::new(HashMap::new()),
        }
    }

    // -----------------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------------

    /// Register an authenticated node under a fresh id.
    pub fn on_connect(&self, name: Option<String>) -> NodeSession {
        let id = uuid::Uuid::new_v4().to_string();
        let (conn, outbound) = Connection::channel(id.clone());
        let info = NodeInfo {
            id: id.clone(),
            name,
            connected_at: chrono::Utc::now(),
            queues: BTreeSet::new(),
        };

        let dropped = CancellationToken::new();

        tracing::info!(node_id = %id, name = ?info.name, "Node connected");
        self.write().insert(
            id.clone(),
            NodeEntry {
                conn,
                info,
                dropped: dropped.clone(),
                tracked: VecDeque::new(),
            },
        );
        NodeSession {
            id,
            outbound,
            dropped,
        }
    }

    /// Forget a node. Commands still waiting on it expire by timeout.
    pub fn on_disconnect(&self, node_id: &str) -> bool {
        let Some(entry) = self.write().remove(node_id) else {
            return false;
        };
        entry.dropped.cancel();
        tracing::info!(node_id = %node_id, "Node disconnected");
        true
    }

    /// Feed one inbound text frame from `node_id` to the demultiplexer.
    ///
    /// A queue-list reply to a command that already timed out is not lost:
    /// it refreshes the node's mirror. Returns `None` once the node is no
    /// longer registered.
    pub async fn on_message(&self, node_id: &str, text: &str) -> Option<Inbound> {
        let conn = self.connection(node_id).ok()?;
        let Ok(envelope) = Envelope::parse(text) else {
            return Some(self.connections.on_message_received(&conn, text).await);
        };

        let conversation_id = envelope.conversation_id.clone();
        let queues = queue_list(&envelope);
        let inbound = self.connections.on_envelope(&conn, envelope).await;

        if matches!(inbound, Inbound::Unknown | Inbound::Late) {
            if let Some(queues) = queues {
                if self.apply_late_reply(node_id, &conversation_id, queues) {
                    return Some(Inbound::Late);
                }
            }
        }
        Some(inbound)
    }

    pub fn node_count(&self) -> usize {
        self.read().len()
    }

    pub fn is_connected(&self, node_id: &str) -> bool {
        self.read().contains_key(node_id)
    }

    /// Connected nodes, oldest first. No round trip.
    pub fn list_nodes(&self) -> Vec<NodeInfo> {
        let mut nodes: Vec<NodeInfo> = self.read().values().map(|e| e.info.clone()).collect();
        nodes.sort_by(|a, b| {
            a.connected_at
                .cmp(&b.connected_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        nodes
    }

    /// Queue name to the ids of the nodes consuming it, from the mirrors.
    ///
    /// Every routed queue is listed, with an empty set if nobody consumes it.
    pub fn queue_consumers(&self) -> BTreeMap<String, BTreeSet<NodeId>> {
        let mut consumers: BTreeMap<String, BTreeSet<NodeId>> = JobType::all_queues()
            .into_iter()
            .map(|queue| (queue.to_string(), BTreeSet::new()))
            .collect();

        for (id, entry) in self.read().iter() {
            for queue in &entry.info.queues {
                consumers.entry(queue.clone()).or_default().insert(id.clone());
            }
        }
        consumers
    }

    /// Drop every node. Each socket task sends a Close frame and hangs up.
    pub fn shutdown_all(&self) {
        let mut nodes = self.write();
        let count = nodes.len();
        for (_, entry) in nodes.drain() {
            entry.dropped.cancel();
        }
        tracing::info!(count, "Dropped all node connections");
    }

    // -----------------------------------------------------------------------
    // Fleet operations
    // -----------------------------------------------------------------------

    /// Ping every node concurrently.
    ///
    /// Each node maps to its reply `msg` (normally `"pong"`) or to
    /// [`PING_TIMEOUT`].
    pub async fn ping_all(&self) -> BTreeMap<NodeId, Value> {
        let targets: Vec<(NodeId, Connection)> = self
            .read()
            .iter()
            .map(|(id, entry)| (id.clone(), entry.conn.clone()))
            .collect();

        let replies = join_all(targets.into_iter().map(|(id, conn)| async move {
            let reply = match self
                .connections
                .send_and_wait(&conn, Command::Ping, None, None)
                .await
            {
                Ok(Response::Reply(envelope)) => envelope.msg,
                Ok(Response::Timeout) => Value::from(PING_TIMEOUT),
                Err(e) => {
                    tracing::debug!(node_id = %id, error = %e, "Ping not delivered");
                    Value::from(PING_TIMEOUT)
                }
            };
            (id, reply)
        }))
        .await;

        replies.into_iter().collect()
    }

    pub async fn add_queue(&self, node_id: &str, queue: &str) -> Result<Vec<String>, FleetError> {
        validate_queue_name(queue).map_err(|e| FleetError::Validation(e.to_string()))?;
        self.command(node_id, Command::AddQueue(queue.to_string()))
            .await
    }

    pub async fn remove_queue(
        &self,
        node_id: &str,
        queue: &str,
    ) -> Result<Vec<String>, FleetError> {
        validate_queue_name(queue).map_err(|e| FleetError::Validation(e.to_string()))?;
        self.command(node_id, Command::RemoveQueue(queue.to_string()))
            .await
    }

    /// Stop every queue on the node.
    pub async fn pause(&self, node_id: &str) -> Result<Vec<String>, FleetError> {
        self.command(node_id, Command::RemoveAllQueues).await
    }

    /// Reconcile the node back to its configured desired set.
    pub async fn unpause(&self, node_id: &str) -> Result<Vec<String>, FleetError> {
        self.command(node_id, Command::ResetQueues).await
    }

    /// Ask the node what it is running. Also refreshes the mirror.
    pub async fn node_queues(&self, node_id: &str) -> Result<Vec<String>, FleetError> {
        self.command(node_id, Command::CurrentlyListenedQueues)
            .await
    }

    /// Unicast a queue command and refresh the mirror from the reply.
    async fn command(&self, node_id: &str, command: Command) -> Result<Vec<String>, FleetError> {
        let conn = self.connection(node_id)?;
        let name = command.name();
        let conversation_id = new_conversation_id();
        self.track(node_id, &conversation_id);

        let outcome = self
            .connections
            .send_and_wait(&conn, command, Some(conversation_id.clone()), None)
            .await;
        if !matches!(outcome, Ok(Response::Timeout)) {
            self.untrack(node_id, &conversation_id);
        }

        let response = match outcome {
            Ok(response) => response,
            Err(ProtocolError::ConnectionClosed(_)) => Response::Timeout,
            Err(e) => return Err(e.into()),
        };

        let Some(reply) = response.into_reply() else {
            tracing::warn!(node_id = %node_id, command = name, "Node command timed out");
            return Err(FleetError::NodeTimeout(node_id.to_string()));
        };

        if let Some(reason) = reply_error(&reply) {
            return Err(FleetError::CommandRejected {
                node_id: node_id.to_string(),
                reason: reason.to_string(),
            });
        }

        let queues = queue_list(&reply).ok_or_else(|| {
            FleetError::InvalidReply(format!("{name} reply from {node_id} is not a queue list"))
        })?;

        {
            let mut nodes = self.write();
            if let Some(entry) = nodes.get_mut(node_id) {
                entry.info.queues = queues.iter().cloned().collect();
            }
        }

        tracing::debug!(node_id = %node_id, command = name, queues = ?queues, "Node queues updated");
        Ok(queues)
    }

    fn track(&self, node_id: &str, conversation_id: &str) {
        if let Some(entry) = self.write().get_mut(node_id) {
            entry.tracked.push_back(conversation_id.to_string());
            if entry.tracked.len() > MAX_TRACKED_COMMANDS {
                entry.tracked.pop_front();
            }
        }
    }

    fn untrack(&self, node_id: &str, conversation_id: &str) {
        if let Some(entry) = self.write().get_mut(node_id) {
            entry.tracked.retain(|id| id != conversation_id);
        }
    }

    /// Update the mirror from the reply to a tracked command that timed out.
    fn apply_late_reply(&self, node_id: &str, conversation_id: &str, queues: Vec<String>) -> bool {
        let mut nodes = self.write();
        let Some(entry) = nodes.get_mut(node_id) else {
            return false;
        };
        let Some(position) = entry.tracked.iter().position(|id| id == conversation_id) else {
            return false;
        };
        entry.tracked.remove(position);
        entry.info.queues = queues.into_iter().collect();
        tracing::info!(
            node_id = %node_id,
            queues = ?entry.info.queues,
            "Node queues updated from late reply",
        );
        true
    }

    fn connection(&self, node_id: &str) -> Result<Connection, FleetError> {
        self.read()
            .get(node_id)
            .map(|entry| entry.conn.clone())
            .ok_or_else(|| FleetError::NodeNotFound(node_id.to_string()))
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<NodeId, NodeEntry>> {
        self.nodes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<NodeId, NodeEntry>> {
        self.nodes.write().unwrap_or_else(PoisonError::into_inner)
    }
}
