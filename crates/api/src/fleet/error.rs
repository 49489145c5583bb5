use warden_core::types::NodeId;
use warden_protocol::ProtocolError;

#[derive(Debug, thiserror::Error)]
pub enum FleetError {
    #[error("Node '{0}' is not connected")]
    NodeNotFound(NodeId),

    /// No reply before the command timeout. A node that disconnects while
    /// a command is in flight ends up here too.
    #[error("Node '{0}' did not reply in time")]
    NodeTimeout(NodeId),

    #[error("Validation failed: {0}")]
    Validation(String),

    /// The node answered with an error object.
    #[error("Node '{node_id}' rejected the command: {reason}")]
    CommandRejected { node_id: NodeId, reason: String },

    #[error("Invalid node reply: {0}")]
    InvalidReply(String),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
