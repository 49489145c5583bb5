//! Request/reply plumbing for the master ⇄ node control connection.
//!
//! Both ends hold a [`ConnectionManager`]: the master as a server shared
//! across every node connection, the node as a client with a single
//! connection. The manager correlates replies with pending requests by
//! conversation id and hands everything else to a dispatch table of
//! [`CommandHandler`]s. It knows nothing about what commands mean.

pub mod commands;
pub mod envelope;
pub mod manager;
pub mod reconnect;

pub use envelope::{new_conversation_id, Envelope, Request};
pub use manager::{
    CommandHandler, Connection, ConnectionManager, Inbound, ProtocolError, Response,
    DEFAULT_COMMAND_TIMEOUT,
};
