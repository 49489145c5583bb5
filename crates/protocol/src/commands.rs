//! Fleet control command vocabulary.
//!
//! The master sends these as `msg` values; the node agent registers a
//! handler for each. Queue-affecting commands are answered with the
//! node's resulting queue list so the master can refresh its mirror.

use serde_json::Value;

use crate::envelope::{Envelope, Request};

pub const CMD_PING: &str = "ping";
pub const CMD_CURRENTLY_LISTENED_QUEUES: &str = "currently_listened_queues";
pub const CMD_ADD_QUEUE: &str = "add_queue";
pub const CMD_REMOVE_QUEUE: &str = "remove_queue";
pub const CMD_REMOVE_ALL_QUEUES: &str = "remove_all_queues";
pub const CMD_RESET_QUEUES: &str = "reset_queues";

/// Reply `msg` to [`CMD_PING`].
pub const REPLY_PONG: &str = "pong";

/// Extra envelope field naming the queue for add/remove.
pub const FIELD_QUEUE_NAME: &str = "queue_name";

/// Key of the error object a handler replies with on bad input.
pub const FIELD_ERROR: &str = "error";

/// A typed control command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ping,
    CurrentlyListenedQueues,
    AddQueue(String),
    RemoveQueue(String),
    RemoveAllQueues,
    ResetQueues,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ping => CMD_PING,
            Self::CurrentlyListenedQueues => CMD_CURRENTLY_LISTENED_QUEUES,
            Self::AddQueue(_) => CMD_ADD_QUEUE,
            Self::RemoveQueue(_) => CMD_REMOVE_QUEUE,
            Self::RemoveAllQueues => CMD_REMOVE_ALL_QUEUES,
            Self::ResetQueues => CMD_RESET_QUEUES,
        }
    }

    pub fn into_request(self) -> Request {
        let request = Request::new(self.name());
        match self {
            Self::AddQueue(queue) | Self::RemoveQueue(queue) => {
                request.with_field(FIELD_QUEUE_NAME, queue)
            }
            _ => request,
        }
    }
}

impl From<Command> for Request {
    fn from(command: Command) -> Self {
        command.into_request()
    }
}

/// Extract a queue list from a reply envelope.
///
/// Returns `None` when `msg` is not an array of strings, e.g. an error
/// object.
pub fn queue_list(reply: &Envelope) -> Option<Vec<String>> {
    let items = reply.msg.as_array()?;
    items
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect()
}

/// Extract the error message from a handler's error reply.
pub fn reply_error(reply: &Envelope) -> Option<&str> {
    reply.msg.get(FIELD_ERROR).and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn add_queue_carries_queue_name() {
        let envelope = Command::AddQueue("correlation".into())
            .into_request()
            .into_envelope("c".into());
        assert_eq!(envelope.command(), Some(CMD_ADD_QUEUE));
        assert_eq!(envelope.str_field(FIELD_QUEUE_NAME), Some("correlation"));
    }

    #[test]
    fn ping_has_no_extra_fields() {
        let envelope = Command::Ping.into_request().into_envelope("c".into());
        assert!(envelope.extra.is_empty());
    }

    #[test]
    fn queue_list_parses_string_arrays_only() {
        let ok = Envelope::new("c", json!(["a", "b"]));
        assert_eq!(queue_list(&ok), Some(vec!["a".to_string(), "b".to_string()]));

        let mixed = Envelope::new("c", json!(["a", 1]));
        assert_eq!(queue_list(&mixed), None);

        let error = Envelope::new("c", json!({"error": "bad"}));
        assert_eq!(queue_list(&error), None);
        assert_eq!(reply_error(&error), Some("bad"));
    }
}
