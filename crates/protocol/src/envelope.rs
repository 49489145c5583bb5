//! Control message envelope.
//!
//! Every frame on the control connection is a JSON object of the shape
//! `{"conversation_id": "<id>", "msg": <string or object>, ...extra}`.
//! Replies reuse the conversation id of the request they answer.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Generate a fresh conversation id (UUID v4).
pub fn new_conversation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// One framed control message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub conversation_id: String,
    pub msg: Value,
    /// Implementation-defined fields carried next to `msg`.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Envelope {
    pub fn new(conversation_id: impl Into<String>, msg: impl Into<Value>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            msg: msg.into(),
            extra: Map::new(),
        }
    }

    /// Parse a text frame.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Serialize to a text frame.
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// The command name, when `msg` is a plain string.
    pub fn command(&self) -> Option<&str> {
        self.msg.as_str()
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }
}

/// The conversation-independent part of an outgoing message.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub msg: Value,
    pub extra: Map<String, Value>,
}

impl Request {
    pub fn new(msg: impl Into<Value>) -> Self {
        Self {
            msg: msg.into(),
            extra: Map::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn into_envelope(self, conversation_id: String) -> Envelope {
        Envelope {
            conversation_id,
            msg: self.msg,
            extra: self.extra,
        }
    }
}

impl From<&str> for Request {
    fn from(msg: &str) -> Self {
        Self::new(msg)
    }
}

impl From<Value> for Request {
    fn from(msg: Value) -> Self {
        Self::new(msg)
    }
}
