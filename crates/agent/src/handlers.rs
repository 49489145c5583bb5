//! The node's command dispatch table.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::{Map, Value};
use warden_core::naming::validate_queue_name;
use warden_protocol::commands::{
    CMD_ADD_QUEUE, CMD_CURRENTLY_LISTENED_QUEUES, CMD_PING, CMD_REMOVE_ALL_QUEUES,
    CMD_REMOVE_QUEUE, CMD_RESET_QUEUES, FIELD_ERROR, FIELD_QUEUE_NAME, REPLY_PONG,
};
use warden_protocol::{ConnectionManager, Envelope};

use crate::supervisor::ProcessSupervisor;

fn error_reply(message: impl Into<String>) -> Value {
    let mut body = Map::new();
    body.insert(FIELD_ERROR.to_string(), Value::String(message.into()));
    Value::Object(body)
}

/// Command bodies. Each queue-affecting command replies with the
/// resulting sorted queue list.
pub struct NodeControl {
    supervisor: Arc<ProcessSupervisor>,
    desired: BTreeSet<String>,
}

impl NodeControl {
    pub fn new(supervisor: Arc<ProcessSupervisor>, desired: BTreeSet<String>) -> Self {
        Self {
            supervisor,
            desired,
        }
    }

    fn queues(&self) -> Value {
        Value::from(self.supervisor.list_running())
    }

    fn queue_name<'a>(&self, envelope: &'a Envelope) -> Result<&'a str, Value> {
        let name = envelope
            .str_field(FIELD_QUEUE_NAME)
            .ok_or_else(|| error_reply(format!("missing '{FIELD_QUEUE_NAME}'")))?;
        validate_queue_name(name).map_err(|e| error_reply(e.to_string()))?;
        Ok(name)
    }

    pub fn ping(&self) -> Value {
        Value::from(REPLY_PONG)
    }

    pub fn currently_listened_queues(&self) -> Value {
        self.queues()
    }

    pub fn add_queue(&self, envelope: &Envelope) -> Value {
        let name = match self.queue_name(envelope) {
            Ok(name) => name,
            Err(reply) => return reply,
        };
        match self.supervisor.start(name) {
            Ok(_) => self.queues(),
            Err(e) => error_reply(e.to_string()),
        }
    }

    pub async fn remove_queue(&self, envelope: &Envelope) -> Value {
        let name = match self.queue_name(envelope) {
            Ok(name) => name,
            Err(reply) => return reply,
        };
        self.supervisor.stop(name).await;
        self.queues()
    }

    pub async fn remove_all_queues(&self) -> Value {
        self.supervisor.stop_all().await;
        self.queues()
    }

    pub async fn reset_queues(&self) -> Value {
        match self.supervisor.reconcile(&self.desired).await {
            Ok(queues) => Value::from(queues),
            Err(e) => error_reply(e.to_string()),
        }
    }
}

/// Wire every node command into `manager`.
pub fn register_handlers(manager: &ConnectionManager, control: Arc<NodeControl>) {
    let c = Arc::clone(&control);
    manager.register_handler(CMD_PING, move |_: Envelope| {
        let c = Arc::clone(&c);
        async move { Some(c.ping()) }
    });

    let c = Arc::clone(&control);
    manager.register_handler(CMD_CURRENTLY_LISTENED_QUEUES, move |_: Envelope| {
        let c = Arc::clone(&c);
        async move { Some(c.currently_listened_queues()) }
    });

    let c = Arc::clone(&control);
    manager.register_handler(CMD_ADD_QUEUE, move |envelope: Envelope| {
        let c = Arc::clone(&c);
        async move { Some(c.add_queue(&envelope)) }
    });

    let c = Arc::clone(&control);
    manager.register_handler(CMD_REMOVE_QUEUE, move |envelope: Envelope| {
        let c = Arc::clone(&c);
        async move { Some(c.remove_queue(&envelope).await) }
    });

    let c = Arc::clone(&control);
    manager.register_handler(CMD_REMOVE_ALL_QUEUES, move |_: Envelope| {
        let c = Arc::clone(&c);
        async move { Some(c.remove_all_queues().await) }
    });

    let c = control;
    manager.register_handler(CMD_RESET_QUEUES, move |_: Envelope| {
        let c = Arc::clone(&c);
        async move { Some(c.reset_queues().await) }
    });
}
