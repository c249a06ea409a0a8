use std::sync::Arc;

use tavern_core::{ConnectionId, EventSink, ServerEvent};

use crate::client::ClientRegistry;

/// Fans server events out to connected viewers.
///
/// Each event is serialized once; every recipient gets the same bytes.
#[derive(Clone)]
pub struct BroadcastGateway {
    registry: Arc<ClientRegistry>,
}

impl BroadcastGateway {
    pub fn new(registry: Arc<ClientRegistry>) -> Self {
        Self { registry }
    }
}

fn serialize_event(event: &ServerEvent) -> Option<String> {
    match event.encode() {
        Ok(json) => Some(json),
        Err(e) => {
            tracing::warn!(event = event.event_name(), error = %e, "failed to serialize event");
            None
        }
    }
}

impl EventSink for BroadcastGateway {
    fn send_to(&self, connection: &ConnectionId, event: &ServerEvent) {
        let Some(json) = serialize_event(event) else {
            return;
        };
        if !self.registry.send_to(connection, json) {
            tracing::debug!(connection_id = %connection, event = event.event_name(), "direct send not delivered");
        }
    }

    fn broadcast(&self, event: &ServerEvent) {
        let Some(json) = serialize_event(event) else {
            return;
        };
        let recipients = self.registry.broadcast(&json);
        tracing::debug!(event = event.event_name(), recipients, "broadcast event");
    }
}
