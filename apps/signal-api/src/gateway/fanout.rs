//! Broadcast hub for project events.
//!
//! Uses a single `tokio::sync::broadcast` channel. Each connected session
//! subscribes and filters events locally by its project subscriptions, so
//! project traffic never touches the room directory.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast;

use super::events::GatewayMessage;
use super::registry::ConnectionId;

/// Capacity of the broadcast channel. Slow receivers that fall behind will
/// skip messages (RecvError::Lagged).
const BROADCAST_CAPACITY: usize = 4096;

/// A project event broadcast to all connected sessions.
#[derive(Debug, Clone)]
pub struct BroadcastPayload {
    pub project_id: String,
    /// Event name sent to clients (e.g. "taskCreated").
    pub event_name: String,
    pub data: Value,
    /// Connection that produced the event, which does not get it back.
    pub origin: Option<ConnectionId>,
}

impl BroadcastPayload {
    pub fn to_message(&self) -> GatewayMessage {
        GatewayMessage::new(&self.event_name, self.data.clone())
    }
}

/// Cloneable; store in AppState.
#[derive(Clone)]
pub struct ProjectBroadcast {
    sender: broadcast::Sender<Arc<BroadcastPayload>>,
}

impl ProjectBroadcast {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<BroadcastPayload>> {
        self.sender.subscribe()
    }

    /// Publish an event. Returns the number of sessions that will see it,
    /// before per-session project filtering.
    pub fn publish(&self, payload: BroadcastPayload) -> usize {
        // Err only means nobody is connected.
        self.sender.send(Arc::new(payload)).unwrap_or(0)
    }
}

impl Default for ProjectBroadcast {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(project_id: &str) -> BroadcastPayload {
        BroadcastPayload {
            project_id: project_id.to_string(),
            event_name: "taskCreated".to_string(),
            data: serde_json::json!({ "title": "Draft" }),
            origin: None,
        }
    }

    #[tokio::test]
    async fn every_receiver_gets_published_payload() {
        let hub = ProjectBroadcast::new();
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();

        assert_eq!(hub.publish(payload("prj_1")), 2);

        let got = a.recv().await.unwrap();
        assert_eq!(got.project_id, "prj_1");
        assert_eq!(b.recv().await.unwrap().event_name, "taskCreated");

        let message = got.to_message();
        assert_eq!(message.t, "taskCreated");
        assert_eq!(message.d["title"], "Draft");
    }

    #[test]
    fn publish_without_receivers_is_harmless() {
        let hub = ProjectBroadcast::new();
        assert_eq!(hub.publish(payload("prj_1")), 0);
    }
}
