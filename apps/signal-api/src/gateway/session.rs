//! Per-connection gateway session state.

use std::collections::HashSet;

use super::fanout::BroadcastPayload;
use super::registry::ConnectionId;

/// State owned by a single WebSocket task. Room membership lives in the
/// hub; only project subscriptions are tracked here.
pub struct GatewaySession {
    pub connection_id: ConnectionId,
    projects: HashSet<String>,
}

impl GatewaySession {
    pub fn new(connection_id: ConnectionId) -> Self {
        Self {
            connection_id,
            projects: HashSet::new(),
        }
    }

    /// Returns `false` for an empty id or an existing subscription.
    pub fn subscribe(&mut self, project_id: &str) -> bool {
        if project_id.is_empty() {
            return false;
        }
        self.projects.insert(project_id.to_string())
    }

    pub fn unsubscribe(&mut self, project_id: &str) -> bool {
        self.projects.remove(project_id)
    }

    pub fn is_subscribed(&self, project_id: &str) -> bool {
        self.projects.contains(project_id)
    }

    /// Whether a broadcast payload should be forwarded to this connection.
    pub fn wants(&self, payload: &BroadcastPayload) -> bool {
        payload.origin.as_ref() != Some(&self.connection_id) && self.is_subscribed(&payload.project_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(project_id: &str, origin: Option<&str>) -> BroadcastPayload {
        BroadcastPayload {
            project_id: project_id.to_string(),
            event_name: "project:message".to_string(),
            data: serde_json::Value::Null,
            origin: origin.map(ConnectionId::from),
        }
    }

    #[test]
    fn subscribe_and_unsubscribe() {
        let mut session = GatewaySession::new(ConnectionId::from("conn_a"));
        assert!(session.subscribe("prj_1"));
        assert!(!session.subscribe("prj_1"));
        assert!(!session.subscribe(""));
        assert!(session.is_subscribed("prj_1"));

        assert!(session.unsubscribe("prj_1"));
        assert!(!session.unsubscribe("prj_1"));
        assert!(!session.is_subscribed("prj_1"));
    }

    #[test]
    fn skips_own_and_unsubscribed_events() {
        let mut session = GatewaySession::new(ConnectionId::from("conn_a"));
        session.subscribe("prj_1");

        assert!(session.wants(&payload("prj_1", None)));
        assert!(session.wants(&payload("prj_1", Some("conn_b"))));
        assert!(!session.wants(&payload("prj_1", Some("conn_a"))));
        assert!(!session.wants(&payload("prj_2", None)));
    }
}
