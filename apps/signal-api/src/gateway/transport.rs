//! Outbound delivery seam between the signaling core and the socket layer.

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::events::GatewayMessage;
use super::registry::ConnectionId;

/// One outbound message addressed to a single connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub to: ConnectionId,
    pub message: GatewayMessage,
}

impl Delivery {
    pub fn new(to: ConnectionId, message: GatewayMessage) -> Self {
        Self { to, message }
    }
}

/// Capability to hand a message to a connection by id.
///
/// Fire-and-forget: returns `false` when the connection is unknown, gone or
/// backed up, and never blocks.
pub trait Transport: Send + Sync {
    fn deliver(&self, to: &ConnectionId, message: &GatewayMessage) -> bool;
}

/// Hand every delivery to `transport`, returning how many were accepted.
/// Failed sends are dropped without retry.
pub fn dispatch<T: Transport + ?Sized>(transport: &T, deliveries: Vec<Delivery>) -> usize {
    let mut delivered = 0;
    for delivery in deliveries {
        if transport.deliver(&delivery.to, &delivery.message) {
            delivered += 1;
        } else {
            tracing::trace!(to = %delivery.to, event = %delivery.message.t, "dropped undeliverable message");
        }
    }
    delivered
}

/// Frames queued per connection before further deliveries are dropped.
pub const OUTBOX_CAPACITY: usize = 256;

/// Live WebSocket outboxes keyed by connection id.
///
/// Each connection task owns the receiving half and drains it into its socket.
/// Outboxes are bounded; a connection that stops reading loses messages
/// instead of growing without limit.
pub struct ConnectionTable {
    outboxes: DashMap<ConnectionId, mpsc::Sender<Message>>,
    capacity: usize,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self::with_capacity(OUTBOX_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            outboxes: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn register(&self, connection_id: ConnectionId) -> mpsc::Receiver<Message> {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.outboxes.insert(connection_id, tx);
        rx
    }

    pub fn unregister(&self, connection_id: &ConnectionId) {
        self.outboxes.remove(connection_id);
    }

    pub fn len(&self) -> usize {
        self.outboxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outboxes.is_empty()
    }
}

impl Default for ConnectionTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for ConnectionTable {
    fn deliver(&self, to: &ConnectionId, message: &GatewayMessage) -> bool {
        let Some(outbox) = self.outboxes.get(to) else {
            return false;
        };
        match outbox.try_send(Message::Text(message.to_json().into())) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(connection_id = %to, event = %message.t, "outbox full, dropping message");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivers_to_registered_connection() {
        let table = ConnectionTable::new();
        let id = ConnectionId::from("conn_a");
        let mut rx = table.register(id.clone());

        let msg = GatewayMessage::heartbeat_ack(3);
        assert!(table.deliver(&id, &msg));

        let Ok(Message::Text(text)) = rx.try_recv() else {
            panic!("expected a text frame");
        };
        let value: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
        assert_eq!(value["t"], "heartbeat:ack");
    }

    #[test]
    fn delivery_to_unknown_or_closed_connection_fails_quietly() {
        let table = ConnectionTable::new();
        let gone = ConnectionId::from("conn_gone");
        assert!(!table.deliver(&gone, &GatewayMessage::heartbeat_ack(0)));

        let id = ConnectionId::from("conn_b");
        let rx = table.register(id.clone());
        drop(rx);
        assert!(!table.deliver(&id, &GatewayMessage::heartbeat_ack(0)));
    }

    #[test]
    fn full_outbox_drops_instead_of_growing() {
        let table = ConnectionTable::with_capacity(2);
        let id = ConnectionId::from("conn_slow");
        let mut rx = table.register(id.clone());

        assert!(table.deliver(&id, &GatewayMessage::heartbeat_ack(1)));
        assert!(table.deliver(&id, &GatewayMessage::heartbeat_ack(2)));
        assert!(!table.deliver(&id, &GatewayMessage::heartbeat_ack(3)));

        // Draining frees room again; queued frames keep their order.
        let Ok(Message::Text(text)) = rx.try_recv() else {
            panic!("expected a text frame");
        };
        let value: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
        assert_eq!(value["d"]["ack"], 1);
        assert!(table.deliver(&id, &GatewayMessage::heartbeat_ack(4)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn dispatch_counts_accepted_deliveries() {
        let table = ConnectionTable::new();
        let a = ConnectionId::from("conn_a");
        let _rx = table.register(a.clone());

        let sent = dispatch(
            &table,
            vec![
                Delivery::new(a.clone(), GatewayMessage::heartbeat_ack(1)),
                Delivery::new(ConnectionId::from("conn_x"), GatewayMessage::heartbeat_ack(2)),
            ],
        );
        assert_eq!(sent, 1);

        table.unregister(&a);
        assert!(table.is_empty());
    }
}
