//! Presence broadcaster: turns membership changes into notifications.
//!
//! Every function here is pure; it only decides who hears what. The
//! departing connection is never notified of its own departure.

use serde_json::{Map, Value};

use crate::error::SignalError;

use super::directory::{JoinOutcome, LeaveOutcome, PeerDescriptor, RoomKind};
use super::events::{EventName, GatewayMessage};
use super::registry::ConnectionId;
use super::transport::Delivery;

/// Wire shape of a member in peer lists and join notifications.
fn describe(peer: &PeerDescriptor) -> Value {
    match peer.profile.kind() {
        RoomKind::Room => serde_json::json!({
            "id": peer.connection_id,
            "name": peer.profile.name(),
        }),
        RoomKind::Meeting => serde_json::json!({
            "socketId": peer.connection_id,
            "userId": peer.profile.user_id(),
            "userName": peer.profile.name(),
        }),
    }
}

/// Notifications for a successful join: the peer list to the joiner, and a
/// `joined` event to every existing member.
///
/// A re-join with an unchanged profile only refreshes the joiner's peer list.
pub fn joined(joiner: &PeerDescriptor, outcome: &JoinOutcome) -> Vec<Delivery> {
    let kind = joiner.profile.kind();
    let mut deliveries = Vec::with_capacity(outcome.peers.len() + 1);

    let peers: Vec<Value> = outcome.peers.iter().map(describe).collect();
    let listing = match kind {
        RoomKind::Room => GatewayMessage::new(EventName::ROOM_PEERS, serde_json::json!({ "peers": peers })),
        RoomKind::Meeting => GatewayMessage::new(EventName::EXISTING_PARTICIPANTS, Value::Array(peers)),
    };
    deliveries.push(Delivery::new(joiner.connection_id.clone(), listing));

    let changed = outcome.previous.as_ref() != Some(&joiner.profile);
    if changed {
        let announcement = match kind {
            RoomKind::Room => GatewayMessage::new(
                EventName::PEER_JOINED,
                serde_json::json!({
                    "peerId": joiner.connection_id,
                    "name": joiner.profile.name(),
                }),
            ),
            RoomKind::Meeting => GatewayMessage::new(EventName::USER_JOINED, describe(joiner)),
        };
        for peer in &outcome.peers {
            deliveries.push(Delivery::new(peer.connection_id.clone(), announcement.clone()));
        }
    }

    deliveries
}

/// `left` notifications to every remaining member.
pub fn left(outcome: &LeaveOutcome) -> Vec<Delivery> {
    let departed = &outcome.departed;
    let message = match departed.profile.kind() {
        RoomKind::Room => GatewayMessage::new(
            EventName::PEER_LEFT,
            serde_json::json!({ "peerId": departed.connection_id }),
        ),
        RoomKind::Meeting => GatewayMessage::new(
            EventName::USER_LEFT,
            serde_json::json!({
                "socketId": departed.connection_id,
                "userName": departed.profile.name(),
            }),
        ),
    };
    outcome
        .remaining
        .iter()
        .map(|to| Delivery::new(to.clone(), message.clone()))
        .collect()
}

/// Error event for a rejected join, addressed to the requester only.
pub fn join_rejected(kind: RoomKind, to: &ConnectionId, err: &SignalError) -> Delivery {
    let event = match kind {
        RoomKind::Room => EventName::ROOM_ERROR,
        RoomKind::Meeting => EventName::MEETING_ERROR,
    };
    Delivery::new(
        to.clone(),
        GatewayMessage::new(event, serde_json::json!({ "message": err.client_message() })),
    )
}

fn fan_out(recipients: &[ConnectionId], message: GatewayMessage) -> Vec<Delivery> {
    recipients
        .iter()
        .map(|to| Delivery::new(to.clone(), message.clone()))
        .collect()
}

/// In-room chat for the generic room flavour. The client timestamp is passed
/// through untouched.
pub fn room_chat(sender: &PeerDescriptor, recipients: &[ConnectionId], text: &str, timestamp: Option<Value>) -> Vec<Delivery> {
    let message = GatewayMessage::new(
        EventName::CHAT_MESSAGE,
        serde_json::json!({
            "senderId": sender.connection_id,
            "name": sender.profile.name(),
            "text": text,
            "timestamp": timestamp,
        }),
    );
    fan_out(recipients, message)
}

/// Meeting chat: the client's message object, stamped by the server.
pub fn meeting_chat(sender: &PeerDescriptor, recipients: &[ConnectionId], mut message: Map<String, Value>, now_ms: i64) -> Vec<Delivery> {
    message.insert("timestamp".to_string(), Value::from(now_ms));
    message.insert("senderId".to_string(), Value::String(sender.connection_id.to_string()));
    message
        .entry("userName")
        .or_insert_with(|| Value::String(sender.profile.name().to_string()));
    fan_out(
        recipients,
        GatewayMessage::new(EventName::MEETING_CHAT_MESSAGE, Value::Object(message)),
    )
}

pub fn screen_share(sender: &PeerDescriptor, recipients: &[ConnectionId], is_sharing: bool) -> Vec<Delivery> {
    let message = GatewayMessage::new(
        EventName::SCREEN_SHARE_STATUS,
        serde_json::json!({
            "socketId": sender.connection_id,
            "userName": sender.profile.name(),
            "isSharing": is_sharing,
        }),
    );
    fan_out(recipients, message)
}
