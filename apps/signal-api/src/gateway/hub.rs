//! The signaling hub: owns the connection registry and the room directory.
//!
//! Both tables sit behind one mutex. Each inbound event is handled in a
//! single critical section that mutates state and computes the resulting
//! deliveries; nothing is sent while the lock is held.

use parking_lot::Mutex;
use serde_json::Value;

use super::directory::{MemberProfile, PeerDescriptor, RoomDirectory, RoomKey, RoomKind};
use super::events::{ClientEvent, JoinRequest};
use super::presence;
use super::registry::{ConnectionId, ConnectionRegistry, MetadataPatch};
use super::relay;
use super::transport::Delivery;

struct HubState {
    registry: ConnectionRegistry,
    directory: RoomDirectory,
}

/// Snapshot of hub size, for health reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubStats {
    pub connections: usize,
    pub rooms: usize,
}

pub struct SignalHub {
    state: Mutex<HubState>,
}

impl SignalHub {
    pub fn new(enforce_single_room: bool) -> Self {
        Self {
            state: Mutex::new(HubState {
                registry: ConnectionRegistry::new(),
                directory: RoomDirectory::new(enforce_single_room),
            }),
        }
    }

    pub fn connect(&self, connection_id: ConnectionId) {
        self.state.lock().registry.on_connect(connection_id);
    }

    /// Remove the connection from every room and forget it. Remaining
    /// members get the same notifications as for an explicit leave.
    pub fn disconnect(&self, connection_id: &ConnectionId) -> Vec<Delivery> {
        let mut state = self.state.lock();
        let removed = state.directory.remove_connection_everywhere(connection_id);
        state.registry.on_disconnect(connection_id);

        let mut deliveries = Vec::new();
        for (key, outcome) in &removed {
            tracing::info!(
                connection_id = %connection_id,
                room = %key,
                room_exists = outcome.room_exists,
                "member disconnected"
            );
            deliveries.extend(presence::left(outcome));
        }
        deliveries
    }

    /// Handle one decoded event from `from`. Project and heartbeat events
    /// belong to the socket session and yield nothing here.
    pub fn handle(&self, from: &ConnectionId, event: ClientEvent) -> Vec<Delivery> {
        match event {
            ClientEvent::Join(request) => self.join(from, request),
            ClientEvent::Leave { kind, room_id } => self.leave(from, kind, room_id),
            ClientEvent::Signal(request) => {
                let state = self.state.lock();
                let kind = request.kind;
                let sender = current_room(&state.registry, from, RoomKind::Meeting)
                    .and_then(|key| state.directory.member(&key, from))
                    .map(|member| &member.profile);
                match relay::relay(request, from, sender) {
                    Some(delivery) => {
                        tracing::trace!(from = %from, to = %delivery.to, kind = kind.as_str(), "relaying signal");
                        vec![delivery]
                    }
                    None => {
                        tracing::debug!(from = %from, kind = kind.as_str(), "dropped incomplete signal");
                        Vec::new()
                    }
                }
            }
            ClientEvent::RoomChat { text, timestamp } => self.room_chat(from, text, timestamp),
            ClientEvent::MeetingChat { meeting_id, message } => self.meeting_chat(from, meeting_id, message),
            ClientEvent::ScreenShare {
                meeting_id,
                is_sharing,
            } => self.screen_share(from, meeting_id, is_sharing),
            ClientEvent::Heartbeat { .. }
            | ClientEvent::ProjectSubscribe { .. }
            | ClientEvent::ProjectUnsubscribe { .. }
            | ClientEvent::ProjectMessage { .. } => Vec::new(),
        }
    }

    fn join(&self, from: &ConnectionId, request: JoinRequest) -> Vec<Delivery> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if !state.registry.contains(from) {
            return Vec::new();
        }

        let JoinRequest {
            kind,
            room_id,
            name,
            user_id,
        } = request;
        let profile = match kind {
            RoomKind::Room => MemberProfile::Room { name: name.clone() },
            RoomKind::Meeting => MemberProfile::Meeting {
                user_id: user_id.clone(),
                name: name.clone(),
            },
        };
        let key = RoomKey::new(kind, room_id);
        let descriptor = PeerDescriptor::new(from.clone(), profile);

        let outcome = match state.directory.join(key.clone(), descriptor.clone()) {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::debug!(connection_id = %from, room = %key, %err, "join rejected");
                return vec![presence::join_rejected(kind, from, &err)];
            }
        };

        let mut patch = MetadataPatch::default().name(name).room(key.clone());
        if let Some(user_id) = user_id {
            patch = patch.user_id(user_id);
        }
        state.registry.set_metadata(from, patch);

        let mut deliveries = Vec::new();
        for (old_key, left) in &outcome.evicted {
            tracing::info!(connection_id = %from, room = %old_key, "left room to join another");
            deliveries.extend(presence::left(left));
        }
        deliveries.extend(presence::joined(&descriptor, &outcome));

        tracing::info!(
            connection_id = %from,
            room = %key,
            peers = outcome.peers.len(),
            rejoin = outcome.previous.is_some(),
            "joined room"
        );
        deliveries
    }

    fn leave(&self, from: &ConnectionId, kind: RoomKind, room_id: Option<String>) -> Vec<Delivery> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let key = match room_id {
            Some(id) => RoomKey::new(kind, id),
            None => match current_room(&state.registry, from, kind) {
                Some(key) => key,
                None => return Vec::new(),
            },
        };

        let Some(outcome) = state.directory.leave(&key, from) else {
            return Vec::new();
        };
        state.registry.clear_room(from, &key);

        tracing::info!(
            connection_id = %from,
            room = %key,
            room_exists = outcome.room_exists,
            "left room"
        );
        presence::left(&outcome)
    }

    fn room_chat(&self, from: &ConnectionId, text: Option<String>, timestamp: Option<Value>) -> Vec<Delivery> {
        let Some(text) = text.filter(|t| !t.is_empty()) else {
            return Vec::new();
        };
        let state = self.state.lock();
        let Some(key) = current_room(&state.registry, from, RoomKind::Room) else {
            tracing::debug!(connection_id = %from, "chat without a room dropped");
            return Vec::new();
        };
        let Some(sender) = state.directory.member(&key, from) else {
            return Vec::new();
        };
        let recipients = others(&state.directory, &key, from);
        presence::room_chat(sender, &recipients, &text, timestamp)
    }

    fn meeting_chat(&self, from: &ConnectionId, meeting_id: Option<String>, message: Value) -> Vec<Delivery> {
        let Value::Object(message) = message else {
            return Vec::new();
        };
        let has_text = matches!(message.get("text"), Some(Value::String(t)) if !t.is_empty());
        if !has_text {
            return Vec::new();
        }

        let state = self.state.lock();
        let Some(key) = meeting_key(&state.registry, from, meeting_id) else {
            return Vec::new();
        };
        let Some(sender) = state.directory.member(&key, from) else {
            tracing::debug!(connection_id = %from, room = %key, "meeting chat from non-member dropped");
            return Vec::new();
        };
        let recipients = others(&state.directory, &key, from);
        let now_ms = chrono::Utc::now().timestamp_millis();
        presence::meeting_chat(sender, &recipients, message, now_ms)
    }

    fn screen_share(&self, from: &ConnectionId, meeting_id: Option<String>, is_sharing: bool) -> Vec<Delivery> {
        let state = self.state.lock();
        let Some(key) = meeting_key(&state.registry, from, meeting_id) else {
            return Vec::new();
        };
        let Some(sender) = state.directory.member(&key, from) else {
            return Vec::new();
        };
        tracing::debug!(connection_id = %from, room = %key, is_sharing, "screen share status");
        let recipients = others(&state.directory, &key, from);
        presence::screen_share(sender, &recipients, is_sharing)
    }

    /// Members of `key` other than `excluding`, in join order.
    pub fn peers(&self, key: &RoomKey, excluding: &ConnectionId) -> Vec<PeerDescriptor> {
        self.state.lock().directory.peers(key, excluding)
    }

    pub fn members(&self, key: &RoomKey) -> Vec<ConnectionId> {
        self.state.lock().directory.members(key)
    }

    pub fn contains_room(&self, key: &RoomKey) -> bool {
        self.state.lock().directory.contains_room(key)
    }

    pub fn current_room(&self, connection_id: &ConnectionId, kind: RoomKind) -> Option<RoomKey> {
        current_room(&self.state.lock().registry, connection_id, kind)
    }

    pub fn stats(&self) -> HubStats {
        let state = self.state.lock();
        HubStats {
            connections: state.registry.len(),
            rooms: state.directory.room_count(),
        }
    }
}

fn current_room(registry: &ConnectionRegistry, connection_id: &ConnectionId, kind: RoomKind) -> Option<RoomKey> {
    registry.current_room(connection_id, kind).cloned()
}

fn meeting_key(registry: &ConnectionRegistry, connection_id: &ConnectionId, meeting_id: Option<String>) -> Option<RoomKey> {
    match meeting_id {
        Some(id) => Some(RoomKey::new(RoomKind::Meeting, id)),
        None => current_room(registry, connection_id, RoomKind::Meeting),
    }
}

fn others(directory: &RoomDirectory, key: &RoomKey, excluding: &ConnectionId) -> Vec<ConnectionId> {
    directory
        .members(key)
        .into_iter()
        .filter(|id| id != excluding)
        .collect()
}
