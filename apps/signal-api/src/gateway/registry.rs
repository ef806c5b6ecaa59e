//! Connection registry: per-connection session metadata.

use std::collections::HashMap;
use std::fmt;
use std::time::Instant;

use huddle_common::id::{self, prefix};
use serde::{Deserialize, Serialize};

use super::directory::{RoomKey, RoomKind};

/// Opaque transport-assigned connection identifier (`conn_` prefixed ULID).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Mint a fresh id. ULIDs are never reused within a process.
    pub fn generate() -> Self {
        Self(id::prefixed_ulid(prefix::CONNECTION))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ConnectionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ConnectionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metadata tracked for one live connection.
#[derive(Debug, Clone)]
pub struct ConnectionMeta {
    pub user_id: Option<String>,
    pub name: Option<String>,
    /// Most recently joined room of each kind. The two kinds never
    /// displace each other.
    rooms: HashMap<RoomKind, RoomKey>,
    pub connected_at: Instant,
}

impl ConnectionMeta {
    fn new() -> Self {
        Self {
            user_id: None,
            name: None,
            rooms: HashMap::new(),
            connected_at: Instant::now(),
        }
    }

    /// Current room of the given kind.
    pub fn room(&self, kind: RoomKind) -> Option<&RoomKey> {
        self.rooms.get(&kind)
    }
}

/// Partial update merged into a [`ConnectionMeta`]. Unset fields are kept.
#[derive(Debug, Clone, Default)]
pub struct MetadataPatch {
    pub user_id: Option<String>,
    pub name: Option<String>,
    pub room: Option<RoomKey>,
}

impl MetadataPatch {
    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn room(mut self, room: RoomKey) -> Self {
        self.room = Some(room);
        self
    }
}

/// In-memory table of live connections.
///
/// Not synchronized on its own; the owning [`SignalHub`](super::hub::SignalHub)
/// serializes access together with the room directory.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, ConnectionMeta>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty record for a freshly connected transport session.
    pub fn on_connect(&mut self, connection_id: ConnectionId) {
        self.connections
            .entry(connection_id)
            .or_insert_with(ConnectionMeta::new);
    }

    /// Merge `patch` into the record. Returns `false` when no live record exists.
    pub fn set_metadata(&mut self, connection_id: &ConnectionId, patch: MetadataPatch) -> bool {
        let Some(meta) = self.connections.get_mut(connection_id) else {
            return false;
        };
        if let Some(user_id) = patch.user_id {
            meta.user_id = Some(user_id);
        }
        if let Some(name) = patch.name {
            meta.name = Some(name);
        }
        if let Some(room) = patch.room {
            meta.rooms.insert(room.kind, room);
        }
        true
    }

    pub fn get_metadata(&self, connection_id: &ConnectionId) -> Option<&ConnectionMeta> {
        self.connections.get(connection_id)
    }

    /// Drop the current association for `room`'s kind if it still points at `room`.
    pub fn clear_room(&mut self, connection_id: &ConnectionId, room: &RoomKey) {
        if let Some(meta) = self.connections.get_mut(connection_id) {
            if meta.rooms.get(&room.kind) == Some(room) {
                meta.rooms.remove(&room.kind);
            }
        }
    }

    /// Current room of `kind` for a live connection.
    pub fn current_room(&self, connection_id: &ConnectionId, kind: RoomKind) -> Option<&RoomKey> {
        self.connections.get(connection_id)?.room(kind)
    }

    /// Remove the record. No-op for unknown ids.
    pub fn on_disconnect(&mut self, connection_id: &ConnectionId) -> Option<ConnectionMeta> {
        self.connections.remove(connection_id)
    }

    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.connections.contains_key(connection_id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
