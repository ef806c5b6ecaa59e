//! Room/meeting directory: room key → ordered member snapshots.

use std::collections::HashMap;
use std::fmt;

use crate::error::SignalError;

use super::registry::ConnectionId;

/// Which flavour of room a key belongs to. Each kind is its own namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoomKind {
    /// Free-form room joined with `room:join`.
    Room,
    /// Project meeting joined with `join-meeting`.
    Meeting,
}

impl RoomKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RoomKind::Room => "room",
            RoomKind::Meeting => "meeting",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomKey {
    pub kind: RoomKind,
    pub id: String,
}

impl RoomKey {
    pub fn new(kind: RoomKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.id)
    }
}

/// Profile snapshot captured when a member joins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberProfile {
    Room { name: String },
    Meeting { user_id: Option<String>, name: String },
}

impl MemberProfile {
    pub fn kind(&self) -> RoomKind {
        match self {
            MemberProfile::Room { .. } => RoomKind::Room,
            MemberProfile::Meeting { .. } => RoomKind::Meeting,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            MemberProfile::Room { name } | MemberProfile::Meeting { name, .. } => name,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            MemberProfile::Room { .. } => None,
            MemberProfile::Meeting { user_id, .. } => user_id.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerDescriptor {
    pub connection_id: ConnectionId,
    pub profile: MemberProfile,
}

impl PeerDescriptor {
    pub fn new(connection_id: ConnectionId, profile: MemberProfile) -> Self {
        Self {
            connection_id,
            profile,
        }
    }
}

/// One active room. Never stored empty.
#[derive(Debug, Default)]
struct Room {
    members: Vec<PeerDescriptor>,
}

impl Room {
    fn position(&self, connection_id: &ConnectionId) -> Option<usize> {
        self.members
            .iter()
            .position(|m| &m.connection_id == connection_id)
    }
}

/// Result of a successful [`RoomDirectory::join`].
#[derive(Debug)]
pub struct JoinOutcome {
    /// Other members in join order, excluding the joiner.
    pub peers: Vec<PeerDescriptor>,
    /// `Some(previous snapshot)` when the connection was already a member.
    pub previous: Option<MemberProfile>,
    /// Rooms of the same kind the connection was removed from under the
    /// single-room policy.
    pub evicted: Vec<(RoomKey, LeaveOutcome)>,
}

/// Result of removing a member from a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveOutcome {
    pub departed: PeerDescriptor,
    /// Members still present, in join order.
    pub remaining: Vec<ConnectionId>,
    pub room_exists: bool,
}

pub struct RoomDirectory {
    rooms: HashMap<RoomKey, Room>,
    memberships: HashMap<ConnectionId, Vec<RoomKey>>,
    enforce_single_room: bool,
}

impl RoomDirectory {
    pub fn new(enforce_single_room: bool) -> Self {
        Self {
            rooms: HashMap::new(),
            memberships: HashMap::new(),
            enforce_single_room,
        }
    }

    pub fn enforces_single_room(&self) -> bool {
        self.enforce_single_room
    }

    /// Insert or refresh `descriptor` in `key`, creating the room if needed.
    pub fn join(&mut self, key: RoomKey, descriptor: PeerDescriptor) -> Result<JoinOutcome, SignalError> {
        if key.id.trim().is_empty() {
            return Err(SignalError::InvalidJoinRequest {
                reason: "missing room id",
            });
        }
        if descriptor.profile.name().trim().is_empty() {
            return Err(SignalError::InvalidJoinRequest {
                reason: "missing display name",
            });
        }

        let connection_id = descriptor.connection_id.clone();

        let mut evicted = Vec::new();
        if self.enforce_single_room {
            let others: Vec<RoomKey> = self
                .rooms_of(&connection_id)
                .iter()
                .filter(|k| k.kind == key.kind && **k != key)
                .cloned()
                .collect();
            for other in others {
                if let Some(outcome) = self.leave(&other, &connection_id) {
                    evicted.push((other, outcome));
                }
            }
        }

        let room = self.rooms.entry(key.clone()).or_default();
        let previous = match room.position(&connection_id) {
            Some(idx) => Some(std::mem::replace(&mut room.members[idx], descriptor).profile),
            None => {
                room.members.push(descriptor);
                None
            }
        };
        let peers = room
            .members
            .iter()
            .filter(|m| m.connection_id != connection_id)
            .cloned()
            .collect();

        let keys = self.memberships.entry(connection_id).or_default();
        if !keys.contains(&key) {
            keys.push(key);
        }

        Ok(JoinOutcome {
            peers,
            previous,
            evicted,
        })
    }

    /// Remove a member. `None` when the room or the member is absent.
    pub fn leave(&mut self, key: &RoomKey, connection_id: &ConnectionId) -> Option<LeaveOutcome> {
        let room = self.rooms.get_mut(key)?;
        let idx = room.position(connection_id)?;
        let departed = room.members.remove(idx);
        let remaining: Vec<ConnectionId> = room
            .members
            .iter()
            .map(|m| m.connection_id.clone())
            .collect();

        let room_exists = !remaining.is_empty();
        if !room_exists {
            self.rooms.remove(key);
        }

        if let Some(keys) = self.memberships.get_mut(connection_id) {
            keys.retain(|k| k != key);
            if keys.is_empty() {
                self.memberships.remove(connection_id);
            }
        }

        Some(LeaveOutcome {
            departed,
            remaining,
            room_exists,
        })
    }

    /// Members of `key` other than `excluding`, in join order.
    pub fn peers(&self, key: &RoomKey, excluding: &ConnectionId) -> Vec<PeerDescriptor> {
        self.rooms
            .get(key)
            .map(|room| {
                room.members
                    .iter()
                    .filter(|m| &m.connection_id != excluding)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn members(&self, key: &RoomKey) -> Vec<ConnectionId> {
        self.rooms
            .get(key)
            .map(|room| room.members.iter().map(|m| m.connection_id.clone()).collect())
            .unwrap_or_default()
    }

    pub fn member(&self, key: &RoomKey, connection_id: &ConnectionId) -> Option<&PeerDescriptor> {
        let room = self.rooms.get(key)?;
        room.members.iter().find(|m| &m.connection_id == connection_id)
    }

    pub fn rooms_of(&self, connection_id: &ConnectionId) -> &[RoomKey] {
        self.memberships
            .get(connection_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Leave every room the connection belongs to. Used on disconnect.
    pub fn remove_connection_everywhere(&mut self, connection_id: &ConnectionId) -> Vec<(RoomKey, LeaveOutcome)> {
        let keys = self.memberships.get(connection_id).cloned().unwrap_or_default();
        keys.into_iter()
            .filter_map(|key| {
                let outcome = self.leave(&key, connection_id)?;
                Some((key, outcome))
            })
            .collect()
    }

    pub fn contains_room(&self, key: &RoomKey) -> bool {
        self.rooms.contains_key(key)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
