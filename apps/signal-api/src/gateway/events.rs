//! Gateway event names and wire-format messages.
//!
//! Every frame is a JSON object `{"t": <event>, "d": <payload>}`. Inbound
//! frames are decoded once into [`ClientEvent`]; nothing past this module
//! looks at raw JSON field names except the opaque signaling payloads.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::directory::RoomKind;

// ---------------------------------------------------------------------------
// Event names
// ---------------------------------------------------------------------------

pub struct EventName;

impl EventName {
    pub const HELLO: &'static str = "hello";
    pub const HEARTBEAT: &'static str = "heartbeat";
    pub const HEARTBEAT_ACK: &'static str = "heartbeat:ack";

    pub const ROOM_JOIN: &'static str = "room:join";
    pub const ROOM_LEAVE: &'static str = "room:leave";
    pub const ROOM_PEERS: &'static str = "room:peers";
    pub const ROOM_ERROR: &'static str = "room:error";
    pub const PEER_JOINED: &'static str = "peer:joined";
    pub const PEER_LEFT: &'static str = "peer:left";
    pub const WEBRTC_OFFER: &'static str = "webrtc:offer";
    pub const WEBRTC_ANSWER: &'static str = "webrtc:answer";
    pub const WEBRTC_ICE: &'static str = "webrtc:ice";
    pub const CHAT_MESSAGE: &'static str = "chat:message";

    pub const JOIN_MEETING: &'static str = "join-meeting";
    pub const LEAVE_MEETING: &'static str = "leave-meeting";
    pub const EXISTING_PARTICIPANTS: &'static str = "existing-participants";
    pub const MEETING_ERROR: &'static str = "meeting-error";
    pub const USER_JOINED: &'static str = "user-joined";
    pub const USER_LEFT: &'static str = "user-left";
    pub const OFFER: &'static str = "offer";
    pub const ANSWER: &'static str = "answer";
    pub const ICE_CANDIDATE: &'static str = "ice-candidate";
    pub const MEETING_CHAT_MESSAGE: &'static str = "meeting-chat-message";
    pub const SCREEN_SHARE_STATUS: &'static str = "screen-share-status";

    pub const PROJECT_SUBSCRIBE: &'static str = "project:subscribe";
    pub const PROJECT_UNSUBSCRIBE: &'static str = "project:unsubscribe";
    pub const PROJECT_MESSAGE: &'static str = "project:message";
}

// ---------------------------------------------------------------------------
// Server → Client message
// ---------------------------------------------------------------------------

/// A message sent from the server to the client over WebSocket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GatewayMessage {
    pub t: String,
    pub d: Value,
}

impl GatewayMessage {
    pub fn new(event_name: &str, data: Value) -> Self {
        Self {
            t: event_name.to_string(),
            d: data,
        }
    }

    pub fn hello(connection_id: &str, heartbeat_interval_ms: u64) -> Self {
        Self::new(
            EventName::HELLO,
            serde_json::json!({
                "connectionId": connection_id,
                "heartbeatInterval": heartbeat_interval_ms,
            }),
        )
    }

    pub fn heartbeat_ack(seq: u64) -> Self {
        Self::new(EventName::HEARTBEAT_ACK, serde_json::json!({ "ack": seq }))
    }

    pub fn to_json(&self) -> String {
        // A struct of a String and a Value always serializes.
        serde_json::to_string(self).unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Client → Server message
// ---------------------------------------------------------------------------

/// Raw envelope received from the client.
#[derive(Debug, Deserialize)]
pub struct ClientMessage {
    pub t: String,
    #[serde(default)]
    pub d: Value,
}

/// Offer, answer or ICE candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

impl SignalKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SignalKind::Offer => "offer",
            SignalKind::Answer => "answer",
            SignalKind::IceCandidate => "ice-candidate",
        }
    }

    /// Event name used on the wire for this kind in the given room flavour.
    pub fn event_name(self, flavor: RoomKind) -> &'static str {
        match (flavor, self) {
            (RoomKind::Room, SignalKind::Offer) => EventName::WEBRTC_OFFER,
            (RoomKind::Room, SignalKind::Answer) => EventName::WEBRTC_ANSWER,
            (RoomKind::Room, SignalKind::IceCandidate) => EventName::WEBRTC_ICE,
            (RoomKind::Meeting, SignalKind::Offer) => EventName::OFFER,
            (RoomKind::Meeting, SignalKind::Answer) => EventName::ANSWER,
            (RoomKind::Meeting, SignalKind::IceCandidate) => EventName::ICE_CANDIDATE,
        }
    }

    /// Name of the field carrying the opaque payload.
    pub fn payload_field(self, flavor: RoomKind) -> &'static str {
        match (flavor, self) {
            (_, SignalKind::IceCandidate) => "candidate",
            (RoomKind::Room, _) => "sdp",
            (RoomKind::Meeting, SignalKind::Offer) => "offer",
            (RoomKind::Meeting, SignalKind::Answer) => "answer",
        }
    }
}

/// Join request for either room flavour. Empty strings stand in for missing
/// fields so validation happens in the directory, not the decoder.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinRequest {
    pub kind: RoomKind,
    pub room_id: String,
    pub name: String,
    pub user_id: Option<String>,
}

/// Relay request as sent by the client. `to`/`payload` may be absent.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalRequest {
    pub kind: SignalKind,
    pub flavor: RoomKind,
    pub to: Option<String>,
    pub payload: Option<Value>,
}

/// A decoded inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Heartbeat { seq: u64 },
    Join(JoinRequest),
    Leave { kind: RoomKind, room_id: Option<String> },
    Signal(SignalRequest),
    RoomChat { text: Option<String>, timestamp: Option<Value> },
    MeetingChat { meeting_id: Option<String>, message: Value },
    ScreenShare { meeting_id: Option<String>, is_sharing: bool },
    ProjectSubscribe { project_id: String },
    ProjectUnsubscribe { project_id: String },
    ProjectMessage { project_id: String, message: Value },
}

/// Why an inbound frame could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unknown event `{0}`")]
    UnknownEvent(String),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HeartbeatPayload {
    #[serde(default)]
    seq: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoomJoinPayload {
    #[serde(default)]
    room_id: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MeetingJoinPayload {
    #[serde(default)]
    meeting_id: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    user_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LeavePayload {
    #[serde(default, alias = "meetingId")]
    room_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoomChatPayload {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    timestamp: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MeetingChatPayload {
    #[serde(default)]
    meeting_id: Option<String>,
    #[serde(default)]
    message: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScreenSharePayload {
    #[serde(default)]
    meeting_id: Option<String>,
    #[serde(default)]
    is_sharing: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectPayload {
    project_id: String,
    #[serde(default)]
    message: Value,
}

impl ClientEvent {
    /// Decode one text frame.
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let ClientMessage { t, d } = serde_json::from_str(text)?;

        let event = match t.as_str() {
            EventName::HEARTBEAT => {
                let p: HeartbeatPayload = payload(d)?;
                ClientEvent::Heartbeat { seq: p.seq }
            }
            EventName::ROOM_JOIN => {
                let p: RoomJoinPayload = payload(d)?;
                ClientEvent::Join(JoinRequest {
                    kind: RoomKind::Room,
                    room_id: p.room_id.unwrap_or_default(),
                    name: p.name.unwrap_or_default(),
                    user_id: None,
                })
            }
            EventName::JOIN_MEETING => {
                let p: MeetingJoinPayload = payload(d)?;
                ClientEvent::Join(JoinRequest {
                    kind: RoomKind::Meeting,
                    room_id: p.meeting_id.unwrap_or_default(),
                    name: p.user_name.unwrap_or_default(),
                    user_id: p.user_id.filter(|u| !u.is_empty()),
                })
            }
            EventName::ROOM_LEAVE | EventName::LEAVE_MEETING => {
                let p: LeavePayload = payload(d)?;
                let kind = if t == EventName::ROOM_LEAVE {
                    RoomKind::Room
                } else {
                    RoomKind::Meeting
                };
                ClientEvent::Leave {
                    kind,
                    room_id: p.room_id.filter(|r| !r.is_empty()),
                }
            }
            EventName::WEBRTC_OFFER => signal(SignalKind::Offer, RoomKind::Room, d),
            EventName::WEBRTC_ANSWER => signal(SignalKind::Answer, RoomKind::Room, d),
            EventName::WEBRTC_ICE => signal(SignalKind::IceCandidate, RoomKind::Room, d),
            EventName::OFFER => signal(SignalKind::Offer, RoomKind::Meeting, d),
            EventName::ANSWER => signal(SignalKind::Answer, RoomKind::Meeting, d),
            EventName::ICE_CANDIDATE => signal(SignalKind::IceCandidate, RoomKind::Meeting, d),
            EventName::CHAT_MESSAGE => {
                let p: RoomChatPayload = payload(d)?;
                ClientEvent::RoomChat {
                    text: p.text,
                    timestamp: p.timestamp,
                }
            }
            EventName::MEETING_CHAT_MESSAGE => {
                let p: MeetingChatPayload = payload(d)?;
                ClientEvent::MeetingChat {
                    meeting_id: p.meeting_id.filter(|m| !m.is_empty()),
                    message: p.message,
                }
            }
            EventName::SCREEN_SHARE_STATUS => {
                let p: ScreenSharePayload = payload(d)?;
                ClientEvent::ScreenShare {
                    meeting_id: p.meeting_id.filter(|m| !m.is_empty()),
                    is_sharing: p.is_sharing,
                }
            }
            EventName::PROJECT_SUBSCRIBE => {
                let p: ProjectPayload = serde_json::from_value(d)?;
                ClientEvent::ProjectSubscribe {
                    project_id: p.project_id,
                }
            }
            EventName::PROJECT_UNSUBSCRIBE => {
                let p: ProjectPayload = serde_json::from_value(d)?;
                ClientEvent::ProjectUnsubscribe {
                    project_id: p.project_id,
                }
            }
            EventName::PROJECT_MESSAGE => {
                let p: ProjectPayload = serde_json::from_value(d)?;
                ClientEvent::ProjectMessage {
                    project_id: p.project_id,
                    message: p.message,
                }
            }
            _ => return Err(DecodeError::UnknownEvent(t)),
        };

        Ok(event)
    }
}

/// Decode an optional payload: a missing or `null` `d` yields the default.
fn payload<T: DeserializeOwned + Default>(d: Value) -> Result<T, DecodeError> {
    if d.is_null() {
        return Ok(T::default());
    }
    Ok(serde_json::from_value(d)?)
}

/// Signaling payloads are kept loose: a non-object `d` just means both
/// fields are missing, which the relay treats as a silent drop.
fn signal(kind: SignalKind, flavor: RoomKind, d: Value) -> ClientEvent {
    let mut fields = match d {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    let to = match fields.remove("to") {
        Some(Value::String(to)) => Some(to),
        _ => None,
    };
    let payload = fields.remove(kind.payload_field(flavor));
    ClientEvent::Signal(SignalRequest {
        kind,
        flavor,
        to,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_room_join() {
        let event = ClientEvent::decode(r#"{"t":"room:join","d":{"roomId":"R1","name":"Ada"}}"#).unwrap();
        assert_eq!(
            event,
            ClientEvent::Join(JoinRequest {
                kind: RoomKind::Room,
                room_id: "R1".to_string(),
                name: "Ada".to_string(),
                user_id: None,
            })
        );
    }

    #[test]
    fn decodes_meeting_join_with_missing_fields_as_empty() {
        let event = ClientEvent::decode(r#"{"t":"join-meeting","d":{"userId":"usr_1"}}"#).unwrap();
        let ClientEvent::Join(join) = event else {
            panic!("expected join");
        };
        assert_eq!(join.kind, RoomKind::Meeting);
        assert!(join.room_id.is_empty());
        assert!(join.name.is_empty());
        assert_eq!(join.user_id.as_deref(), Some("usr_1"));
    }

    #[test]
    fn leave_accepts_missing_empty_or_named_payload() {
        for frame in [
            r#"{"t":"room:leave"}"#,
            r#"{"t":"room:leave","d":{}}"#,
            r#"{"t":"room:leave","d":null}"#,
        ] {
            assert_eq!(
                ClientEvent::decode(frame).unwrap(),
                ClientEvent::Leave {
                    kind: RoomKind::Room,
                    room_id: None
                }
            );
        }
        assert_eq!(
            ClientEvent::decode(r#"{"t":"leave-meeting","d":{"meetingId":"m1"}}"#).unwrap(),
            ClientEvent::Leave {
                kind: RoomKind::Meeting,
                room_id: Some("m1".to_string())
            }
        );
    }

    #[test]
    fn signal_payload_field_depends_on_flavor() {
        let room = ClientEvent::decode(r#"{"t":"webrtc:offer","d":{"to":"conn_b","sdp":"v=0"}}"#).unwrap();
        let meeting = ClientEvent::decode(r#"{"t":"offer","d":{"to":"conn_b","offer":{"type":"offer","sdp":"v=0"}}}"#).unwrap();

        let ClientEvent::Signal(room) = room else { panic!("expected signal") };
        assert_eq!(room.to.as_deref(), Some("conn_b"));
        assert_eq!(room.payload, Some(Value::String("v=0".to_string())));

        let ClientEvent::Signal(meeting) = meeting else { panic!("expected signal") };
        assert_eq!(meeting.flavor, RoomKind::Meeting);
        assert_eq!(meeting.payload.unwrap()["type"], "offer");
    }

    #[test]
    fn signal_with_missing_to_still_decodes() {
        let event = ClientEvent::decode(r#"{"t":"webrtc:ice","d":{"candidate":"c"}}"#).unwrap();
        let ClientEvent::Signal(req) = event else { panic!("expected signal") };
        assert_eq!(req.kind, SignalKind::IceCandidate);
        assert!(req.to.is_none());
    }

    #[test]
    fn unknown_event_and_bad_json_are_errors() {
        assert!(matches!(
            ClientEvent::decode(r#"{"t":"nope","d":{}}"#),
            Err(DecodeError::UnknownEvent(t)) if t == "nope"
        ));
        assert!(matches!(ClientEvent::decode("not json"), Err(DecodeError::Malformed(_))));
        assert!(ClientEvent::decode(r#"{"t":"room:join","d":{"roomId":5}}"#).is_err());
    }

    #[test]
    fn project_events_require_project_id() {
        assert!(ClientEvent::decode(r#"{"t":"project:subscribe","d":{}}"#).is_err());
        assert_eq!(
            ClientEvent::decode(r#"{"t":"project:subscribe","d":{"projectId":"p1"}}"#).unwrap(),
            ClientEvent::ProjectSubscribe {
                project_id: "p1".to_string()
            }
        );
    }

    #[test]
    fn gateway_message_serializes_envelope() {
        let json = GatewayMessage::heartbeat_ack(7).to_json();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["t"], "heartbeat:ack");
        assert_eq!(value["d"]["ack"], 7);
    }
}
