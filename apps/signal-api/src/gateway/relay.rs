//! Signaling relay: forwards offer/answer/ICE payloads between two connections.
//!
//! Stateless. The relay does not check room membership or negotiation order;
//! that is the browsers' business.

use serde_json::{Map, Value};

use super::directory::{MemberProfile, RoomKind};
use super::events::{GatewayMessage, SignalKind, SignalRequest};
use super::registry::ConnectionId;
use super::transport::Delivery;

/// Build the forwarded message for `request`, or `None` when `to` or the
/// payload is missing. Dropped requests produce no error for the sender.
///
/// `sender` is the sender's snapshot in its current meeting; meeting offers
/// carry its identity, or nulls when there is none.
pub fn relay(request: SignalRequest, from: &ConnectionId, sender: Option<&MemberProfile>) -> Option<Delivery> {
    let to = request.to.filter(|to| !to.is_empty())?;
    let payload = request.payload.filter(is_present)?;

    let mut data = Map::new();
    data.insert("from".to_string(), Value::String(from.to_string()));
    data.insert(
        request.kind.payload_field(request.flavor).to_string(),
        payload,
    );

    if request.flavor == RoomKind::Meeting && request.kind == SignalKind::Offer {
        let user_id = sender.and_then(MemberProfile::user_id);
        let user_name = sender.map(MemberProfile::name);
        data.insert("userId".to_string(), user_id.map_or(Value::Null, |id| Value::String(id.to_string())));
        data.insert("userName".to_string(), user_name.map_or(Value::Null, |name| Value::String(name.to_string())));
    }

    let message = GatewayMessage::new(request.kind.event_name(request.flavor), Value::Object(data));
    Some(Delivery::new(ConnectionId::from(to), message))
}

fn is_present(payload: &Value) -> bool {
    match payload {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}
