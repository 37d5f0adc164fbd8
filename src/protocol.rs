//! Wire message types for the signaling relay.
//!
//! Inbound frames carry an open-ended `type`; only `disconnect` and `pong`
//! are interpreted locally (§4.5). Everything else is an addressed relay
//! whose payload the server never inspects, so it is modeled as a raw JSON
//! map rather than a closed enum. Outbound frames the server itself emits
//! (`display-name`, `peers`, `peer-joined`, `peer-left`, `ping`) are typed.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::identity::{DisplayIdentity, PeerId};

/// Discriminator values the router treats specially; everything else is a
/// relay candidate.
pub const TYPE_DISCONNECT: &str = "disconnect";
pub const TYPE_PONG: &str = "pong";

/// An inbound frame as received from a peer, before dispatch.
///
/// `rest` holds every field other than `type` and `to` verbatim — these are
/// forwarded unchanged when the frame turns out to be a relay.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct InboundFrame {
    #[serde(rename = "type")]
    pub kind: String,
    pub to: Option<PeerId>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl InboundFrame {
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }

    /// Rebuild the envelope for the recipient: `to` dropped, `sender`
    /// injected with the verified identifier of the originating session,
    /// every other field preserved verbatim.
    pub fn into_relay(self, sender: &PeerId) -> Value {
        let mut map = self.rest;
        map.insert("type".to_string(), Value::String(self.kind));
        map.insert("sender".to_string(), Value::String(sender.clone()));
        Value::Object(map)
    }
}

/// Publicly-visible peer information, broadcast to roommates.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerPublic {
    pub id: PeerId,
    pub name: DisplayIdentity,
    pub rtc_supported: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayNameMessage {
    pub display_name: String,
    pub device_name: String,
}

/// Frames the server itself originates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    DisplayName { message: DisplayNameMessage },
    Peers { peers: Vec<PeerPublic> },
    PeerJoined { peer: PeerPublic },
    PeerLeft { peer_id: PeerId },
    Ping,
}

/// Anything written to a peer's outbound channel: either one of the server's
/// own typed messages, or an opaque relayed envelope.
#[derive(Debug, Clone)]
pub enum OutboundFrame {
    Server(ServerMessage),
    Relay(Value),
}

impl OutboundFrame {
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        match self {
            OutboundFrame::Server(msg) => serde_json::to_string(msg),
            OutboundFrame::Relay(value) => serde_json::to_string(value),
        }
    }
}

impl From<ServerMessage> for OutboundFrame {
    fn from(msg: ServerMessage) -> Self {
        OutboundFrame::Server(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn inbound_frame_parses_type_and_to() {
        let frame = InboundFrame::parse(r#"{"type":"signal","to":"abc","sdp":"x"}"#).unwrap();
        assert_eq!(frame.kind, "signal");
        assert_eq!(frame.to.as_deref(), Some("abc"));
        assert_eq!(frame.rest.get("sdp"), Some(&json!("x")));
        assert!(frame.rest.get("to").is_none());
    }

    #[test]
    fn inbound_frame_missing_type_fails() {
        assert!(InboundFrame::parse(r#"{"to":"abc"}"#).is_none());
    }

    #[test]
    fn into_relay_strips_to_and_injects_sender_overwriting_spoofed_value() {
        let frame = InboundFrame::parse(
            r#"{"type":"signal","to":"X","sender":"spoofed","sdp":"offer-data"}"#,
        )
        .unwrap();
        let relayed = frame.into_relay(&"real-sender".to_string());
        let obj = relayed.as_object().unwrap();
        assert_eq!(obj.get("type"), Some(&json!("signal")));
        assert_eq!(obj.get("sender"), Some(&json!("real-sender")));
        assert_eq!(obj.get("sdp"), Some(&json!("offer-data")));
        assert!(obj.get("to").is_none());
    }

    #[test]
    fn server_message_tags_match_wire_protocol() {
        let ping = ServerMessage::Ping;
        assert_eq!(serde_json::to_string(&ping).unwrap(), r#"{"type":"ping"}"#);

        let left = ServerMessage::PeerLeft {
            peer_id: "X".to_string(),
        };
        let json = serde_json::to_string(&left).unwrap();
        assert!(json.contains(r#""type":"peer-left""#));
        assert!(json.contains(r#""peerId":"X""#));
    }

    #[test]
    fn display_name_message_shape() {
        let msg = ServerMessage::DisplayName {
            message: DisplayNameMessage {
                display_name: "Azure Otter".to_string(),
                device_name: "Mac Chrome".to_string(),
            },
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"display-name""#));
        assert!(json.contains(r#""displayName":"Azure Otter""#));
        assert!(json.contains(r#""deviceName":"Mac Chrome""#));
    }
}
