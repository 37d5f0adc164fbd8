//! Dispatches inbound frames from a session to the right local handler or
//! relay target (§4.5).

use std::sync::Arc;

use tracing::debug;

use crate::lifecycle::leave_room;
use crate::protocol::{InboundFrame, TYPE_DISCONNECT, TYPE_PONG};
use crate::room::RoomRegistry;
use crate::session::PeerSession;

/// What the caller's read loop should do after [`dispatch`] returns.
pub enum Outcome {
    /// Keep reading frames from this session.
    Continue,
    /// The session asked to disconnect; the caller's read loop should stop.
    Disconnected,
}

/// Handle one inbound text frame from `session`.
///
/// Malformed frames (non-JSON or missing `type`) are dropped silently and
/// the session stays open. `disconnect` runs the leave sequence and signals
/// the caller to stop reading. `pong` refreshes the heartbeat. Anything
/// else is treated as an addressed relay: it requires a `to` field that
/// resolves to another peer in the same room, otherwise it is dropped.
pub async fn dispatch(
    text: &str,
    session: &Arc<PeerSession>,
    registry: &RoomRegistry,
) -> Outcome {
    let frame = match InboundFrame::parse(text) {
        Some(frame) => frame,
        None => {
            debug!(peer = %session.id, "dropping malformed frame");
            return Outcome::Continue;
        }
    };

    match frame.kind.as_str() {
        TYPE_DISCONNECT => {
            leave_room(session, registry).await;
            Outcome::Disconnected
        }
        TYPE_PONG => {
            session.touch();
            Outcome::Continue
        }
        _ => {
            relay(frame, session, registry);
            Outcome::Continue
        }
    }
}

fn relay(frame: InboundFrame, session: &Arc<PeerSession>, registry: &RoomRegistry) {
    let Some(to) = frame.to.clone() else {
        debug!(peer = %session.id, "dropping relay with no recipient");
        return;
    };

    let Some(target) = registry.lookup(&session.room_key, &to) else {
        debug!(peer = %session.id, to = %to, "dropping relay to unknown recipient");
        return;
    };

    let envelope = frame.into_relay(&session.id);
    target.send(crate::protocol::OutboundFrame::Relay(envelope));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::build_identity;
    use tokio::sync::mpsc;

    fn make_session(id: &str, room_key: &str) -> (Arc<PeerSession>, mpsc::Receiver<crate::protocol::OutboundFrame>) {
        let (tx, rx) = mpsc::channel(8);
        let identity = build_identity(id, "");
        let (session, _shutdown_rx) =
            PeerSession::new(id.to_string(), identity, true, room_key.to_string(), tx);
        (Arc::new(session), rx)
    }

    #[tokio::test]
    async fn malformed_frame_is_dropped_session_stays_open() {
        let registry = RoomRegistry::new();
        let (session, _rx) = make_session("A", "10.0.0.1");
        registry.join(session.clone());

        let outcome = dispatch("not json", &session, &registry).await;
        assert!(matches!(outcome, Outcome::Continue));
    }

    #[tokio::test]
    async fn pong_refreshes_heartbeat() {
        let registry = RoomRegistry::new();
        let (session, _rx) = make_session("A", "10.0.0.1");
        registry.join(session.clone());

        let before = session.last_beat();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        dispatch(r#"{"type":"pong"}"#, &session, &registry).await;
        assert!(session.last_beat() > before);
    }

    #[tokio::test]
    async fn disconnect_leaves_room_and_signals_caller() {
        let registry = RoomRegistry::new();
        let (session, _rx) = make_session("A", "10.0.0.1");
        registry.join(session.clone());

        let outcome = dispatch(r#"{"type":"disconnect"}"#, &session, &registry).await;
        assert!(matches!(outcome, Outcome::Disconnected));
        assert_eq!(registry.room_count(), 0);
    }

    #[tokio::test]
    async fn relay_strips_to_and_injects_verified_sender() {
        let registry = RoomRegistry::new();
        let (a, _rxa) = make_session("A", "10.0.0.1");
        let (b, mut rxb) = make_session("B", "10.0.0.1");
        registry.join(a.clone());
        registry.join(b.clone());

        dispatch(
            r#"{"type":"signal","to":"B","sender":"spoof","sdp":"x"}"#,
            &a,
            &registry,
        )
        .await;

        let frame = rxb.try_recv().expect("B should receive the relay");
        let json = frame.to_json_string().unwrap();
        assert!(json.contains(r#""sender":"A""#));
        assert!(!json.contains("spoof"));
        assert!(!json.contains(r#""to":"#));
    }

    #[tokio::test]
    async fn relay_to_unknown_recipient_is_dropped() {
        let registry = RoomRegistry::new();
        let (a, _rxa) = make_session("A", "10.0.0.1");
        registry.join(a.clone());

        let outcome = dispatch(r#"{"type":"signal","to":"ZZZ"}"#, &a, &registry).await;
        assert!(matches!(outcome, Outcome::Continue));
    }

    #[tokio::test]
    async fn relay_missing_to_is_dropped() {
        let registry = RoomRegistry::new();
        let (a, _rxa) = make_session("A", "10.0.0.1");
        registry.join(a.clone());

        let outcome = dispatch(r#"{"type":"signal"}"#, &a, &registry).await;
        assert!(matches!(outcome, Outcome::Continue));
    }
}
