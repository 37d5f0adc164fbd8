//! Connect/disconnect orchestration: wires the room registry, keepalive
//! scheduler, and announcements together (§4.7).

use std::sync::Arc;

use tracing::info;

use crate::keepalive::arm_keepalive;
use crate::protocol::{DisplayNameMessage, ServerMessage};
use crate::room::RoomRegistry;
use crate::session::PeerSession;

/// Run the connect sequence for a freshly-constructed session: join its
/// room, announce it to existing occupants, hand it the roster and its own
/// display identity, then arm the keepalive scheduler.
///
/// Steps 2 (announce to existing peers) and 3-4 (greet the newcomer) must
/// happen in that order so the newcomer never observes a `peer-joined`
/// about itself (§4.7, §5).
pub fn join_room(session: &Arc<PeerSession>, registry: &Arc<RoomRegistry>) {
    let others = registry.join(session.clone());

    for peer in &others {
        peer.send(ServerMessage::PeerJoined {
            peer: session.public(),
        });
    }

    session.send(ServerMessage::Peers {
        peers: others.iter().map(|p| p.public()).collect(),
    });

    session.send(ServerMessage::DisplayName {
        message: DisplayNameMessage {
            display_name: session.name.display_name.clone(),
            device_name: session.name.device_name.clone(),
        },
    });

    info!(
        peer = %session.id,
        room = %session.room_key,
        existing = others.len(),
        "peer joined"
    );

    arm_keepalive(session.clone(), registry.clone());
}

/// Run the disconnect sequence for `session`: idempotent, so it is safe to
/// call from socket close, socket error, an explicit `disconnect` frame, or
/// keepalive eviction — whichever fires first.
pub async fn leave_room(session: &Arc<PeerSession>, registry: &RoomRegistry) {
    session.cancel_keepalive();
    let survivors = registry.leave(session);
    // Signal the owning `handle_connection` read loop to stop and tear down
    // the socket (§4.7 step 4). Matters most when `leave_room` is invoked
    // from a task other than the read loop itself, e.g. keepalive eviction.
    session.close_transport();

    for peer in &survivors {
        peer.send(ServerMessage::PeerLeft {
            peer_id: session.id.clone(),
        });
    }

    info!(
        peer = %session.id,
        room = %session.room_key,
        remaining = survivors.len(),
        "peer left"
    );
}
