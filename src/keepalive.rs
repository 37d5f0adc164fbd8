//! Per-session ping/pong keepalive scheduler (§4.6).

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::info;

use crate::lifecycle::leave_room;
use crate::protocol::ServerMessage;
use crate::room::RoomRegistry;
use crate::session::PeerSession;

pub const PING_INTERVAL: Duration = Duration::from_secs(30);
pub const EVICTION_THRESHOLD: Duration = Duration::from_secs(60); // 2 * PING_INTERVAL

/// Arm the keepalive loop for `session`: every [`PING_INTERVAL`], either
/// evict the session (if no heartbeat was observed within
/// [`EVICTION_THRESHOLD`]) or send a `ping` and reschedule.
pub fn arm_keepalive(session: Arc<PeerSession>, registry: Arc<RoomRegistry>) {
    let handle = tokio::spawn(async move {
        loop {
            tokio::time::sleep(PING_INTERVAL).await;

            if Instant::now().duration_since(session.last_beat()) > EVICTION_THRESHOLD {
                info!(peer = %session.id, "evicting session: keepalive timeout");
                leave_room(&session, &registry).await;
                return;
            }

            session.send(ServerMessage::Ping);
        }
    });
    session.set_keepalive_handle(handle);
}
