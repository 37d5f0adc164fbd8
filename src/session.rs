//! A single live peer connection: identity, room membership, and the
//! serializing send side of its outbound stream (§4.3).

use std::sync::Mutex;
use std::time::Instant;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::identity::{DisplayIdentity, PeerId};
use crate::protocol::{OutboundFrame, PeerPublic};

/// Network-address key peers are grouped by (§3).
pub type RoomKey = String;

/// One peer's live connection. Shared via `Arc` between the registry, the
/// router, and the keepalive scheduler; `id` and `name` never change after
/// construction.
pub struct PeerSession {
    pub id: PeerId,
    pub name: DisplayIdentity,
    pub rtc_supported: bool,
    pub room_key: RoomKey,
    sender: mpsc::Sender<OutboundFrame>,
    last_beat: Mutex<Instant>,
    keepalive_handle: Mutex<Option<JoinHandle<()>>>,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
}

impl PeerSession {
    /// Construct a session, along with the receiving half of its transport
    /// shutdown signal. The caller's read loop should select on the returned
    /// receiver alongside its socket read and stop on either firing, so that
    /// [`PeerSession::close_transport`] (called from `leave_room`, possibly
    /// from a different task such as the keepalive scheduler) actually
    /// terminates the connection rather than just the room membership.
    pub fn new(
        id: PeerId,
        name: DisplayIdentity,
        rtc_supported: bool,
        room_key: RoomKey,
        sender: mpsc::Sender<OutboundFrame>,
    ) -> (Self, oneshot::Receiver<()>) {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        (
            Self {
                id,
                name,
                rtc_supported,
                room_key,
                sender,
                last_beat: Mutex::new(Instant::now()),
                keepalive_handle: Mutex::new(None),
                shutdown: Mutex::new(Some(shutdown_tx)),
            },
            shutdown_rx,
        )
    }

    /// Serialize and enqueue a frame for delivery. Never fails upward: if
    /// the writer task has gone away, or the outbound queue is full, the
    /// frame is silently dropped (§5: unbounded send queues are disallowed,
    /// dropped frames for a slow peer are acceptable).
    pub fn send(&self, frame: impl Into<OutboundFrame>) {
        match self.sender.try_send(frame.into()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!(peer = %self.id, "dropping outbound frame: send queue full");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }

    /// Refresh the heartbeat timestamp (called on `pong`).
    pub fn touch(&self) {
        if let Ok(mut guard) = self.last_beat.lock() {
            *guard = Instant::now();
        }
    }

    pub fn last_beat(&self) -> Instant {
        self.last_beat
            .lock()
            .ok()
            .map(|guard| *guard)
            .unwrap_or_else(Instant::now)
    }

    /// Arm the keepalive task, replacing (and not cancelling) any previous one.
    pub fn set_keepalive_handle(&self, handle: JoinHandle<()>) {
        if let Ok(mut guard) = self.keepalive_handle.lock() {
            *guard = Some(handle);
        }
    }

    /// Cancel the scheduled keepalive future, if any. Idempotent.
    pub fn cancel_keepalive(&self) {
        if let Ok(mut guard) = self.keepalive_handle.lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }

    /// Signal the owning `handle_connection` task to stop reading and tear
    /// down the socket. Idempotent: a second call is a no-op, so it is safe
    /// to call from both a normal disconnect (inside the read loop) and a
    /// keepalive eviction (from the keepalive task).
    pub fn close_transport(&self) {
        if let Ok(mut guard) = self.shutdown.lock() {
            if let Some(tx) = guard.take() {
                let _ = tx.send(());
            }
        }
    }

    /// The shape published to other peers and in roster responses.
    pub fn public(&self) -> PeerPublic {
        PeerPublic {
            id: self.id.clone(),
            name: self.name.clone(),
            rtc_supported: self.rtc_supported,
        }
    }
}
