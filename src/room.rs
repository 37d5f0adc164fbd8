//! Room registry: the process-wide mapping from [`RoomKey`] to the peers
//! currently grouped under it (§4.4).
//!
//! Each room is stored as a `Vec`, scanned linearly for peer-id lookups —
//! acceptable given the expected handful of peers sharing a LAN address.
//! The outer [`DashMap`] gives per-room atomicity: every operation below
//! holds a single shard guard for its whole duration, so `join`/`leave`
//! never interleave with another `join`/`leave` on the same room.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::identity::PeerId;
use crate::session::{PeerSession, RoomKey};

/// Loopback variants canonicalize to the IPv4 loopback address (§3, §8).
pub fn canonical_room_key(raw: &str) -> RoomKey {
    match raw {
        "::1" | "::ffff:127.0.0.1" => "127.0.0.1".to_string(),
        other => other.to_string(),
    }
}

/// Resolve the [`RoomKey`] for an incoming connection from an optional
/// forwarding header value and the transport-level remote address.
pub fn resolve_room_key(forwarded_for: Option<&str>, remote_addr: &str) -> RoomKey {
    let raw = match forwarded_for {
        Some(value) => value
            .split(',')
            .next()
            .unwrap_or(value)
            .trim()
            .to_string(),
        None => remote_addr.to_string(),
    };
    canonical_room_key(&raw)
}

/// Process-wide peer-discovery registry.
pub struct RoomRegistry {
    rooms: DashMap<RoomKey, Vec<Arc<PeerSession>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
        }
    }

    /// Insert `session` into its room, returning the peers that were
    /// already present (for announcement to the newcomer).
    pub fn join(&self, session: Arc<PeerSession>) -> Vec<Arc<PeerSession>> {
        let mut room = self.rooms.entry(session.room_key.clone()).or_default();
        let existing: Vec<Arc<PeerSession>> = room.clone();
        room.push(session.clone());
        debug!(
            room = %session.room_key,
            peer = %session.id,
            room_size = room.len(),
            "peer joined room"
        );
        existing
    }

    /// Remove `session` from its room, returning the peers that remain.
    /// Removes the room entry entirely if it becomes empty (I3). Idempotent:
    /// calling this for a session already absent from its room is a no-op
    /// that returns the current occupants.
    pub fn leave(&self, session: &PeerSession) -> Vec<Arc<PeerSession>> {
        let mut remove_room = false;
        let survivors = match self.rooms.get_mut(&session.room_key) {
            Some(mut room) => {
                room.retain(|p| p.id != session.id);
                remove_room = room.is_empty();
                room.clone()
            }
            None => Vec::new(),
        };

        if remove_room {
            self.rooms.remove(&session.room_key);
            debug!(room = %session.room_key, "room emptied, entry removed");
        }

        survivors
    }

    /// Find a peer by id within a specific room.
    pub fn lookup(&self, room_key: &str, peer_id: &str) -> Option<Arc<PeerSession>> {
        self.rooms
            .get(room_key)
            .and_then(|room| room.iter().find(|p| p.id == peer_id).cloned())
    }

    /// All other peers currently in `room_key`, excluding `except_peer_id`.
    pub fn others(&self, room_key: &str, except_peer_id: &PeerId) -> Vec<Arc<PeerSession>> {
        self.rooms
            .get(room_key)
            .map(|room| {
                room.iter()
                    .filter(|p| &p.id != except_peer_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn peer_count(&self) -> usize {
        self.rooms.iter().map(|r| r.value().len()).sum()
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}
