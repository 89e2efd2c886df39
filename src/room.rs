//! Room registry and room state.
//!
//! A room is created lazily on first join and deleted once it holds no
//! peers and no forwarded tracks. All reads and mutations of a room's
//! fields happen while holding that room's lock; the registry lock sits
//! strictly above it in acquisition order and is never taken while
//! holding a room lock, except the end-of-life delete below.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;

use crate::ws::writer::ClientWriter;

/// One connected client's record within a room.
pub struct PeerRecord {
    /// Server-assigned identity; the peer-connection itself acts as
    /// identity inside a room, this is just a stable handle to it.
    pub id: Uuid,
    pub peer_connection: Arc<RTCPeerConnection>,
    pub writer: ClientWriter,
    pub name: String,
}

/// Per-room container holding the peer set, forwarded tracks, and labels.
///
/// Every field here is guarded by `Room::state`'s single lock — the
/// invariant that a forwarding track always has a matching `track_names`
/// entry only holds if both are mutated atomically, which requires one
/// combined lock rather than one per field.
#[derive(Default)]
pub struct RoomState {
    pub peers: Vec<PeerRecord>,
    pub tracks: HashMap<String, Arc<TrackLocalStaticRTP>>,
    pub track_names: HashMap<String, String>,
    pub stream_names: HashMap<String, String>,
}

impl RoomState {
    /// True iff the room has neither peers nor forwarded tracks.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty() && self.tracks.is_empty()
    }
}

/// A room: its identifier and its lock-guarded state.
pub struct Room {
    pub id: String,
    pub state: RwLock<RoomState>,
}

impl Room {
    fn new(id: String) -> Self {
        Self {
            id,
            state: RwLock::new(RoomState::default()),
        }
    }
}

/// Process-wide mapping from room identifier to room state.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: RwLock<HashMap<String, Arc<Room>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the room for `room_id`, creating it with empty collections
    /// if it doesn't exist yet.
    pub async fn get_or_create(&self, room_id: &str) -> Arc<Room> {
        {
            let rooms = self.rooms.read().await;
            if let Some(room) = rooms.get(room_id) {
                return room.clone();
            }
        }
        let mut rooms = self.rooms.write().await;
        rooms
            .entry(room_id.to_string())
            .or_insert_with(|| Arc::new(Room::new(room_id.to_string())))
            .clone()
    }

    /// Look up a room without creating it.
    pub async fn get(&self, room_id: &str) -> Option<Arc<Room>> {
        self.rooms.read().await.get(room_id).cloned()
    }

    /// Snapshot every currently-registered room.
    pub async fn snapshot(&self) -> Vec<Arc<Room>> {
        self.rooms.read().await.values().cloned().collect()
    }

    /// Remove `peer_id` from `room_id`'s peer list, deleting the room if
    /// it becomes empty of both peers and tracks.
    pub async fn remove_peer(&self, room_id: &str, peer_id: Uuid) {
        let room = {
            let rooms = self.rooms.read().await;
            match rooms.get(room_id) {
                Some(room) => room.clone(),
                None => return,
            }
        };

        let became_empty = {
            let mut state = room.state.write().await;
            state.peers.retain(|p| p.id != peer_id);
            state.is_empty()
        };

        if became_empty {
            let mut rooms = self.rooms.write().await;
            if let Some(room) = rooms.get(room_id) {
                if room.state.read().await.is_empty() {
                    rooms.remove(room_id);
                    debug!(room_id, "removed empty room");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_or_create_returns_same_room() {
        let registry = RoomRegistry::new();
        let a = registry.get_or_create("r").await;
        let b = registry.get_or_create("r").await;
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn remove_peer_deletes_empty_room() {
        let registry = RoomRegistry::new();
        let room = registry.get_or_create("r2").await;
        let peer_id = Uuid::new_v4();

        // We can't construct a real RTCPeerConnection/ClientWriter without
        // a live socket in a unit test; exercise the registry bookkeeping
        // directly against `tracks`, which `remove_peer`'s emptiness check
        // also depends on.
        {
            let mut state = room.state.write().await;
            state
                .tracks
                .insert("fake".into(), dummy_track());
        }
        registry.remove_peer("r2", peer_id).await;
        // Room is not empty (has a track), so it must still be registered.
        assert!(registry.get("r2").await.is_some());

        room.state.write().await.tracks.clear();
        registry.remove_peer("r2", peer_id).await;
        assert!(registry.get("r2").await.is_none());
    }

    fn dummy_track() -> Arc<TrackLocalStaticRTP> {
        use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
        Arc::new(TrackLocalStaticRTP::new(
            RTCRtpCodecCapability {
                mime_type: "audio/opus".to_string(),
                ..Default::default()
            },
            "dummy".to_string(),
            "dummy-stream".to_string(),
        ))
    }
}
