//! Keyframe solicitation.
//!
//! Periodically asks every sender in every room to emit an intra-coded
//! frame, so that newly-subscribed peers can decode immediately instead of
//! waiting for the next natural keyframe. Audio doesn't need this, but the
//! mechanism is kept general over every peer's receivers rather than
//! restricted to video.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use webrtc::rtcp::payload_feedbacks::picture_loss_indication::PictureLossIndication;

use crate::room::{Room, RoomRegistry};

/// Emit a PLI RTCP packet for every receiver of every peer in `room`.
///
/// Takes the room's write lock, not a read lock, even though it only reads
/// the peer list — conservative but possibly unnecessary; the room may be
/// under concurrent mutation from a synchronization round, so this takes
/// the write lock here too.
pub async fn solicit_room(room: &Arc<Room>) {
    let state = room.state.write().await;
    for peer in &state.peers {
        for receiver in peer.peer_connection.get_receivers().await {
            for track in receiver.tracks().await {
                let ssrc = track.ssrc();
                if ssrc == 0 {
                    continue;
                }
                let pli = PictureLossIndication {
                    sender_ssrc: 0,
                    media_ssrc: ssrc,
                };
                if let Err(e) = peer.peer_connection.write_rtcp(&[Box::new(pli)]).await {
                    debug!(room_id = %room.id, error = %e, "failed to write PLI (best-effort)");
                }
            }
        }
    }
}

/// Background task: ticks every `interval`, soliciting keyframes across
/// every currently-registered room.
pub async fn run_ticker(registry: Arc<RoomRegistry>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        for room in registry.snapshot().await {
            solicit_room(&room).await;
        }
    }
}
