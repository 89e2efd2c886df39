//! Signaling synchronizer.
//!
//! Brings every peer in a room into sync with the room's forwarded-track
//! set: attaches/detaches senders, suppresses loopback, and drives a fresh
//! offer/answer round. Tolerates racing mutations (a peer closing mid-scan)
//! via a bounded number of restarted attempts, deferring to a retry later
//! if the room stays contended rather than looping forever.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use tracing::warn;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::track::track_local::TrackLocal;

use crate::config::Config;
use crate::keyframe;
use crate::room::Room;
use crate::ws::protocol::OfferPayload;

/// Reconcile `room`'s peers with its forwarded-track set and deliver fresh
/// offers, then trigger keyframe solicitation once this call returns —
/// regardless of how many internal attempts it took.
pub fn synchronize_room(room: Arc<Room>, config: Arc<Config>) -> BoxFuture<'static, ()> {
    async move {
        run_with_retry(room.clone(), config).await;
        keyframe::solicit_room(&room).await;
    }
    .boxed()
}

fn run_with_retry(room: Arc<Room>, config: Arc<Config>) -> BoxFuture<'static, ()> {
    async move {
        for _ in 0..config.sync_retry_cap {
            if attempt(&room).await.is_ok() {
                return;
            }
        }

        warn!(room_id = %room.id, "sync retry cap reached, deferring resync");
        tokio::spawn(async move {
            tokio::time::sleep(config.sync_defer_delay).await;
            synchronize_room(room, config).await;
        });
    }
    .boxed()
}

/// One reconciliation pass under the room's write lock. `Err(())` signals
/// that the caller should restart the whole attempt.
async fn attempt(room: &Arc<Room>) -> Result<(), ()> {
    let mut state = room.state.write().await;

    // (a) Drop any peer whose connection already closed; restart the scan
    // since removal invalidates subsequent indices.
    for i in 0..state.peers.len() {
        if state.peers[i].peer_connection.connection_state() == RTCPeerConnectionState::Closed {
            state.peers.remove(i);
            return Err(());
        }
    }

    for idx in 0..state.peers.len() {
        let pc = state.peers[idx].peer_connection.clone();

        // (b) sender ids ∪ receiver ids — a peer receiving its own upload
        // is how loopback is suppressed, since the forwarding track
        // reuses the origin track's id downstream.
        let sending_ids = sending_set(&pc).await;

        // (c) detach senders whose track is no longer forwarded.
        for sender in pc.get_senders().await {
            if let Some(track) = sender.track().await {
                if !state.tracks.contains_key(track.id()) && pc.remove_track(&sender).await.is_err() {
                    return Err(());
                }
            }
        }

        // (d) attach forwarded tracks this peer isn't already sending or
        // receiving.
        let missing: Vec<_> = state
            .tracks
            .iter()
            .filter(|(id, _)| !sending_ids.contains(id.as_str()))
            .map(|(_, track)| track.clone())
            .collect();

        for track in missing {
            let local: Arc<dyn TrackLocal + Send + Sync> = track;
            if pc.add_track(local).await.is_err() {
                return Err(());
            }
        }

        // (e) renegotiate.
        let Ok(offer) = pc.create_offer(None).await else {
            return Err(());
        };
        if pc.set_local_description(offer.clone()).await.is_err() {
            return Err(());
        }

        let payload = OfferPayload {
            offer,
            track_names: state.track_names.clone(),
            stream_names: state.stream_names.clone(),
        };
        if state.peers[idx]
            .writer
            .send_json("offer", &payload)
            .await
            .is_err()
        {
            return Err(());
        }
    }

    Ok(())
}

async fn sending_set(pc: &Arc<RTCPeerConnection>) -> HashSet<String> {
    let mut ids = HashSet::new();
    for sender in pc.get_senders().await {
        if let Some(track) = sender.track().await {
            ids.insert(track.id().to_string());
        }
    }
    for receiver in pc.get_receivers().await {
        for track in receiver.tracks().await {
            ids.insert(track.id());
        }
    }
    ids
}

#[cfg(test)]
#[path = "sync_test.rs"]
mod sync_test;

