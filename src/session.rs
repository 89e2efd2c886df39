//! Per-peer session driver.
//!
//! Owns one client's lifecycle end to end: handshake, join, peer-connection
//! construction, callback wiring, the read loop, and teardown.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::StreamExt;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;
use webrtc::api::API;
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;
use webrtc::track::track_local::TrackLocal;

use crate::config::Config;
use crate::room::{PeerRecord, Room, RoomRegistry};
use crate::sync::synchronize_room;
use crate::voice::{api as voice_api, track};
use crate::ws::protocol::{CandidatePayload, Envelope, JoinPayload};
use crate::ws::writer::ClientWriter;

/// Drive one client's connection from upgrade to teardown.
pub async fn run_session(
    socket: WebSocket,
    registry: Arc<RoomRegistry>,
    api: Arc<API>,
    config: Arc<Config>,
) {
    let (sink, mut stream) = socket.split();
    let writer = ClientWriter::new(sink);

    let ping_writer = writer.clone();
    let ping_interval = config.ping_interval;
    let ping_deadline = config.ping_write_deadline;
    let ping_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(ping_interval);
        loop {
            ticker.tick().await;
            if ping_writer.send_ping(ping_deadline).await.is_err() {
                ping_writer.close().await;
                break;
            }
        }
    });

    let outcome = drive_session(&mut stream, &writer, &registry, &api, &config).await;
    ping_task.abort();

    if let Some((room_id, peer_id, peer_connection)) = outcome {
        let _ = peer_connection.close().await;
        registry.remove_peer(&room_id, peer_id).await;
        if let Some(room) = registry.get(&room_id).await {
            synchronize_room(room, config.clone()).await;
        }
    }
    writer.close().await;
}

/// Everything after the handshake: join, peer-connection setup, and the
/// read loop. Returns the room/peer identity to clean up on exit, if the
/// session ever got that far.
async fn drive_session(
    stream: &mut (impl futures::Stream<Item = Result<Message, axum::Error>> + Unpin),
    writer: &ClientWriter,
    registry: &Arc<RoomRegistry>,
    api: &Arc<API>,
    config: &Arc<Config>,
) -> Option<(String, Uuid, Arc<webrtc::peer_connection::RTCPeerConnection>)> {
    let join = match read_join(stream, config.read_deadline).await {
        Ok(join) => join,
        Err(e) => {
            warn!(error = %e, "join handshake failed");
            return None;
        }
    };

    if join.room_id.is_empty() {
        warn!("empty roomId, terminating session before registering");
        return None;
    }
    let name = if join.name.is_empty() {
        "Anonymous".to_string()
    } else {
        join.name
    };

    let room = registry.get_or_create(&join.room_id).await;
    let rtc_config = voice_api::rtc_config(config);
    let peer_connection = match api.new_peer_connection(rtc_config).await {
        Ok(pc) => Arc::new(pc),
        Err(e) => {
            warn!(error = %e, "failed to construct peer connection");
            return None;
        }
    };

    if let Err(e) = peer_connection
        .add_transceiver_from_kind(
            RTPCodecType::Audio,
            Some(RTCRtpTransceiverInit {
                direction: RTCRtpTransceiverDirection::Recvonly,
                send_encodings: vec![],
            }),
        )
        .await
    {
        warn!(error = %e, "failed to add recvonly audio transceiver");
        let _ = peer_connection.close().await;
        return None;
    }

    install_callbacks(&peer_connection, writer.clone(), room.clone(), config.clone(), name.clone());

    let peer_id = Uuid::new_v4();
    {
        let mut state = room.state.write().await;
        state.peers.push(PeerRecord {
            id: peer_id,
            peer_connection: peer_connection.clone(),
            writer: writer.clone(),
            name,
        });
    }
    synchronize_room(room.clone(), config.clone()).await;

    read_loop(stream, &peer_connection, config.read_deadline).await;

    Some((join.room_id, peer_id, peer_connection))
}

/// Read exactly one message and require it to be a well-formed `join`.
async fn read_join(
    stream: &mut (impl futures::Stream<Item = Result<Message, axum::Error>> + Unpin),
    deadline: Duration,
) -> anyhow::Result<JoinPayload> {
    let msg = tokio::time::timeout(deadline, stream.next())
        .await
        .map_err(|_| anyhow::anyhow!("timed out waiting for join"))?
        .ok_or_else(|| anyhow::anyhow!("channel closed before join"))??;

    let Message::Text(text) = msg else {
        anyhow::bail!("expected text frame for join");
    };
    let envelope: Envelope = serde_json::from_str(&text)?;
    if envelope.event != "join" {
        anyhow::bail!("expected join, got {}", envelope.event);
    }
    Ok(envelope.parse_data()?)
}

fn install_callbacks(
    pc: &Arc<webrtc::peer_connection::RTCPeerConnection>,
    writer: ClientWriter,
    room: Arc<Room>,
    config: Arc<Config>,
    name: String,
) {
    let candidate_writer = writer.clone();
    pc.on_ice_candidate(Box::new(move |candidate| {
        let writer = candidate_writer.clone();
        Box::pin(async move {
            let Some(candidate) = candidate else { return };
            let Ok(json) = candidate.to_json() else { return };
            let _ = writer.send_json("candidate", &json).await;
        })
    }));

    let state_room = room.clone();
    let state_config = config.clone();
    let weak_pc = Arc::downgrade(pc);
    pc.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
        let room = state_room.clone();
        let config = state_config.clone();
        let weak_pc = weak_pc.clone();
        Box::pin(async move {
            match state {
                RTCPeerConnectionState::Failed => {
                    debug!("peer connection failed, closing");
                    if let Some(pc) = weak_pc.upgrade() {
                        let _ = pc.close().await;
                    }
                }
                RTCPeerConnectionState::Closed => {
                    synchronize_room(room, config).await;
                }
                _ => {}
            }
        })
    }));

    pc.on_ice_connection_state_change(Box::new(|state: RTCIceConnectionState| {
        debug!(?state, "ice connection state changed");
        Box::pin(async {})
    }));

    let track_room = room;
    let track_config = config;
    let rtp_buffer = track_config.rtp_read_buffer;
    pc.on_track(Box::new(move |remote_track, _receiver, _transceiver| {
        let room = track_room.clone();
        let config = track_config.clone();
        let name = name.clone();
        Box::pin(async move {
            let origin_id = remote_track.id();
            let stream_id = remote_track.stream_id();
            let forwarding = track::new_forwarding_track(&remote_track);

            {
                let mut state = room.state.write().await;
                state.track_names.insert(origin_id.clone(), name.clone());
                state.stream_names.insert(stream_id.clone(), name.clone());
                if forwarding.id() != origin_id {
                    state.track_names.insert(forwarding.id().to_string(), name.clone());
                }
                state.tracks.insert(origin_id.clone(), forwarding.clone());
            }
            synchronize_room(room.clone(), config.clone()).await;

            info!(origin_id = %origin_id, "ingesting track");
            track::run_ingest(&origin_id, remote_track, forwarding, rtp_buffer).await;

            {
                let mut state = room.state.write().await;
                state.track_names.remove(&origin_id);
                state.stream_names.remove(&stream_id);
                state.tracks.remove(&origin_id);
            }
            synchronize_room(room, config).await;
        })
    }));
}

async fn read_loop(
    stream: &mut (impl futures::Stream<Item = Result<Message, axum::Error>> + Unpin),
    pc: &Arc<webrtc::peer_connection::RTCPeerConnection>,
    read_deadline: Duration,
) {
    let mut last_pong = Instant::now();
    loop {
        let remaining = read_deadline.saturating_sub(last_pong.elapsed());
        if remaining.is_zero() {
            debug!("read deadline exceeded without a pong");
            return;
        }

        let Ok(next) = tokio::time::timeout(remaining, stream.next()).await else {
            debug!("read timed out waiting for a message");
            return;
        };

        let Some(Ok(msg)) = next else {
            return;
        };

        match msg {
            Message::Pong(_) => {
                last_pong = Instant::now();
            }
            Message::Text(text) => {
                if let Err(e) = dispatch(&text, pc).await {
                    warn!(error = %e, "failed to handle message, ending session");
                    return;
                }
            }
            Message::Close(_) => return,
            _ => {}
        }
    }
}

async fn dispatch(
    text: &str,
    pc: &Arc<webrtc::peer_connection::RTCPeerConnection>,
) -> anyhow::Result<()> {
    let envelope: Envelope = serde_json::from_str(text)?;
    match envelope.event.as_str() {
        "candidate" => {
            let candidate: CandidatePayload = envelope.parse_data()?;
            pc.add_ice_candidate(candidate).await?;
        }
        "answer" => {
            let answer: RTCSessionDescription = envelope.parse_data()?;
            pc.set_remote_description(answer).await?;
        }
        other => {
            debug!(event = other, "ignoring unknown event");
        }
    }
    Ok(())
}
