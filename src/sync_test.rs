//! Tests for the signaling synchronizer.

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::room::{PeerRecord, RoomRegistry};
    use crate::voice::api::build_api;
    use crate::ws::writer::ClientWriter;
    use axum::extract::ws::{WebSocket, WebSocketUpgrade};
    use axum::extract::State;
    use axum::response::Response;
    use axum::routing::get;
    use axum::Router;
    use futures::StreamExt;
    use std::sync::{Arc as StdArc, Mutex as StdMutex};
    use std::time::Duration;
    use tokio::sync::oneshot;
    use uuid::Uuid;
    use webrtc::peer_connection::configuration::RTCConfiguration;
    use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
    use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;

    #[derive(Clone)]
    struct WriterSlot(StdArc<StdMutex<Option<oneshot::Sender<ClientWriter>>>>);

    async fn upgrade(ws: WebSocketUpgrade, State(slot): State<WriterSlot>) -> Response {
        ws.on_upgrade(move |socket| handle_socket(socket, slot))
    }

    async fn handle_socket(socket: WebSocket, slot: WriterSlot) {
        let (sink, mut stream) = socket.split();
        if let Some(tx) = slot.0.lock().unwrap().take() {
            let _ = tx.send(ClientWriter::new(sink));
        }
        while stream.next().await.is_some() {}
    }

    fn opus_track(id: &str) -> Arc<TrackLocalStaticRTP> {
        Arc::new(TrackLocalStaticRTP::new(
            RTCRtpCodecCapability {
                mime_type: "audio/opus".to_string(),
                clock_rate: 48000,
                channels: 2,
                ..Default::default()
            },
            id.to_string(),
            format!("{id}-stream"),
        ))
    }

    /// Spins up a real `axum` WebSocket server and a `tokio-tungstenite`
    /// client connected to it, and hands back the server-side `ClientWriter`
    /// so tests can exercise writer-dependent code against a live socket.
    async fn connect_writer() -> (
        ClientWriter,
        tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >,
    ) {
        let (writer_tx, writer_rx) = oneshot::channel::<ClientWriter>();
        let slot = WriterSlot(StdArc::new(StdMutex::new(Some(writer_tx))));

        let app = Router::new()
            .route("/ws", get(upgrade))
            .with_state(slot);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let (ws_stream, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
            .await
            .unwrap();
        let writer = writer_rx.await.unwrap();
        (writer, ws_stream)
    }

    async fn new_peer_connection() -> Arc<RTCPeerConnection> {
        let api = build_api().unwrap();
        Arc::new(
            api.new_peer_connection(RTCConfiguration::default())
                .await
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn sending_set_includes_a_locally_added_sender_track() {
        let pc = new_peer_connection().await;
        let track = opus_track("local-track");
        pc.add_track(track.clone()).await.unwrap();

        let ids = sending_set(&pc).await;
        assert!(ids.contains("local-track"));
    }

    #[tokio::test]
    async fn sending_set_is_empty_for_a_fresh_peer_connection() {
        let pc = new_peer_connection().await;
        assert!(sending_set(&pc).await.is_empty());
    }

    #[tokio::test]
    async fn attempt_attaches_missing_room_tracks_and_sends_an_offer() {
        let registry = RoomRegistry::new();
        let room = registry.get_or_create("room-a").await;
        let pc = new_peer_connection().await;
        let (writer, mut client_stream) = connect_writer().await;

        {
            let mut state = room.state.write().await;
            state.peers.push(PeerRecord {
                id: Uuid::new_v4(),
                peer_connection: pc.clone(),
                writer,
                name: "Alice".to_string(),
            });
            state
                .tracks
                .insert("origin-1".to_string(), opus_track("origin-1"));
            state
                .track_names
                .insert("origin-1".to_string(), "Bob".to_string());
        }

        assert!(attempt(&room).await.is_ok());

        // The forwarding track was attached as a sender on the one peer in
        // the room (loopback suppression doesn't apply here since the peer
        // didn't upload "origin-1" itself).
        let senders = pc.get_senders().await;
        let mut attached = false;
        for sender in senders {
            if let Some(track) = sender.track().await {
                if track.id() == "origin-1" {
                    attached = true;
                }
            }
        }
        assert!(attached, "expected origin-1 to be attached as a sender");

        // An offer carrying the track's label was pushed to the client.
        let msg = tokio::time::timeout(Duration::from_secs(5), client_stream.next())
            .await
            .expect("timed out waiting for offer")
            .expect("stream ended")
            .expect("websocket error");
        let text = msg.into_text().expect("expected a text frame");
        let envelope: crate::ws::protocol::Envelope = serde_json::from_str(&text).unwrap();
        assert_eq!(envelope.event, "offer");
        assert!(envelope.data.contains("origin-1"));
        assert!(envelope.data.contains("Bob"));
    }

    #[tokio::test]
    async fn attempt_restarts_when_a_peer_connection_is_already_closed() {
        let registry = RoomRegistry::new();
        let room = registry.get_or_create("room-b").await;
        let pc = new_peer_connection().await;
        pc.close().await.unwrap();
        let (writer, _client_stream) = connect_writer().await;

        {
            let mut state = room.state.write().await;
            state.peers.push(PeerRecord {
                id: Uuid::new_v4(),
                peer_connection: pc,
                writer,
                name: "Closed".to_string(),
            });
        }

        assert!(attempt(&room).await.is_err());
        assert!(room.state.read().await.peers.is_empty());
    }
}
