//! Forwarding-track lifecycle and RTP ingest.
//!
//! When a client's inbound track fires its first packet, a forwarding
//! track is created (codec copied from the inbound track, same id so
//! loopback suppression downstream keeps working off that shared id),
//! inserted into the room, and an ingest loop begins copying packets from
//! the inbound track into it with extensions stripped, since the SFU
//! cannot rewrite extensions consistently across every fan-out
//! destination.

use std::sync::Arc;

use tracing::debug;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;
use webrtc::track::track_local::TrackLocalWriter;
use webrtc::track::track_remote::TrackRemote;

/// Create the forwarding track for a newly-arrived inbound track, reusing
/// the inbound track's id and stream id.
pub fn new_forwarding_track(source: &TrackRemote) -> Arc<TrackLocalStaticRTP> {
    let codec = source.codec();
    Arc::new(TrackLocalStaticRTP::new(
        RTCRtpCodecCapability {
            mime_type: codec.capability.mime_type,
            clock_rate: codec.capability.clock_rate,
            channels: codec.capability.channels,
            sdp_fmtp_line: codec.capability.sdp_fmtp_line,
            rtcp_feedback: vec![],
        },
        source.id(),
        source.stream_id(),
    ))
}

/// Strip RTP header extensions from a packet in place.
///
/// Extensions carry per-hop semantics (e.g. audio-level, transport-cc) that
/// the SFU cannot generally rewrite consistently for every subscriber, so
/// they are dropped rather than forwarded as-is.
pub fn strip_extensions(packet: &mut webrtc::rtp::packet::Packet) {
    packet.header.extension = false;
    packet.header.extension_profile = 0;
    packet.header.extensions.clear();
}

/// Read RTP packets from `source` and write them into `forwarding`, one
/// copy per call, stripping extensions. Runs until the source track ends
/// or a read error occurs.
pub async fn run_ingest(
    origin_id: &str,
    source: Arc<TrackRemote>,
    forwarding: Arc<TrackLocalStaticRTP>,
    read_buffer: usize,
) {
    let mut buf = vec![0u8; read_buffer];

    loop {
        match source.read(&mut buf).await {
            Ok((mut packet, _attributes)) => {
                strip_extensions(&mut packet);
                if let Err(e) = forwarding.write_rtp(&packet).await {
                    debug!(origin_id, error = %e, "failed to forward rtp packet");
                }
            }
            Err(e) => {
                debug!(origin_id, error = %e, "ingest loop ended");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webrtc::rtp::extension::audio_level_extension::AudioLevelExtension;
    use webrtc::rtp::header::Extension;
    use webrtc::rtp::packet::Packet;
    use webrtc_util::Marshal;

    #[test]
    fn strip_extensions_clears_extension_fields() {
        let mut packet = Packet::default();
        packet.header.extension = true;
        packet.header.extension_profile = 0xBEDE;
        packet.header.extensions.push(Extension {
            id: 1,
            payload: AudioLevelExtension { level: 10, voice: true }
                .marshal()
                .unwrap(),
        });

        strip_extensions(&mut packet);

        assert!(!packet.header.extension);
        assert_eq!(packet.header.extension_profile, 0);
        assert!(packet.header.extensions.is_empty());
    }

    #[test]
    fn strip_extensions_leaves_payload_and_ssrc_unchanged() {
        let mut packet = Packet::default();
        packet.header.ssrc = 42;
        packet.payload = vec![1, 2, 3].into();
        packet.header.extension = true;

        strip_extensions(&mut packet);

        assert_eq!(packet.header.ssrc, 42);
        assert_eq!(&packet.payload[..], &[1, 2, 3]);
    }
}
