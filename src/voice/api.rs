//! Construction of the shared `webrtc-rs` API instance.
//!
//! The server only ever forwards Opus audio, so the media engine registers
//! exactly that codec.

use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::{APIBuilder, API};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTCRtpCodecParameters, RTPCodecType};

use crate::config::Config;
use crate::error::SfuError;

/// Build the process-wide `webrtc::api::API`, with Opus registered and the
/// default interceptor set (NACK, RTCP reports, twcc) attached.
pub fn build_api() -> Result<API, SfuError> {
    let mut media_engine = MediaEngine::default();

    media_engine
        .register_codec(
            RTCRtpCodecParameters {
                capability: RTCRtpCodecCapability {
                    mime_type: "audio/opus".to_string(),
                    clock_rate: 48000,
                    channels: 2,
                    sdp_fmtp_line: "minptime=10;useinbandfec=1".to_string(),
                    rtcp_feedback: vec![],
                },
                payload_type: 111,
                ..Default::default()
            },
            RTPCodecType::Audio,
        )
        .map_err(SfuError::from)?;

    let mut registry = Registry::new();
    registry = register_default_interceptors(registry, &mut media_engine).map_err(SfuError::from)?;

    Ok(APIBuilder::new()
        .with_media_engine(media_engine)
        .with_interceptor_registry(registry)
        .build())
}

/// Build the ICE server configuration for a new peer connection.
pub fn rtc_config(config: &Config) -> RTCConfiguration {
    let mut ice_servers = vec![RTCIceServer {
        urls: vec![config.stun_server.clone()],
        ..Default::default()
    }];

    if let Some(turn) = &config.turn_server {
        ice_servers.push(RTCIceServer {
            urls: vec![turn.clone()],
            username: config.turn_username.clone().unwrap_or_default(),
            credential: config.turn_credential.clone().unwrap_or_default(),
            ..Default::default()
        });
    }

    RTCConfiguration {
        ice_servers,
        ..Default::default()
    }
}
