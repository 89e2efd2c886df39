//! Errors produced by the SFU core.

use thiserror::Error;

/// Errors that can occur during signaling and media operations.
#[derive(Debug, Error)]
pub enum SfuError {
    /// The client's initial message was not a well-formed `join`.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Peer-connection or transceiver construction failed.
    #[error("webrtc error: {0}")]
    WebRtc(String),

    /// SDP offer/answer or track attach/detach failed during sync.
    #[error("signaling error: {0}")]
    Signaling(String),

    /// The per-client message channel is gone.
    #[error("channel closed")]
    ChannelClosed,
}

impl From<webrtc::Error> for SfuError {
    fn from(err: webrtc::Error) -> Self {
        Self::WebRtc(err.to_string())
    }
}

impl From<serde_json::Error> for SfuError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(err.to_string())
    }
}
