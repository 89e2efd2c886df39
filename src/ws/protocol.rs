//! Client <-> server message envelope.
//!
//! Every message on the channel is `{ "event": <string>, "data": <string> }`,
//! where `data` is itself a JSON document, double-encoded as a string. This
//! mirrors the wire format of the reference implementation exactly so that
//! unmodified browser clients can speak to this server.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

/// The outer envelope exchanged over the message channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    pub data: String,
}

impl Envelope {
    /// Build an envelope by serializing `payload` as the inner JSON string.
    pub fn new(event: &str, payload: &impl Serialize) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event: event.to_string(),
            data: serde_json::to_string(payload)?,
        })
    }

    /// Parse the inner `data` string as `T`.
    pub fn parse_data<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.data)
    }
}

/// Payload of the client's first (and only) `join` message.
#[derive(Debug, Clone, Deserialize)]
pub struct JoinPayload {
    #[serde(rename = "roomId")]
    pub room_id: String,
    #[serde(default)]
    pub name: String,
}

/// Payload of a server-emitted `offer` message.
#[derive(Debug, Clone, Serialize)]
pub struct OfferPayload {
    pub offer: RTCSessionDescription,
    #[serde(rename = "trackNames")]
    pub track_names: HashMap<String, String>,
    #[serde(rename = "streamNames")]
    pub stream_names: HashMap<String, String>,
}

/// Payload of a client-sent `answer` message: a bare session description.
pub type AnswerPayload = RTCSessionDescription;

/// Payload of a `candidate` message, sent in both directions.
pub type CandidatePayload = RTCIceCandidateInit;
