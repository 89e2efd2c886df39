//! Many-to-many real-time audio conferencing SFU.
//!
//! Clients connect over a WebSocket, negotiate a peer-to-peer media
//! session with the server, upload one audio stream, and receive a
//! fan-out of every other participant's audio stream in the same room.
//! The server never mixes, transcodes, or stores media — it re-addresses
//! received RTP packets and forwards them, one copy per subscriber.

pub mod config;
pub mod error;
pub mod http;
pub mod keyframe;
pub mod room;
pub mod session;
pub mod sync;
pub mod voice;
pub mod ws;
