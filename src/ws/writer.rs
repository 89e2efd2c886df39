//! Thread-safe message writer.
//!
//! Wraps the sending half of a client's WebSocket so that concurrent
//! emitters — the ICE candidate callback, the offer sender, the ping
//! timer — never interleave frames on the wire. All writes on a client
//! channel MUST go through this type; a direct write to the split sink
//! elsewhere is a bug.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::SinkExt;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::{timeout, Duration};

use crate::error::SfuError;
use crate::ws::protocol::Envelope;

/// Serializes writes onto a single client channel.
#[derive(Clone)]
pub struct ClientWriter {
    sink: Arc<Mutex<SplitSink<WebSocket, Message>>>,
    closed: Arc<AtomicBool>,
}

impl ClientWriter {
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self {
            sink: Arc::new(Mutex::new(sink)),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Serialize `payload` under `event` and write it as a single text frame.
    pub async fn send_json(&self, event: &str, payload: &impl Serialize) -> Result<(), SfuError> {
        let envelope = Envelope::new(event, payload)?;
        let text = serde_json::to_string(&envelope)?;
        self.write_text(text).await
    }

    /// Send a ping control frame, failing if it doesn't complete within `deadline`.
    pub async fn send_ping(&self, deadline: Duration) -> Result<(), SfuError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SfuError::ChannelClosed);
        }
        let mut sink = self.sink.lock().await;
        timeout(deadline, sink.send(Message::Ping(Vec::new().into())))
            .await
            .map_err(|_| SfuError::ChannelClosed)?
            .map_err(|_| SfuError::ChannelClosed)
    }

    async fn write_text(&self, text: String) -> Result<(), SfuError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SfuError::ChannelClosed);
        }
        let mut sink = self.sink.lock().await;
        sink.send(Message::Text(text.into()))
            .await
            .map_err(|_| SfuError::ChannelClosed)
    }

    /// Close the underlying channel. Idempotent.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut sink = self.sink.lock().await;
        let _ = sink.close().await;
    }
}
