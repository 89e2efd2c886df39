//! Server Configuration
//!
//! Loads configuration from environment variables.

use std::env;
use std::time::Duration;

use anyhow::Result;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (e.g., "0.0.0.0:8080")
    pub bind_address: String,

    /// WebRTC STUN server
    pub stun_server: String,

    /// WebRTC TURN server (optional)
    pub turn_server: Option<String>,

    /// WebRTC TURN username (optional)
    pub turn_username: Option<String>,

    /// WebRTC TURN credential (optional)
    pub turn_credential: Option<String>,

    /// How often every sender is asked to emit a keyframe.
    pub keyframe_interval: Duration,

    /// How often the per-client ping control frame is sent.
    pub ping_interval: Duration,

    /// Read deadline re-armed on every pong.
    pub read_deadline: Duration,

    /// Write deadline for the ping control frame.
    pub ping_write_deadline: Duration,

    /// Consecutive failed synchronization attempts before deferring.
    pub sync_retry_cap: u32,

    /// Delay before retrying a synchronization round that hit the retry cap.
    pub sync_defer_delay: Duration,

    /// RTP read buffer size, in bytes.
    pub rtp_read_buffer: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            stun_server: env::var("STUN_SERVER")
                .unwrap_or_else(|_| "stun:stun.l.google.com:19302".into()),
            turn_server: env::var("TURN_SERVER").ok(),
            turn_username: env::var("TURN_USERNAME").ok(),
            turn_credential: env::var("TURN_CREDENTIAL").ok(),
            keyframe_interval: Duration::from_secs(env_u64("KEYFRAME_INTERVAL_SECS", 3)),
            ping_interval: Duration::from_secs(env_u64("PING_INTERVAL_SECS", 30)),
            read_deadline: Duration::from_secs(env_u64("READ_DEADLINE_SECS", 60)),
            ping_write_deadline: Duration::from_secs(env_u64("PING_WRITE_DEADLINE_SECS", 10)),
            sync_retry_cap: env::var("SYNC_RETRY_CAP")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(25),
            sync_defer_delay: Duration::from_secs(env_u64("SYNC_DEFER_DELAY_SECS", 3)),
            rtp_read_buffer: env::var("RTP_READ_BUFFER")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1500),
        })
    }

    /// Check if TURN is configured.
    #[must_use]
    pub const fn has_turn(&self) -> bool {
        self.turn_server.is_some()
    }

    /// A default configuration for tests.
    #[must_use]
    pub fn default_for_test() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".into(),
            stun_server: "stun:stun.l.google.com:19302".into(),
            turn_server: None,
            turn_username: None,
            turn_credential: None,
            keyframe_interval: Duration::from_secs(3),
            ping_interval: Duration::from_secs(30),
            read_deadline: Duration::from_secs(60),
            ping_write_deadline: Duration::from_secs(10),
            sync_retry_cap: 25,
            sync_defer_delay: Duration::from_secs(3),
            rtp_read_buffer: 1500,
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_for_test_matches_documented_defaults() {
        let cfg = Config::default_for_test();
        assert_eq!(cfg.keyframe_interval, Duration::from_secs(3));
        assert_eq!(cfg.ping_interval, Duration::from_secs(30));
        assert_eq!(cfg.read_deadline, Duration::from_secs(60));
        assert_eq!(cfg.ping_write_deadline, Duration::from_secs(10));
        assert_eq!(cfg.sync_retry_cap, 25);
        assert_eq!(cfg.sync_defer_delay, Duration::from_secs(3));
        assert_eq!(cfg.rtp_read_buffer, 1500);
        assert!(!cfg.has_turn());
    }
}
