use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Runtime configuration for a streaming client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// WebSocket endpoint of the streaming server
    pub server_url: String,

    /// Fixed delay before each reconnect attempt
    /// Default: 3 seconds
    pub reconnect_delay: Duration,

    /// Nominal capture cadence; governs protocol responsiveness, not quality
    /// Default: 100 milliseconds
    pub fragment_slice: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:8000/ws/".to_string(),
            reconnect_delay: Duration::from_secs(3),
            fragment_slice: Duration::from_millis(100),
        }
    }
}
