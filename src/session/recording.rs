use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Counters for one armed recording
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingSession {
    /// Opaque token identifying this recording
    pub session_token: String,

    /// When the recording was armed
    pub started_at: DateTime<Utc>,

    /// Number of acknowledged fragments
    pub chunk_count: u64,

    /// Bytes the server confirmed
    pub bytes_sent: u64,

    /// Fragments handed to the channel
    pub fragments_forwarded: u64,
}

/// Final numbers reported when a recording ends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_token: String,
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub chunk_count: u64,
    pub bytes_sent: u64,
    pub fragments_forwarded: u64,
    /// True when the recording ended because the channel dropped
    pub aborted: bool,
}

impl RecordingSession {
    pub fn new() -> Self {
        Self::started_at(Utc::now())
    }

    pub fn started_at(started_at: DateTime<Utc>) -> Self {
        Self {
            session_token: uuid::Uuid::new_v4().to_string(),
            started_at,
            chunk_count: 0,
            bytes_sent: 0,
            fragments_forwarded: 0,
        }
    }

    /// Apply one server ack
    pub fn record_ack(&mut self, bytes_received: u64) {
        self.chunk_count = self.chunk_count.saturating_add(1);
        self.bytes_sent = self.bytes_sent.saturating_add(bytes_received);
    }

    pub fn record_forwarded(&mut self) {
        self.fragments_forwarded = self.fragments_forwarded.saturating_add(1);
    }

    /// Seconds since `started_at`, never negative
    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> f64 {
        let elapsed = now.signed_duration_since(self.started_at);
        (elapsed.num_milliseconds() as f64 / 1000.0).max(0.0)
    }

    pub fn summary(&self, now: DateTime<Utc>, aborted: bool) -> SessionSummary {
        SessionSummary {
            session_token: self.session_token.clone(),
            started_at: self.started_at,
            duration_secs: self.elapsed_secs(now),
            chunk_count: self.chunk_count,
            bytes_sent: self.bytes_sent,
            fragments_forwarded: self.fragments_forwarded,
            aborted,
        }
    }
}

impl Default for RecordingSession {
    fn default() -> Self {
        Self::new()
    }
}
