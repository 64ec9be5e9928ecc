//! Human-readable status line derived from client state

use chrono::{DateTime, Utc};

use crate::connection::ConnectionState;
use crate::session::RecordingSession;

/// Render the status line
///
/// Pure: the same inputs always give the same text.
pub fn project(
    connection: ConnectionState,
    recording: Option<&RecordingSession>,
    is_recording: bool,
    now: DateTime<Utc>,
) -> String {
    let chunks = recording.map(|r| r.chunk_count).unwrap_or(0);
    let kib = recording.map(|r| r.bytes_sent).unwrap_or(0) as f64 / 1024.0;

    if is_recording {
        let secs = recording.map(|r| r.elapsed_secs(now)).unwrap_or(0.0);
        format!(
            "Recording... {:.1}s | Chunks: {} | Bytes: {:.1}KB",
            secs, chunks, kib
        )
    } else if connection == ConnectionState::Connected {
        format!(
            "Connected to WebSocket | Ready to record | Total chunks: {} | Total bytes: {:.1}KB",
            chunks, kib
        )
    } else {
        "Connecting to WebSocket...".to_string()
    }
}
