use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, StreamError};

/// `type` tags this client understands
const KNOWN_TYPES: &[&str] = &[
    "connection",
    "start_recording",
    "recording_started",
    "stop_recording",
    "recording_stopped",
    "audio_stream_started",
    "audio_chunk_received",
    "audio_chunk_confirmed",
    "error",
];

/// Control message exchanged as a JSON text frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControlMessage {
    /// Server greeting after the channel opens
    #[serde(rename = "connection")]
    Connected {
        #[serde(default)]
        connection_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// Client asks the server to open a new recording
    #[serde(rename = "start_recording")]
    StartRecording { timestamp: DateTime<Utc> },

    #[serde(rename = "recording_started")]
    RecordingStarted,

    /// Client asks the server to close the current recording
    #[serde(rename = "stop_recording")]
    StopRecording { timestamp: DateTime<Utc> },

    #[serde(rename = "recording_stopped")]
    RecordingStopped,

    /// Server created the file backing the stream
    #[serde(rename = "audio_stream_started")]
    StreamOpened { filename: String },

    /// Periodic server-side chunk tally
    #[serde(rename = "audio_chunk_received")]
    ChunkReceived { chunk_count: u64 },

    /// Per-fragment acknowledgement, correlated by arrival order only
    #[serde(rename = "audio_chunk_confirmed")]
    ChunkAck { bytes_received: u64 },

    #[serde(rename = "error")]
    Error { message: String },

    /// Any server frame with an unrecognised `type`
    #[serde(skip)]
    Notice { kind: String, message: Option<String> },
}

impl ControlMessage {
    pub fn start_recording() -> Self {
        ControlMessage::StartRecording { timestamp: Utc::now() }
    }

    pub fn stop_recording() -> Self {
        ControlMessage::StopRecording { timestamp: Utc::now() }
    }

    /// Tag used on the wire
    pub fn kind(&self) -> &str {
        match self {
            ControlMessage::Connected { .. } => "connection",
            ControlMessage::StartRecording { .. } => "start_recording",
            ControlMessage::RecordingStarted => "recording_started",
            ControlMessage::StopRecording { .. } => "stop_recording",
            ControlMessage::RecordingStopped => "recording_stopped",
            ControlMessage::StreamOpened { .. } => "audio_stream_started",
            ControlMessage::ChunkReceived { .. } => "audio_chunk_received",
            ControlMessage::ChunkAck { .. } => "audio_chunk_confirmed",
            ControlMessage::Error { .. } => "error",
            ControlMessage::Notice { kind, .. } => kind,
        }
    }

    /// Serialize to JSON text
    pub fn encode(&self) -> Result<String> {
        if let ControlMessage::Notice { .. } = self {
            return Err(StreamError::Protocol(
                "notices are inbound only and cannot be encoded".to_string(),
            ));
        }
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a JSON text frame
    ///
    /// A well-formed object with an unknown `type` becomes a [`ControlMessage::Notice`];
    /// anything else that fails to parse is a protocol error.
    pub fn decode(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;

        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| StreamError::Protocol("frame has no string `type` field".to_string()))?
            .to_string();

        if !KNOWN_TYPES.contains(&kind.as_str()) {
            let message = value
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string);
            return Ok(ControlMessage::Notice { kind, message });
        }

        serde_json::from_value(value)
            .map_err(|e| StreamError::Protocol(format!("malformed `{}` frame: {}", kind, e)))
    }
}
