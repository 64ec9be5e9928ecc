// Integration tests for the control-message wire format
//
// Frames below are what the streaming server actually sends.

use serde_json::{json, Value};
use voice_stream::{ControlMessage, ErrorKind, Frame};

#[test]
fn test_server_frames_decode() {
    let cases = vec![
        (
            json!({"type": "connection", "connection_id": "5f1c", "message": "Connected to WebSocket server"}),
            ControlMessage::Connected {
                connection_id: Some("5f1c".to_string()),
                message: Some("Connected to WebSocket server".to_string()),
            },
        ),
        (
            json!({"type": "recording_started", "message": "Recording started successfully"}),
            ControlMessage::RecordingStarted,
        ),
        (
            json!({"type": "audio_stream_started", "filename": "streaming_audio_20240101_120000_5f1c.webm"}),
            ControlMessage::StreamOpened {
                filename: "streaming_audio_20240101_120000_5f1c.webm".to_string(),
            },
        ),
        (
            json!({"type": "audio_chunk_confirmed", "bytes_received": 1600}),
            ControlMessage::ChunkAck {
                bytes_received: 1600,
            },
        ),
        (
            json!({"type": "audio_chunk_received", "chunk_count": 20, "message": "Received 20 audio chunks"}),
            ControlMessage::ChunkReceived { chunk_count: 20 },
        ),
        (
            json!({"type": "recording_stopped", "filename": "x.webm"}),
            ControlMessage::RecordingStopped,
        ),
        (
            json!({"type": "error", "message": "Failed to start recording"}),
            ControlMessage::Error {
                message: "Failed to start recording".to_string(),
            },
        ),
    ];

    for (value, expected) in cases {
        let decoded = ControlMessage::decode(&value.to_string()).unwrap();
        assert_eq!(decoded, expected, "decoding {}", value);
        assert_eq!(decoded.kind(), value["type"].as_str().unwrap());
    }
}

#[test]
fn test_echo_is_a_notice() {
    let text = json!({
        "type": "echo",
        "message": "Server received: ping",
        "original_message": "ping",
    })
    .to_string();

    match ControlMessage::decode(&text).unwrap() {
        ControlMessage::Notice { kind, message } => {
            assert_eq!(kind, "echo");
            assert_eq!(message.as_deref(), Some("Server received: ping"));
        }
        other => panic!("expected notice, got {:?}", other),
    }
}

#[test]
fn test_client_requests_are_text_frames() {
    for message in [ControlMessage::start_recording(), ControlMessage::stop_recording()] {
        let Frame::Text(text) = Frame::control(&message).unwrap() else {
            panic!("control messages travel as text");
        };
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], message.kind());
        assert!(value["timestamp"].is_string());
    }
}

#[test]
fn test_bad_frames_are_protocol_errors() {
    for text in ["", "[1, 2]", "{\"message\": \"no type\"}", "{\"type\": \"audio_chunk_confirmed\"}"] {
        let err = ControlMessage::decode(text).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol, "decoding {:?}", text);
    }
}
