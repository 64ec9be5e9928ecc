use super::state::{AppState, StreamStatus};
use super::stream::StreamWriter;
use crate::protocol::ControlMessage;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Json},
};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tracing::{error, info, warn};

/// Every Nth chunk the server also reports its running tally
const CHUNK_TALLY_INTERVAL: u64 = 10;

// ============================================================================
// Handlers
// ============================================================================

/// GET /ws/
/// Upgrade to the streaming WebSocket
pub async fn stream_socket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// GET /streams
/// Recordings currently being written
pub async fn list_streams(State(state): State<AppState>) -> impl IntoResponse {
    let streams = state.streams.read().await;
    let mut active: Vec<StreamStatus> = streams.values().cloned().collect();
    active.sort_by(|a, b| a.started_at.cmp(&b.started_at));
    (StatusCode::OK, Json(active))
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

// ============================================================================
// Streaming connection
// ============================================================================

async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_id = uuid::Uuid::new_v4().to_string();
    info!("WebSocket connected: {}", connection_id);

    let (mut sender, mut receiver) = socket.split();

    let greeting = control(ControlMessage::Connected {
        connection_id: Some(connection_id.clone()),
        message: Some("Connected to WebSocket server".to_string()),
    });
    if let Err(e) = sender.send(Message::Text(greeting)).await {
        warn!("Failed to greet {}: {}", connection_id, e);
        return;
    }

    let mut connection = StreamConnection {
        connection_id,
        state,
        writer: None,
        recordings: 0,
    };

    'socket: while let Some(message) = receiver.next().await {
        let replies = match message {
            Ok(Message::Text(text)) => connection.on_text(&text).await,
            Ok(Message::Binary(data)) => connection.on_binary(&data).await,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                warn!("WebSocket error on {}: {}", connection.connection_id, e);
                break;
            }
        };

        for reply in replies {
            if let Err(e) = sender.send(Message::Text(reply)).await {
                warn!("Failed to reply on {}: {}", connection.connection_id, e);
                break 'socket;
            }
        }
    }

    connection.close().await;
}

/// Per-socket recording state
struct StreamConnection {
    connection_id: String,
    state: AppState,
    writer: Option<StreamWriter>,
    /// Recordings opened on this socket so far
    recordings: u64,
}

impl StreamConnection {
    async fn on_text(&mut self, text: &str) -> Vec<String> {
        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                warn!("Unparsable control frame on {}: {}", self.connection_id, e);
                return vec![error_reply(format!("Invalid control message: {}", e))];
            }
        };

        match value.get("type").and_then(Value::as_str) {
            Some("start_recording") => self.start_recording().await,
            Some("stop_recording") => self.stop_recording().await,
            _ => {
                info!("Received message on {}: {}", self.connection_id, text);
                vec![json!({
                    "type": "echo",
                    "message": format!("Server received: {}", text),
                    "original_message": text,
                })
                .to_string()]
            }
        }
    }

    async fn on_binary(&mut self, data: &[u8]) -> Vec<String> {
        let Some(writer) = self.writer.as_mut() else {
            warn!(
                "Binary frame without active recording on {}",
                self.connection_id
            );
            return vec![error_reply(
                "No active recording; send start_recording first".to_string(),
            )];
        };

        let bytes_received = match writer.append(data).await {
            Ok(len) => len,
            Err(e) => {
                error!("Failed to store chunk on {}: {:#}", self.connection_id, e);
                return vec![error_reply(format!("Failed to store audio chunk: {}", e))];
            }
        };
        let chunk_count = writer.chunk_count();
        let total_bytes = writer.bytes_received();

        if let Some(status) = self.state.streams.write().await.get_mut(&self.connection_id) {
            status.chunk_count = chunk_count;
            status.bytes_received = total_bytes;
        }

        let mut replies = vec![control(ControlMessage::ChunkAck { bytes_received })];
        if chunk_count % CHUNK_TALLY_INTERVAL == 0 {
            replies.push(control(ControlMessage::ChunkReceived { chunk_count }));
        }
        replies
    }

    async fn start_recording(&mut self) -> Vec<String> {
        if self.writer.is_some() {
            warn!(
                "start_recording while recording on {}; closing previous file",
                self.connection_id
            );
            self.finish_writer().await;
        }

        let recording = self.recordings + 1;
        let writer = match StreamWriter::create(
            &self.state.uploads_dir,
            &self.connection_id,
            recording,
        )
        .await
        {
            Ok(writer) => writer,
            Err(e) => {
                error!("Failed to open recording for {}: {:#}", self.connection_id, e);
                return vec![error_reply(format!("Failed to start recording: {}", e))];
            }
        };

        let filename = writer.filename().to_string();
        self.state.streams.write().await.insert(
            self.connection_id.clone(),
            StreamStatus {
                connection_id: self.connection_id.clone(),
                filename: filename.clone(),
                started_at: writer.started_at(),
                chunk_count: 0,
                bytes_received: 0,
            },
        );
        self.writer = Some(writer);
        self.recordings = recording;

        info!("Recording started on {}: {}", self.connection_id, filename);
        vec![
            control(ControlMessage::RecordingStarted),
            control(ControlMessage::StreamOpened { filename }),
        ]
    }

    async fn stop_recording(&mut self) -> Vec<String> {
        if self.writer.is_none() {
            return vec![error_reply("No active recording to stop".to_string())];
        }

        match self.finish_writer().await {
            Ok(()) => vec![control(ControlMessage::RecordingStopped)],
            Err(e) => vec![error_reply(format!("Failed to save recording: {}", e))],
        }
    }

    async fn finish_writer(&mut self) -> anyhow::Result<()> {
        self.state.streams.write().await.remove(&self.connection_id);
        match self.writer.take() {
            Some(writer) => writer.finish().await.map(|_| ()),
            None => Ok(()),
        }
    }

    async fn close(mut self) {
        if let Err(e) = self.finish_writer().await {
            error!("Failed to save recording for {}: {:#}", self.connection_id, e);
        }
        info!("WebSocket disconnected: {}", self.connection_id);
    }
}

fn control(message: ControlMessage) -> String {
    message.encode().unwrap_or_else(|e| {
        error!("Failed to encode {} reply: {}", message.kind(), e);
        json!({ "type": "error", "message": e.to_string() }).to_string()
    })
}

fn error_reply(message: String) -> String {
    control(ControlMessage::Error { message })
}
