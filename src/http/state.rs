use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Progress of one recording being written
#[derive(Debug, Clone, Serialize)]
pub struct StreamStatus {
    pub connection_id: String,
    pub filename: String,
    pub started_at: DateTime<Utc>,
    pub chunk_count: u64,
    pub bytes_received: u64,
}

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Directory receiving streamed recordings
    pub uploads_dir: Arc<PathBuf>,

    /// Active recordings (connection_id → status)
    pub streams: Arc<RwLock<HashMap<String, StreamStatus>>>,
}

impl AppState {
    pub fn new(uploads_dir: impl Into<PathBuf>) -> Self {
        Self {
            uploads_dir: Arc::new(uploads_dir.into()),
            streams: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new("uploads")
    }
}
