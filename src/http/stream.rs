use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::info;

/// Appends streamed fragments to a file in the uploads directory
pub struct StreamWriter {
    writer: BufWriter<File>,
    path: PathBuf,
    filename: String,
    started_at: DateTime<Utc>,
    chunk_count: u64,
    bytes_received: u64,
}

impl StreamWriter {
    /// Create `streaming_audio_<unix_ms>_<id8>_<recording>.webm` under `dir`
    ///
    /// `recording` numbers the recordings of one connection. An existing
    /// file is never overwritten.
    pub async fn create(dir: &Path, connection_id: &str, recording: u64) -> Result<Self> {
        fs::create_dir_all(dir)
            .await
            .context("Failed to create uploads directory")?;

        let started_at = Utc::now();
        let short_id: String = connection_id.chars().take(8).collect();
        let filename = format!(
            "streaming_audio_{}_{}_{}.webm",
            started_at.timestamp_millis(),
            short_id,
            recording
        );
        let path = dir.join(&filename);

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .with_context(|| format!("Failed to create {}", path.display()))?;

        info!("Streaming into {}", path.display());

        Ok(Self {
            writer: BufWriter::new(file),
            path,
            filename,
            started_at,
            chunk_count: 0,
            bytes_received: 0,
        })
    }

    /// Append one fragment; returns its size
    pub async fn append(&mut self, data: &[u8]) -> Result<u64> {
        self.writer
            .write_all(data)
            .await
            .context("Failed to write audio chunk")?;

        let len = data.len() as u64;
        self.chunk_count += 1;
        self.bytes_received += len;
        Ok(len)
    }

    /// Flush and close the file
    pub async fn finish(mut self) -> Result<PathBuf> {
        self.writer
            .flush()
            .await
            .context("Failed to flush audio file")?;

        info!(
            "Stream saved: {} ({} chunks, {} bytes)",
            self.path.display(),
            self.chunk_count,
            self.bytes_received
        );
        Ok(self.path)
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn chunk_count(&self) -> u64 {
        self.chunk_count
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }
}
