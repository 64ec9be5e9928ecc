use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::info;

use super::source::{AudioFragment, CaptureSource, PacedProducer};
use crate::error::{Result, StreamError};

/// Streams an existing audio file in fixed-size slices
///
/// The fragment sequence ends when the file is exhausted.
pub struct FileCapture {
    path: PathBuf,
    fragment_bytes: usize,
    producer: Option<PacedProducer>,
}

impl FileCapture {
    pub fn new(path: impl Into<PathBuf>, fragment_bytes: usize) -> Self {
        Self {
            path: path.into(),
            fragment_bytes: fragment_bytes.max(1),
            producer: None,
        }
    }
}

fn map_open_error(path: &Path, e: io::Error) -> StreamError {
    let detail = format!("{}: {}", path.display(), e);
    match e.kind() {
        io::ErrorKind::PermissionDenied => StreamError::PermissionDenied(detail),
        _ => StreamError::DeviceUnavailable(detail),
    }
}

#[async_trait::async_trait]
impl CaptureSource for FileCapture {
    async fn acquire(&mut self, slice: Duration) -> Result<mpsc::Receiver<AudioFragment>> {
        let data = tokio::fs::read(&self.path)
            .await
            .map_err(|e| map_open_error(&self.path, e))?;
        self.release();

        info!(
            "File capture started: {} ({} bytes, {} byte slices)",
            self.path.display(),
            data.len(),
            self.fragment_bytes
        );

        let chunks: Vec<Vec<u8>> = data
            .chunks(self.fragment_bytes)
            .map(<[u8]>::to_vec)
            .collect();
        let (producer, rx) = PacedProducer::spawn("file", chunks.into_iter(), slice)?;
        self.producer = Some(producer);

        Ok(rx)
    }

    fn release(&mut self) {
        if let Some(mut producer) = self.producer.take() {
            producer.stop();
            info!("File capture released: {}", self.path.display());
        }
    }

    fn is_capturing(&self) -> bool {
        self.producer
            .as_ref()
            .map(PacedProducer::is_running)
            .unwrap_or(false)
    }

    fn name(&self) -> &str {
        "file"
    }
}
