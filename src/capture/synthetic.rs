use std::time::Duration;

use tokio::sync::mpsc;
use tracing::info;

use super::source::{AudioFragment, CaptureSource, PacedProducer};
use crate::error::{Result, StreamError};

/// Generates fixed-size fragments at the slice cadence
///
/// Each fragment is filled with the low byte of its sequence number, which
/// makes ordering visible on the receiving side.
pub struct SyntheticCapture {
    fragment_bytes: usize,
    producer: Option<PacedProducer>,
}

impl SyntheticCapture {
    pub fn new(fragment_bytes: usize) -> Self {
        Self {
            fragment_bytes,
            producer: None,
        }
    }
}

#[async_trait::async_trait]
impl CaptureSource for SyntheticCapture {
    async fn acquire(&mut self, slice: Duration) -> Result<mpsc::Receiver<AudioFragment>> {
        if self.fragment_bytes == 0 {
            return Err(StreamError::DeviceUnavailable(
                "synthetic source configured with 0-byte fragments".to_string(),
            ));
        }
        self.release();

        info!(
            "Synthetic capture started ({} bytes every {}ms)",
            self.fragment_bytes,
            slice.as_millis()
        );

        let size = self.fragment_bytes;
        let chunks = (0u64..).map(move |sequence| vec![sequence as u8; size]);
        let (producer, rx) = PacedProducer::spawn("synthetic", chunks, slice)?;
        self.producer = Some(producer);

        Ok(rx)
    }

    fn release(&mut self) {
        if let Some(mut producer) = self.producer.take() {
            producer.stop();
            info!("Synthetic capture released");
        }
    }

    fn is_capturing(&self) -> bool {
        self.producer
            .as_ref()
            .map(PacedProducer::is_running)
            .unwrap_or(false)
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}
