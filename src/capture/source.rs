use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use super::{FileCapture, SyntheticCapture};
use crate::error::{Result, StreamError};

/// Capacity of the fragment channel handed out by `acquire`
pub(crate) const FRAGMENT_CHANNEL_CAPACITY: usize = 256;

/// One captured slice of audio (opaque bytes)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFragment {
    /// Encoded audio bytes, forwarded untouched
    pub data: Vec<u8>,
    /// Production order, starting at 0 for every acquisition
    pub sequence: u64,
    /// Nominal offset since acquisition in milliseconds
    pub offset_ms: u64,
}

impl AudioFragment {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Audio capture source trait
///
/// Implementations:
/// - Synthetic: fixed-size generated fragments (stand-in for a device)
/// - File: an existing file streamed in slices
/// - Feed: fragments pushed by an external producer
#[async_trait::async_trait]
pub trait CaptureSource: Send {
    /// Start capturing
    ///
    /// Returns a receiver yielding fragments in production order, one per
    /// `slice`. Fails with `PermissionDenied` or `DeviceUnavailable`.
    async fn acquire(&mut self, slice: Duration) -> Result<mpsc::Receiver<AudioFragment>>;

    /// Stop capturing. Idempotent; the receiver ends once the producer stops.
    fn release(&mut self);

    /// Check if the source is currently capturing
    fn is_capturing(&self) -> bool;

    /// Source name for logging
    fn name(&self) -> &str;
}

/// Capture source type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureKind {
    /// Generated fragments of a fixed size
    Synthetic,
    /// Stream the bytes of an existing file
    File(PathBuf),
}

/// Capture source factory
pub struct CaptureSourceFactory;

impl CaptureSourceFactory {
    pub fn create(kind: CaptureKind, fragment_bytes: usize) -> Box<dyn CaptureSource> {
        match kind {
            CaptureKind::Synthetic => Box::new(SyntheticCapture::new(fragment_bytes)),
            CaptureKind::File(path) => Box::new(FileCapture::new(path, fragment_bytes)),
        }
    }
}

/// Producer task pushing one item per `slice` until exhausted or stopped
pub(crate) struct PacedProducer {
    stop_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl PacedProducer {
    /// Fails with `DeviceUnavailable` for a zero `slice`
    pub(crate) fn spawn<I>(
        name: &'static str,
        chunks: I,
        slice: Duration,
    ) -> Result<(Self, mpsc::Receiver<AudioFragment>)>
    where
        I: Iterator<Item = Vec<u8>> + Send + 'static,
    {
        if slice.is_zero() {
            return Err(StreamError::DeviceUnavailable(format!(
                "{} capture needs a non-zero fragment slice",
                name
            )));
        }

        let (tx, rx) = mpsc::channel(FRAGMENT_CHANNEL_CAPACITY);
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let slice_ms = slice.as_millis() as u64;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(slice);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately; fragments start one slice in.
            ticker.tick().await;

            for (sequence, data) in (0u64..).zip(chunks) {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {}
                }

                let fragment = AudioFragment {
                    data,
                    sequence,
                    offset_ms: (sequence + 1) * slice_ms,
                };
                if tx.send(fragment).await.is_err() {
                    break;
                }
            }

            debug!("{} producer stopped", name);
        });

        Ok((
            Self {
                stop_tx: Some(stop_tx),
                handle: Some(handle),
            },
            rx,
        ))
    }

    pub(crate) fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for PacedProducer {
    fn drop(&mut self) {
        self.stop();
    }
}
