use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::source::{AudioFragment, CaptureSource, FRAGMENT_CHANNEL_CAPACITY};
use crate::error::{Result, StreamError};

#[derive(Default)]
struct FeedSlot {
    tx: Option<mpsc::Sender<AudioFragment>>,
    next_sequence: u64,
    started: Option<Instant>,
}

fn lock(slot: &Mutex<FeedSlot>) -> MutexGuard<'_, FeedSlot> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Capture source fed by an external producer
///
/// A device adapter (or a test) pushes fragments through the paired
/// [`FragmentFeed`]. The producer owns the cadence; pushes made while the
/// source is not acquired are dropped.
pub struct FeedCapture {
    slot: Arc<Mutex<FeedSlot>>,
    failure: Option<StreamError>,
}

/// Producer half of a [`FeedCapture`]
#[derive(Clone)]
pub struct FragmentFeed {
    slot: Arc<Mutex<FeedSlot>>,
}

impl FeedCapture {
    pub fn new() -> (Self, FragmentFeed) {
        let slot = Arc::new(Mutex::new(FeedSlot::default()));
        (
            Self {
                slot: Arc::clone(&slot),
                failure: None,
            },
            FragmentFeed { slot },
        )
    }

    /// A source whose every acquisition fails with `failure`
    pub fn failing(failure: StreamError) -> (Self, FragmentFeed) {
        let (mut capture, feed) = Self::new();
        capture.failure = Some(failure);
        (capture, feed)
    }
}

#[async_trait::async_trait]
impl CaptureSource for FeedCapture {
    async fn acquire(&mut self, _slice: Duration) -> Result<mpsc::Receiver<AudioFragment>> {
        if let Some(failure) = &self.failure {
            warn!("Feed capture refused: {}", failure);
            return Err(failure.clone());
        }

        let (tx, rx) = mpsc::channel(FRAGMENT_CHANNEL_CAPACITY);
        let mut slot = lock(&self.slot);
        slot.tx = Some(tx);
        slot.next_sequence = 0;
        slot.started = Some(Instant::now());

        info!("Feed capture acquired");
        Ok(rx)
    }

    fn release(&mut self) {
        let mut slot = lock(&self.slot);
        if slot.tx.take().is_some() {
            slot.started = None;
            info!("Feed capture released");
        }
    }

    fn is_capturing(&self) -> bool {
        lock(&self.slot).tx.is_some()
    }

    fn name(&self) -> &str {
        "feed"
    }
}

impl FragmentFeed {
    /// Push the next fragment
    ///
    /// Returns `false` when the source is not acquired or the consumer is
    /// gone; the fragment is dropped in that case.
    pub fn push(&self, data: impl Into<Vec<u8>>) -> bool {
        let mut slot = lock(&self.slot);
        let sequence = slot.next_sequence;
        let offset_ms = slot
            .started
            .map(|started| started.elapsed().as_millis() as u64)
            .unwrap_or(0);

        let Some(tx) = slot.tx.as_ref() else {
            debug!("Feed push dropped: capture not acquired");
            return false;
        };

        let fragment = AudioFragment {
            data: data.into(),
            sequence,
            offset_ms,
        };
        match tx.try_send(fragment) {
            Ok(()) => {
                slot.next_sequence += 1;
                true
            }
            Err(e) => {
                warn!("Feed push dropped: {}", e);
                false
            }
        }
    }

    /// Whether the paired source is currently acquired
    pub fn is_acquired(&self) -> bool {
        lock(&self.slot).tx.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn test_push_before_acquire_is_dropped() {
        let (mut capture, feed) = FeedCapture::new();
        assert!(!feed.push(vec![1, 2, 3]));

        let mut rx = capture.acquire(Duration::from_millis(100)).await.unwrap();
        assert!(feed.push(vec![4, 5]));

        let fragment = rx.recv().await.unwrap();
        assert_eq!(fragment.data, vec![4, 5]);
        assert_eq!(fragment.sequence, 0);
    }

    #[tokio::test]
    async fn test_release_ends_stream() {
        let (mut capture, feed) = FeedCapture::new();
        let mut rx = capture.acquire(Duration::from_millis(100)).await.unwrap();
        assert!(feed.is_acquired());

        capture.release();
        capture.release();

        assert!(!feed.is_acquired());
        assert!(!feed.push(vec![0]));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_failing_source() {
        let (mut capture, feed) =
            FeedCapture::failing(StreamError::PermissionDenied("microphone".to_string()));

        let err = capture.acquire(Duration::from_millis(100)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        assert!(!feed.is_acquired());
    }
}
