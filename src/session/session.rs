use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::config::SessionConfig;
use super::recording::{RecordingSession, SessionSummary};
use crate::capture::{AudioFragment, CaptureSource};
use crate::client::ClientEvent;
use crate::connection::ConnectionManager;
use crate::error::{Result, StreamError};
use crate::protocol::{ControlMessage, Frame};

/// Recording state of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    /// Recording requested, capture not yet granted
    Armed,
    Streaming,
}

/// Result of a successful `arm`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArmOutcome {
    Started { session_token: String },
    /// A recording was already active; nothing changed
    AlreadyActive,
}

/// The protocol core: turns arm/disarm into a control + binary exchange
pub struct StreamingSession {
    /// Capture source, acquired per recording
    capture: Box<dyn CaptureSource>,

    /// Cadence requested from the capture source
    slice: Duration,

    /// Dispatch loop inbox, fed by the fragment forwarder
    events: mpsc::UnboundedSender<ClientEvent>,

    state: SessionState,

    /// Current (or last finished) recording; counters survive until the next arm
    recording: Option<RecordingSession>,

    /// Bumped on every arm so fragments from an earlier capture are dropped
    generation: u64,

    /// Task moving fragments from the capture source into the dispatch loop
    forwarder: Option<JoinHandle<()>>,
}

impl StreamingSession {
    pub fn new(
        config: &SessionConfig,
        capture: Box<dyn CaptureSource>,
        events: mpsc::UnboundedSender<ClientEvent>,
    ) -> Self {
        Self {
            capture,
            slice: config.fragment_slice,
            events,
            state: SessionState::Idle,
            recording: None,
            generation: 0,
            forwarder: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state != SessionState::Idle
    }

    pub fn recording(&self) -> Option<&RecordingSession> {
        self.recording.as_ref()
    }

    /// Start a new recording
    ///
    /// A channel that turns out to be gone while sending `start_recording`
    /// is reported as `ChannelUnavailable`, like arming while disconnected.
    pub async fn arm(&mut self, connection: &mut ConnectionManager) -> Result<ArmOutcome> {
        if self.state != SessionState::Idle {
            warn!("Recording already active");
            return Ok(ArmOutcome::AlreadyActive);
        }

        if !connection.is_connected() {
            warn!("Cannot start recording: channel is {}", connection.state());
            return Err(StreamError::ChannelUnavailable);
        }

        self.state = SessionState::Armed;
        info!("Acquiring {} capture source", self.capture.name());

        let fragments = match self.capture.acquire(self.slice).await {
            Ok(fragments) => fragments,
            Err(e) => {
                error!("Failed to acquire capture source: {}", e);
                self.state = SessionState::Idle;
                return Err(e);
            }
        };

        let recording = RecordingSession::new();
        let started = Frame::control(&ControlMessage::start_recording())
            .and_then(|frame| connection.send(frame));

        if let Err(e) = started {
            error!("Failed to send start_recording: {}", e);
            self.capture.release();
            self.state = SessionState::Idle;
            return Err(match e {
                StreamError::NotConnected => StreamError::ChannelUnavailable,
                other => other,
            });
        }

        self.generation += 1;
        self.forwarder = Some(spawn_forwarder(
            self.generation,
            fragments,
            self.events.clone(),
        ));

        let session_token = recording.session_token.clone();
        self.recording = Some(recording);
        self.state = SessionState::Streaming;

        info!(
            "Recording started: {} ({}ms slices)",
            session_token,
            self.slice.as_millis()
        );

        Ok(ArmOutcome::Started { session_token })
    }

    /// Forward one captured fragment as a raw binary frame
    ///
    /// A failed send aborts the recording as if the channel had dropped.
    pub fn on_fragment(
        &mut self,
        connection: &mut ConnectionManager,
        generation: u64,
        fragment: AudioFragment,
    ) -> Result<()> {
        if self.state != SessionState::Streaming || generation != self.generation {
            debug!(
                "Dropping fragment {} outside the active recording",
                fragment.sequence
            );
            return Ok(());
        }

        let sequence = fragment.sequence;
        let len = fragment.len();

        match connection.send(Frame::Binary(fragment.data)) {
            Ok(()) => {
                if let Some(recording) = self.recording.as_mut() {
                    recording.record_forwarded();
                }
                debug!("Forwarded fragment {} ({} bytes)", sequence, len);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to forward fragment {}: {}", sequence, e);
                self.abort();
                Err(e)
            }
        }
    }

    /// Apply a server ack; correlation is by arrival order only
    pub fn on_ack(&mut self, bytes_received: u64) {
        match self.recording.as_mut() {
            Some(recording) => {
                recording.record_ack(bytes_received);
                debug!(
                    "Ack: {} chunks, {} bytes",
                    recording.chunk_count, recording.bytes_sent
                );
            }
            None => debug!("Ignoring ack with no recording"),
        }
    }

    /// The capture source stopped producing on its own
    ///
    /// Returns true when the ended stream belonged to the active recording.
    pub fn on_capture_ended(&mut self, generation: u64) -> bool {
        if self.state == SessionState::Streaming && generation == self.generation {
            info!("Capture source {} exhausted", self.capture.name());
            self.forwarder = None;
            return true;
        }
        false
    }

    /// Stop the active recording
    ///
    /// No-op (returns `None`) when idle.
    pub fn disarm(&mut self, connection: &mut ConnectionManager) -> Option<SessionSummary> {
        if self.state == SessionState::Idle {
            debug!("Disarm ignored: no active recording");
            return None;
        }

        let stopped = Frame::control(&ControlMessage::stop_recording())
            .and_then(|frame| connection.send(frame));
        if let Err(e) = stopped {
            warn!("Failed to send stop_recording: {}", e);
        }

        self.release_capture();
        self.state = SessionState::Idle;

        let summary = self.recording.as_ref()?.summary(Utc::now(), false);
        info!(
            "Recording stopped after {:.2}s ({} chunks, {} bytes)",
            summary.duration_secs, summary.chunk_count, summary.bytes_sent
        );
        Some(summary)
    }

    /// The channel dropped: end the recording without a stop message
    pub fn on_connection_lost(&mut self) -> Option<SessionSummary> {
        if self.state == SessionState::Idle {
            return None;
        }
        self.abort()
    }

    fn abort(&mut self) -> Option<SessionSummary> {
        self.release_capture();
        self.state = SessionState::Idle;

        let summary = self.recording.as_ref()?.summary(Utc::now(), true);
        warn!(
            "Recording {} aborted after {:.2}s ({} chunks, {} bytes)",
            summary.session_token, summary.duration_secs, summary.chunk_count, summary.bytes_sent
        );
        Some(summary)
    }

    fn release_capture(&mut self) {
        self.capture.release();
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
    }
}

impl Drop for StreamingSession {
    fn drop(&mut self) {
        self.release_capture();
    }
}

fn spawn_forwarder(
    generation: u64,
    mut fragments: mpsc::Receiver<AudioFragment>,
    events: mpsc::UnboundedSender<ClientEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(fragment) = fragments.recv().await {
            if events
                .send(ClientEvent::Fragment {
                    generation,
                    fragment,
                })
                .is_err()
            {
                return;
            }
        }
        let _ = events.send(ClientEvent::CaptureEnded { generation });
    })
}
