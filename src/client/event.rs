use tokio::sync::oneshot;

use crate::capture::AudioFragment;
use crate::connection::{ChannelEvent, ConnectionState};
use crate::error::Result;
use crate::session::{ArmOutcome, RecordingSession, SessionState, SessionSummary};

/// Everything the dispatch loop reacts to
#[derive(Debug)]
pub enum ClientEvent {
    /// Channel lifecycle and inbound frames
    Channel(ChannelEvent),
    /// A captured fragment, tagged with the recording that produced it
    Fragment {
        generation: u64,
        fragment: AudioFragment,
    },
    /// The capture source stopped producing
    CaptureEnded { generation: u64 },
}

/// User requests from a [`super::ClientHandle`], answered through a oneshot
#[derive(Debug)]
pub enum Command {
    Arm(oneshot::Sender<Result<ArmOutcome>>),
    Disarm(oneshot::Sender<Option<SessionSummary>>),
    Snapshot(oneshot::Sender<Snapshot>),
    Shutdown,
}

/// Messages for whoever renders the client (CLI, UI)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Informational line from the client or the server
    System(String),
    /// Something went wrong; the client keeps running
    Error(String),
    /// Recomputed status line
    Status(String),
}

/// Point-in-time view of the client
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub connection: ConnectionState,
    pub connection_id: Option<String>,
    pub session: SessionState,
    pub recording: Option<RecordingSession>,
    pub status: String,
}

