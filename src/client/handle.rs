use tokio::sync::{mpsc, oneshot};

use super::event::{Command, Snapshot};
use crate::error::{Result, StreamError};
use crate::session::{ArmOutcome, SessionSummary};

/// Cloneable handle posting commands into a running [`super::StreamingClient`]
///
/// Dropping the last handle shuts the client down.
#[derive(Clone)]
pub struct ClientHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl ClientHandle {
    pub(crate) fn new(commands: mpsc::UnboundedSender<Command>) -> Self {
        Self { commands }
    }

    /// Start recording
    ///
    /// A stopped client reports `ChannelUnavailable`.
    pub async fn arm(&self) -> Result<ArmOutcome> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if !self.post(Command::Arm(reply_tx)) {
            return Err(StreamError::ChannelUnavailable);
        }
        reply_rx.await.map_err(|_| StreamError::ChannelUnavailable)?
    }

    /// Stop recording; `None` when nothing was recording
    pub async fn disarm(&self) -> Option<SessionSummary> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if !self.post(Command::Disarm(reply_tx)) {
            return None;
        }
        reply_rx.await.ok().flatten()
    }

    /// Current state; `None` once the client has stopped
    pub async fn snapshot(&self) -> Option<Snapshot> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if !self.post(Command::Snapshot(reply_tx)) {
            return None;
        }
        reply_rx.await.ok()
    }

    /// Stop any recording, close the channel and end the dispatch loop
    pub fn shutdown(&self) {
        self.post(Command::Shutdown);
    }

    /// False when the dispatch loop is gone
    fn post(&self, command: Command) -> bool {
        self.commands.send(command).is_ok()
    }
}
