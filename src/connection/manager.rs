use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::transport::{Connector, Link};
use crate::client::ClientEvent;
use crate::error::{Result, StreamError};
use crate::protocol::Frame;

/// Connectivity of the duplex channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        };
        f.write_str(text)
    }
}

/// Transition reported to the rest of the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected,
    Disconnected { reason: String },
}

/// Lifecycle events posted by channel tasks
///
/// `epoch` identifies the channel attempt; events from superseded attempts
/// are ignored.
#[derive(Debug)]
pub enum ChannelEvent {
    Opened {
        epoch: u64,
        outbound: mpsc::UnboundedSender<Frame>,
    },
    Frame {
        epoch: u64,
        frame: Frame,
    },
    Closed {
        epoch: u64,
        reason: String,
    },
    ReconnectDue,
}

/// Owns the channel handle and the connectivity state
///
/// Reconnection uses a fixed delay and never gives up.
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    events: mpsc::UnboundedSender<ClientEvent>,
    reconnect_delay: Duration,
    state: ConnectionState,
    epoch: u64,
    outbound: Option<mpsc::UnboundedSender<Frame>>,
    connection_id: Option<String>,
    reconnect_pending: bool,
    shut_down: bool,
    /// Loss detected by a failed `send`, not yet reported
    lost: Option<ConnectionEvent>,
}

impl ConnectionManager {
    pub fn new(
        connector: Arc<dyn Connector>,
        events: mpsc::UnboundedSender<ClientEvent>,
        reconnect_delay: Duration,
    ) -> Self {
        Self {
            connector,
            events,
            reconnect_delay,
            state: ConnectionState::Disconnected,
            epoch: 0,
            outbound: None,
            connection_id: None,
            reconnect_pending: false,
            shut_down: false,
            lost: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Identifier issued by the server in its `connection` frame
    pub fn connection_id(&self) -> Option<&str> {
        self.connection_id.as_deref()
    }

    pub fn set_connection_id(&mut self, connection_id: Option<String>) {
        self.connection_id = connection_id;
    }

    /// Open the channel unless one is already open or opening
    pub fn connect(&mut self) {
        if self.shut_down {
            debug!("Connect ignored: connection manager shut down");
            return;
        }
        if self.state != ConnectionState::Disconnected {
            debug!("Connect ignored: already {}", self.state);
            return;
        }

        self.reconnect_pending = false;
        self.epoch += 1;
        self.state = ConnectionState::Connecting;
        info!(
            "Connecting to {} (attempt epoch {})",
            self.connector.endpoint(),
            self.epoch
        );

        tokio::spawn(run_channel(
            Arc::clone(&self.connector),
            self.epoch,
            self.events.clone(),
        ));
    }

    /// Whether frames tagged with `epoch` belong to the current channel
    pub fn accepts(&self, epoch: u64) -> bool {
        !self.shut_down && epoch == self.epoch
    }

    pub fn on_opened(
        &mut self,
        epoch: u64,
        outbound: mpsc::UnboundedSender<Frame>,
    ) -> Option<ConnectionEvent> {
        if !self.accepts(epoch) {
            debug!("Dropping stale channel from epoch {}", epoch);
            return None;
        }

        self.outbound = Some(outbound);
        self.state = ConnectionState::Connected;
        info!("Connected to {}", self.connector.endpoint());
        Some(ConnectionEvent::Connected)
    }

    pub fn on_closed(&mut self, epoch: u64, reason: String) -> Option<ConnectionEvent> {
        if !self.accepts(epoch) {
            debug!("Ignoring close of stale channel from epoch {}", epoch);
            return None;
        }

        Some(self.close_channel(reason))
    }

    pub fn on_reconnect_due(&mut self) {
        self.reconnect_pending = false;
        if self.state == ConnectionState::Disconnected && !self.shut_down {
            info!("Reconnecting to {}", self.connector.endpoint());
            self.connect();
        }
    }

    /// Queue a frame on the live channel
    ///
    /// Fails with `NotConnected` (frame dropped) unless Connected. A channel
    /// that no longer takes frames is closed on the spot and the loss is
    /// left for [`ConnectionManager::take_lost`].
    pub fn send(&mut self, frame: Frame) -> Result<()> {
        if !self.is_connected() {
            return Err(StreamError::NotConnected);
        }

        let outbound = self.outbound.as_ref().ok_or(StreamError::NotConnected)?;
        if outbound.send(frame).is_ok() {
            return Ok(());
        }

        // Late frames and the close from the dead channel's reader are stale
        self.epoch += 1;
        let lost = self.close_channel("channel stopped accepting frames".to_string());
        self.lost = Some(lost);
        Err(StreamError::NotConnected)
    }

    /// Disconnect detected by `send` since the last call
    pub fn take_lost(&mut self) -> Option<ConnectionEvent> {
        self.lost.take()
    }

    /// Close the channel and stop reconnecting
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        self.lost = None;
        self.outbound = None;
        self.connection_id = None;
        self.state = ConnectionState::Disconnected;
        info!("Connection manager shut down");
    }

    fn close_channel(&mut self, reason: String) -> ConnectionEvent {
        self.outbound = None;
        self.connection_id = None;
        self.state = ConnectionState::Disconnected;
        warn!("Disconnected from {}: {}", self.connector.endpoint(), reason);

        self.schedule_reconnect();
        ConnectionEvent::Disconnected { reason }
    }

    fn schedule_reconnect(&mut self) {
        if self.shut_down || self.reconnect_pending {
            return;
        }
        self.reconnect_pending = true;

        let delay = self.reconnect_delay;
        let events = self.events.clone();
        info!("Reconnecting in {}ms", delay.as_millis());

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(ClientEvent::Channel(ChannelEvent::ReconnectDue));
        });
    }
}

/// Open one channel and pump its inbound frames until it closes
async fn run_channel(
    connector: Arc<dyn Connector>,
    epoch: u64,
    events: mpsc::UnboundedSender<ClientEvent>,
) {
    match connector.open().await {
        Ok(Link {
            outbound,
            mut inbound,
        }) => {
            let opened = ChannelEvent::Opened { epoch, outbound };
            if events.send(ClientEvent::Channel(opened)).is_err() {
                return;
            }

            while let Some(frame) = inbound.recv().await {
                let event = ChannelEvent::Frame { epoch, frame };
                if events.send(ClientEvent::Channel(event)).is_err() {
                    return;
                }
            }

            let closed = ChannelEvent::Closed {
                epoch,
                reason: "channel closed".to_string(),
            };
            let _ = events.send(ClientEvent::Channel(closed));
        }
        Err(e) => {
            warn!("Failed to open channel: {:#}", e);
            let closed = ChannelEvent::Closed {
                epoch,
                reason: format!("{:#}", e),
            };
            let _ = events.send(ClientEvent::Channel(closed));
        }
    }
}
