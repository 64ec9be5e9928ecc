use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::event::{ClientEvent, Command, Notification, Snapshot};
use super::handle::ClientHandle;
use crate::capture::CaptureSource;
use crate::connection::{ChannelEvent, ConnectionEvent, ConnectionManager, Connector};
use crate::protocol::{ControlMessage, Frame};
use crate::session::{ArmOutcome, SessionConfig, StreamingSession};
use crate::status;

/// Streaming client: connection manager + streaming session + dispatch loop
pub struct StreamingClient {
    connection: ConnectionManager,
    session: StreamingSession,
    events: mpsc::UnboundedReceiver<ClientEvent>,
    /// Closes once every [`ClientHandle`] is dropped
    commands: mpsc::UnboundedReceiver<Command>,
    notifications: mpsc::UnboundedSender<Notification>,
}

impl StreamingClient {
    pub fn new(
        config: &SessionConfig,
        connector: Arc<dyn Connector>,
        capture: Box<dyn CaptureSource>,
    ) -> (Self, ClientHandle, mpsc::UnboundedReceiver<Notification>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (notifications_tx, notifications_rx) = mpsc::unbounded_channel();

        let connection =
            ConnectionManager::new(connector, events_tx.clone(), config.reconnect_delay);
        let session = StreamingSession::new(config, capture, events_tx.clone());

        let client = Self {
            connection,
            session,
            events: events_rx,
            commands: commands_rx,
            notifications: notifications_tx,
        };

        (client, ClientHandle::new(commands_tx), notifications_rx)
    }

    /// Build the client and run its loop on a background task
    pub fn spawn(
        config: &SessionConfig,
        connector: Arc<dyn Connector>,
        capture: Box<dyn CaptureSource>,
    ) -> (
        ClientHandle,
        mpsc::UnboundedReceiver<Notification>,
        JoinHandle<()>,
    ) {
        let (client, handle, notifications) = Self::new(config, connector, capture);
        let task = tokio::spawn(client.run());
        (handle, notifications, task)
    }

    /// Connect and process events until shut down or every handle is gone
    pub async fn run(mut self) {
        info!("Streaming client started");

        self.connection.connect();
        self.publish_status();

        loop {
            let running = tokio::select! {
                Some(event) = self.events.recv() => {
                    self.handle_event(event);
                    true
                }
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => {
                        info!("All client handles dropped");
                        self.stop();
                        false
                    }
                },
            };
            if !running {
                break;
            }
            self.report_lost_channel();
        }

        info!("Streaming client stopped");
    }

    /// Handle one event to completion
    fn handle_event(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::Channel(event) => self.handle_channel(event),

            ClientEvent::Fragment {
                generation,
                fragment,
            } => {
                if let Err(e) = self
                    .session
                    .on_fragment(&mut self.connection, generation, fragment)
                {
                    self.notify(Notification::Error(format!(
                        "Recording stopped: {}",
                        e
                    )));
                    self.publish_status();
                }
            }

            ClientEvent::CaptureEnded { generation } => {
                if self.session.on_capture_ended(generation) {
                    self.notify(Notification::System(
                        "Capture source finished producing audio".to_string(),
                    ));
                }
            }
        }
    }

    fn handle_channel(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Opened { epoch, outbound } => {
                if let Some(transition) = self.connection.on_opened(epoch, outbound) {
                    self.on_transition(transition);
                }
            }
            ChannelEvent::Frame { epoch, frame } => {
                if self.connection.accepts(epoch) {
                    self.dispatch_frame(frame);
                }
            }
            ChannelEvent::Closed { epoch, reason } => {
                if let Some(transition) = self.connection.on_closed(epoch, reason) {
                    self.on_transition(transition);
                }
            }
            ChannelEvent::ReconnectDue => {
                self.connection.on_reconnect_due();
                self.publish_status();
            }
        }
    }

    async fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Arm(reply) => {
                let result = self.session.arm(&mut self.connection).await;
                match &result {
                    Ok(ArmOutcome::Started { .. }) => {
                        self.notify(Notification::System("Started recording...".to_string()))
                    }
                    Ok(ArmOutcome::AlreadyActive) => {}
                    Err(e) => self.notify(Notification::Error(e.to_string())),
                }
                let _ = reply.send(result);
                self.publish_status();
            }

            Command::Disarm(reply) => {
                let summary = self.session.disarm(&mut self.connection);
                if let Some(summary) = &summary {
                    self.notify(Notification::System(format!(
                        "Stopped recording after {:.2}s",
                        summary.duration_secs
                    )));
                }
                let _ = reply.send(summary);
                self.publish_status();
            }

            Command::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }

            Command::Shutdown => {
                self.stop();
                return false;
            }
        }

        true
    }

    fn stop(&mut self) {
        self.session.disarm(&mut self.connection);
        self.connection.shutdown();
        self.publish_status();
    }

    /// A send found the channel dead: report it like a close
    fn report_lost_channel(&mut self) {
        if let Some(transition) = self.connection.take_lost() {
            self.on_transition(transition);
        }
    }

    /// Connectivity changed: the session reacts before anything else runs
    fn on_transition(&mut self, transition: ConnectionEvent) {
        match transition {
            ConnectionEvent::Connected => {
                debug!("Channel connected");
            }
            ConnectionEvent::Disconnected { reason } => {
                if let Some(summary) = self.session.on_connection_lost() {
                    self.notify(Notification::Error(format!(
                        "Connection lost ({}); recording stopped after {:.2}s",
                        reason, summary.duration_secs
                    )));
                }
            }
        }
        self.publish_status();
    }

    fn dispatch_frame(&mut self, frame: Frame) {
        match frame {
            Frame::Text(text) => match ControlMessage::decode(&text) {
                Ok(message) => self.dispatch_control(message),
                Err(e) => warn!("Ignoring inbound frame: {}", e),
            },
            Frame::Binary(bytes) => {
                debug!("Ignoring {} byte binary frame from server", bytes.len());
            }
        }
    }

    fn dispatch_control(&mut self, message: ControlMessage) {
        match message {
            ControlMessage::Connected { connection_id, .. } => {
                let label = connection_id.as_deref().unwrap_or("unknown").to_string();
                self.connection.set_connection_id(connection_id);
                self.notify(Notification::System(format!(
                    "Connected to server (ID: {})",
                    label
                )));
            }
            ControlMessage::RecordingStarted => self.notify(Notification::System(
                "Recording started - sending audio chunks...".to_string(),
            )),
            ControlMessage::RecordingStopped => self.notify(Notification::System(
                "Recording stopped - file saved successfully".to_string(),
            )),
            ControlMessage::StreamOpened { filename } => self.notify(Notification::System(
                format!("Audio file created: {}", filename),
            )),
            ControlMessage::ChunkReceived { chunk_count } => self.notify(Notification::System(
                format!("Received {} audio chunks", chunk_count),
            )),
            ControlMessage::ChunkAck { bytes_received } => {
                self.session.on_ack(bytes_received);
                self.publish_status();
            }
            ControlMessage::Error { message } => self.notify(Notification::Error(message)),
            ControlMessage::Notice { kind, message } => {
                self.notify(Notification::System(message.unwrap_or(kind)))
            }
            ControlMessage::StartRecording { .. } | ControlMessage::StopRecording { .. } => {
                warn!("Ignoring client-only `{}` frame from server", message.kind());
            }
        }
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            connection: self.connection.state(),
            connection_id: self.connection.connection_id().map(str::to_string),
            session: self.session.state(),
            recording: self.session.recording().cloned(),
            status: self.status_line(),
        }
    }

    fn status_line(&self) -> String {
        status::project(
            self.connection.state(),
            self.session.recording(),
            self.session.is_recording(),
            Utc::now(),
        )
    }

    fn publish_status(&self) {
        self.notify(Notification::Status(self.status_line()));
    }

    fn notify(&self, notification: Notification) {
        // Nobody listening is fine
        let _ = self.notifications.send(notification);
    }
}
