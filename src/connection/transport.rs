use anyhow::Result;
use tokio::sync::mpsc;

use crate::protocol::Frame;

/// An open duplex channel
///
/// Dropping `outbound` closes the channel from our side. `inbound` ends
/// when the peer closes or the transport fails.
#[derive(Debug)]
pub struct Link {
    pub outbound: mpsc::UnboundedSender<Frame>,
    pub inbound: mpsc::UnboundedReceiver<Frame>,
}

/// Opens duplex channels to the server
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    /// Open a new channel
    async fn open(&self) -> Result<Link>;

    /// Endpoint description for logging
    fn endpoint(&self) -> &str;
}
