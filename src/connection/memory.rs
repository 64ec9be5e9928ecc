use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};
use tokio::sync::mpsc;
use tracing::debug;

use super::transport::{Connector, Link};
use crate::protocol::Frame;

/// In-process connector: every `open` hands a [`MemoryPeer`] to the paired
/// [`MemoryServer`]
pub struct MemoryConnector {
    accepting: Arc<AtomicBool>,
    peers: mpsc::UnboundedSender<MemoryPeer>,
}

/// Server side of a [`MemoryConnector`]
pub struct MemoryServer {
    accepting: Arc<AtomicBool>,
    peers: mpsc::UnboundedReceiver<MemoryPeer>,
}

/// Server end of one in-process channel
///
/// Dropping the peer closes the channel.
#[derive(Debug)]
pub struct MemoryPeer {
    /// Frames sent by the client
    pub from_client: mpsc::UnboundedReceiver<Frame>,
    /// Frames delivered to the client
    pub to_client: mpsc::UnboundedSender<Frame>,
}

impl MemoryConnector {
    pub fn pair() -> (Self, MemoryServer) {
        let accepting = Arc::new(AtomicBool::new(true));
        let (peers_tx, peers_rx) = mpsc::unbounded_channel();
        (
            Self {
                accepting: Arc::clone(&accepting),
                peers: peers_tx,
            },
            MemoryServer {
                accepting,
                peers: peers_rx,
            },
        )
    }
}

#[async_trait::async_trait]
impl Connector for MemoryConnector {
    async fn open(&self) -> Result<Link> {
        if !self.accepting.load(Ordering::SeqCst) {
            bail!("memory server is not accepting connections");
        }

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let peer = MemoryPeer {
            from_client: outbound_rx,
            to_client: inbound_tx,
        };
        if self.peers.send(peer).is_err() {
            bail!("memory server is gone");
        }

        debug!("Memory channel opened");
        Ok(Link {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }

    fn endpoint(&self) -> &str {
        "memory"
    }
}

impl MemoryServer {
    /// Wait for the next client channel
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.peers.recv().await
    }

    /// Refuse (or resume accepting) new channels
    pub fn set_accepting(&self, accepting: bool) {
        self.accepting.store(accepting, Ordering::SeqCst);
    }
}

impl MemoryPeer {
    /// Send a JSON text frame to the client
    pub fn send_json(&self, value: serde_json::Value) -> bool {
        self.to_client.send(Frame::Text(value.to_string())).is_ok()
    }

    /// Next frame from the client, `None` once the client side closed
    pub async fn recv(&mut self) -> Option<Frame> {
        self.from_client.recv().await
    }
}
