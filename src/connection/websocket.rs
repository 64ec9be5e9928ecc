use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::transport::{Connector, Link};
use crate::protocol::Frame;

/// WebSocket transport built on tokio-tungstenite
pub struct WebSocketConnector {
    url: String,
}

impl WebSocketConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait::async_trait]
impl Connector for WebSocketConnector {
    async fn open(&self) -> Result<Link> {
        info!("Connecting to WebSocket at {}", self.url);

        let (ws_stream, _response) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .with_context(|| format!("Failed to connect to {}", self.url))?;

        info!("WebSocket connected: {}", self.url);

        let (mut ws_sink, mut ws_stream) = ws_stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Frame>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<Frame>();

        // Writer: frames leave in the order they were queued
        tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                let message = match frame {
                    Frame::Text(text) => Message::Text(text),
                    Frame::Binary(bytes) => Message::Binary(bytes),
                };
                if let Err(e) = ws_sink.send(message).await {
                    warn!("WebSocket send failed: {}", e);
                    break;
                }
            }

            if let Err(e) = ws_sink.close().await {
                debug!("WebSocket close: {}", e);
            }
            debug!("WebSocket writer stopped");
        });

        // Reader: dropping inbound_tx signals the close
        tokio::spawn(async move {
            while let Some(message) = ws_stream.next().await {
                let frame = match message {
                    Ok(Message::Text(text)) => Frame::Text(text),
                    Ok(Message::Binary(bytes)) => Frame::Binary(bytes),
                    Ok(Message::Close(close)) => {
                        info!("WebSocket closed by server: {:?}", close);
                        break;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        warn!("WebSocket error: {}", e);
                        break;
                    }
                };

                if inbound_tx.send(frame).is_err() {
                    break;
                }
            }
            debug!("WebSocket reader stopped");
        });

        Ok(Link {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}
