use super::messages::ControlMessage;
use crate::error::Result;

/// A single frame on the duplex channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Structured control message (JSON)
    Text(String),
    /// Raw audio fragment, no envelope
    Binary(Vec<u8>),
}

impl Frame {
    /// Encode a control message as a text frame
    pub fn control(message: &ControlMessage) -> Result<Self> {
        Ok(Frame::Text(message.encode()?))
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, Frame::Binary(_))
    }
}
