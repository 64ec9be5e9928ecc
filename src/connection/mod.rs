//! Duplex channel lifecycle
//!
//! The [`ConnectionManager`] owns connectivity state and the write half of
//! the live channel. Opening, reading and closing happen in background
//! tasks that only post [`ChannelEvent`]s back to the dispatch loop.

pub mod manager;
pub mod memory;
pub mod transport;
pub mod websocket;

pub use manager::{ChannelEvent, ConnectionEvent, ConnectionManager, ConnectionState};
pub use memory::{MemoryConnector, MemoryPeer, MemoryServer};
pub use transport::{Connector, Link};
pub use websocket::WebSocketConnector;
