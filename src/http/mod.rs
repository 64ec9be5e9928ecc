//! Reference streaming server
//!
//! The server half of the streaming protocol, used by the CLI `serve`
//! command and by integration tests:
//! - GET /ws/ - WebSocket streaming endpoint
//! - GET /streams - Recordings currently being written
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;
mod stream;

pub use routes::create_router;
pub use state::{AppState, StreamStatus};
pub use stream::StreamWriter;
