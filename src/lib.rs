pub mod capture;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod http;
pub mod protocol;
pub mod session;
pub mod status;

pub use capture::{
    AudioFragment, CaptureKind, CaptureSource, CaptureSourceFactory, FeedCapture, FileCapture,
    FragmentFeed, SyntheticCapture,
};
pub use client::{ClientHandle, Notification, Snapshot, StreamingClient};
pub use config::Config;
pub use connection::{
    ConnectionManager, ConnectionState, Connector, MemoryConnector, WebSocketConnector,
};
pub use error::{ErrorKind, Result, StreamError};
pub use http::{create_router, AppState};
pub use protocol::{ControlMessage, Frame};
pub use session::{
    ArmOutcome, RecordingSession, SessionConfig, SessionState, SessionSummary, StreamingSession,
};
