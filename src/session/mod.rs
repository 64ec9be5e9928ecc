//! Streaming session management
//!
//! This module provides the `StreamingSession` state machine that manages:
//! - Arming and disarming a recording against the live channel
//! - Forwarding captured fragments in production order
//! - Ack counters for the active recording
//! - Aborting the recording when the channel drops

mod config;
mod recording;
mod session;

pub use config::SessionConfig;
pub use recording::{RecordingSession, SessionSummary};
pub use session::{ArmOutcome, SessionState, StreamingSession};
