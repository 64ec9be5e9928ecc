//! Wire protocol spoken over the duplex channel
//!
//! Control messages travel as JSON text frames tagged by `type`. Audio
//! travels as raw binary frames: the frame boundary is the fragment boundary.

pub mod frame;
pub mod messages;

pub use frame::Frame;
pub use messages::ControlMessage;
