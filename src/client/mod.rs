//! Client runtime: one dispatch loop over one event channel
//!
//! Socket tasks, the capture forwarder, the reconnect timer and user
//! commands only post [`ClientEvent`]s. The loop in [`StreamingClient::run`]
//! handles them one at a time, so connection and session state are never
//! touched concurrently.

mod dispatcher;
mod event;
mod handle;

pub use dispatcher::StreamingClient;
pub use event::{ClientEvent, Command, Notification, Snapshot};
pub use handle::ClientHandle;
