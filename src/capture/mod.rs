pub mod feed;
pub mod file;
pub mod source;
pub mod synthetic;

pub use feed::{FeedCapture, FragmentFeed};
pub use file::FileCapture;
pub use source::{AudioFragment, CaptureKind, CaptureSource, CaptureSourceFactory};
pub use synthetic::SyntheticCapture;
