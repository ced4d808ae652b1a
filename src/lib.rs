pub mod activity;
pub mod config;
pub mod queue;
pub mod sampler;
pub mod session;
pub mod store;

pub use activity::ActiveGuard;
pub use queue::{DownloadItem, DownloadStatus};
pub use sampler::{DEFAULT_SAMPLE_THRESHOLD, ProgressWriter};
pub use store::{DownloadQueueInfo, DownloadStore, ProgressInfo};
