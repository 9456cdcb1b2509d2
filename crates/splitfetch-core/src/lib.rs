pub mod config;
pub mod logging;

pub mod bandwidth;
pub mod control;
pub mod downloader;
pub mod events;
pub mod planner;
pub mod probe;
pub mod progress;
pub mod retry;
pub mod storage;
pub mod transport;
pub mod worker;

#[cfg(test)]
mod testing;

pub use bandwidth::{Bandwidth, BandwidthEstimator, BandwidthSample};
pub use control::CancelToken;
pub use downloader::{DownloadError, DownloadRequest, DownloadResult, Downloader};
pub use events::{DownloadEvent, DownloadObserver};
pub use planner::{plan, Range};
pub use probe::ResourceInfo;
pub use progress::{ProgressSnapshot, ProgressState};
pub use transport::{CurlTransport, HttpTransport, TransportError};
