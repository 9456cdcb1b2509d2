//! Caller-facing notifications.
//!
//! A downloader owns one subscriber set. Progress and bandwidth
//! notifications come from the two sampler threads of each transfer; the
//! completion notification comes from the thread that ran the transfer.
//! Observers are called synchronously and should return quickly.

use std::sync::{Arc, PoisonError, RwLock};

use crate::bandwidth::Bandwidth;
use crate::downloader::DownloadResult;
use crate::progress::ProgressSnapshot;

/// Owned form of a notification, for channel-based consumers.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadEvent {
    Progress(ProgressSnapshot),
    Bandwidth(Bandwidth),
    Completed(DownloadResult),
}

/// Receives notifications for every transfer of the downloader it is subscribed to.
pub trait DownloadObserver: Send + Sync {
    fn progress_changed(&self, _progress: &ProgressSnapshot) {}

    fn bandwidth_measured(&self, _bandwidth: &Bandwidth) {}

    fn download_completed(&self, _result: &DownloadResult) {}
}

/// Forwards notifications into a tokio channel. Uses `try_send`: when the
/// receiver lags, progress and bandwidth events are dropped rather than
/// stalling the engine threads.
impl DownloadObserver for tokio::sync::mpsc::Sender<DownloadEvent> {
    fn progress_changed(&self, progress: &ProgressSnapshot) {
        let _ = self.try_send(DownloadEvent::Progress(progress.clone()));
    }

    fn bandwidth_measured(&self, bandwidth: &Bandwidth) {
        let _ = self.try_send(DownloadEvent::Bandwidth(bandwidth.clone()));
    }

    fn download_completed(&self, result: &DownloadResult) {
        if self.try_send(DownloadEvent::Completed(result.clone())).is_err() {
            tracing::warn!(url = %result.file_url, "completion event dropped: channel full or closed");
        }
    }
}

/// Subscriber set of one downloader.
#[derive(Clone, Default)]
pub struct Observers {
    inner: Arc<RwLock<Vec<Arc<dyn DownloadObserver>>>>,
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, observer: Arc<dyn DownloadObserver>) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn each(&self, f: impl Fn(&dyn DownloadObserver)) {
        let observers = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        for o in observers.iter() {
            f(o.as_ref());
        }
    }

    pub fn progress_changed(&self, progress: &ProgressSnapshot) {
        self.each(|o| o.progress_changed(progress));
    }

    pub fn bandwidth_measured(&self, bandwidth: &Bandwidth) {
        self.each(|o| o.bandwidth_measured(bandwidth));
    }

    pub fn download_completed(&self, result: &DownloadResult) {
        self.each(|o| o.download_completed(result));
    }
}

impl std::fmt::Debug for Observers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers").field("len", &self.len()).finish()
    }
}
