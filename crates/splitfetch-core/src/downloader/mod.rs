//! Download engine: probe, plan, fetch ranges in parallel, assemble.
//!
//! A `Downloader` owns one transport, one subscriber set and one cancel
//! token. Each call to `download` is an independent transfer with its own
//! progress state, samplers and worker pool; all of them are joined before
//! the call returns.

mod run;

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use serde::Serialize;

use crate::config::EngineSettings;
use crate::control::CancelToken;
use crate::events::{DownloadObserver, Observers};
use crate::planner::{plan, resolve_parallelism};
use crate::probe::{probe, ResourceInfo};
use crate::progress::ProgressState;
use crate::storage::assemble;
use crate::transport::{CurlTransport, HttpTransport};
use crate::worker::WorkerContext;

/// File name used when the URL has no usable last path segment.
pub const DEFAULT_FILE_NAME: &str = "download.bin";

/// Parameters of one transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    /// Defaults to the URL's last path segment in the working directory.
    pub destination: Option<PathBuf>,
    /// Number of ranges; zero or negative means one per CPU.
    pub parallelism: i64,
    /// When false, TLS verification is switched off on this downloader's
    /// transport for this and every later request.
    pub validate_tls: bool,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            destination: None,
            parallelism: 0,
            validate_tls: true,
        }
    }

    pub fn destination(mut self, path: impl Into<PathBuf>) -> Self {
        self.destination = Some(path.into());
        self
    }

    pub fn parallelism(mut self, n: i64) -> Self {
        self.parallelism = n;
        self
    }

    pub fn validate_tls(mut self, validate: bool) -> Self {
        self.validate_tls = validate;
        self
    }
}

/// Outcome of a transfer that ran to the end (possibly short).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadResult {
    pub file_url: String,
    pub file_path: PathBuf,
    pub file_exists: bool,
    /// Bytes actually captured, summed over ranges. Less than
    /// `file_length` when a range ran out of attempts.
    pub bytes_downloaded: u64,
    pub file_length: u64,
    /// Milliseconds from the end of planning to the end of assembly. Zero
    /// when nothing was transferred.
    pub time_taken_ms: u64,
    pub parallel_downloads: usize,
}

impl DownloadResult {
    pub fn is_complete(&self) -> bool {
        self.file_exists && self.bytes_downloaded == self.file_length
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("{url} has zero length, nothing to download")]
    EmptyResource { url: String },
    #[error("failed to write download: {0:#}")]
    Storage(anyhow::Error),
    #[error("download cancelled")]
    Cancelled,
}

struct Inner {
    transport: Arc<dyn HttpTransport>,
    settings: EngineSettings,
    observers: Observers,
    cancel: CancelToken,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Cheap to clone; clones share transport, subscribers and cancellation.
#[derive(Clone)]
pub struct Downloader {
    inner: Arc<Inner>,
}

impl Downloader {
    /// Downloader over libcurl.
    pub fn new(settings: EngineSettings) -> Self {
        let transport = CurlTransport::new().with_buffer_size(settings.block_size);
        Self::with_transport(Arc::new(transport), settings)
    }

    pub fn with_transport(transport: Arc<dyn HttpTransport>, settings: EngineSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                settings,
                observers: Observers::new(),
                cancel: CancelToken::new(),
            }),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.inner.settings
    }

    /// Add an observer for every transfer of this downloader.
    pub fn subscribe(&self, observer: Arc<dyn DownloadObserver>) {
        self.inner.observers.subscribe(observer);
    }

    /// Switch off TLS verification for every later request of this downloader.
    pub fn disable_tls_validation(&self) {
        self.inner.transport.disable_tls_validation();
    }

    pub fn probe(&self, url: &str) -> ResourceInfo {
        let inner = &self.inner;
        probe(inner.transport.as_ref(), url, &inner.settings, &inner.cancel)
    }

    /// Probe `request.url` and download it to the destination.
    ///
    /// A missing resource is not an error: the result has `file_exists =
    /// false` and no GET is issued. Ranges that run out of attempts make the
    /// result short instead of failing the call.
    pub fn download(&self, request: &DownloadRequest) -> Result<DownloadResult, DownloadError> {
        let inner = &self.inner;
        if !request.validate_tls {
            self.disable_tls_validation();
        }

        let info = self.probe(&request.url);
        if inner.cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }
        let file_path = request
            .destination
            .clone()
            .unwrap_or_else(|| default_file_name(&request.url));

        if !info.exists {
            tracing::info!(url = %request.url, "resource not found, nothing downloaded");
            let result = DownloadResult {
                file_url: request.url.clone(),
                file_path,
                file_exists: false,
                bytes_downloaded: 0,
                file_length: 0,
                time_taken_ms: 0,
                parallel_downloads: 0,
            };
            inner.observers.download_completed(&result);
            return Ok(result);
        }

        let mut ranges = plan(&info, resolve_parallelism(request.parallelism));
        if ranges.is_empty() {
            return Err(DownloadError::EmptyResource {
                url: request.url.clone(),
            });
        }
        tracing::info!(
            url = %info.url,
            length = info.length,
            supports_range = info.supports_range,
            ranges = ranges.len(),
            "download started"
        );

        // Probe time is not transfer time: both the result and the
        // bandwidth windows are measured from here.
        let started = Instant::now();
        let state = ProgressState::new(&info.url, info.length);
        let ctx = WorkerContext {
            transport: inner.transport.as_ref(),
            info: &info,
            settings: &inner.settings,
            progress: &state,
            cancel: &inner.cancel,
        };
        let summary = run::run_ranges(ctx, &inner.observers, &state, started, &mut ranges);

        if inner.cancel.is_cancelled() {
            tracing::info!(url = %info.url, "download cancelled");
            return Err(DownloadError::Cancelled);
        }
        if summary.exhausted > 0 {
            tracing::warn!(
                url = %info.url,
                exhausted = summary.exhausted,
                ranges = ranges.len(),
                "some ranges did not complete, file will be short"
            );
        }

        assemble(&file_path, &ranges).map_err(DownloadError::Storage)?;

        let result = DownloadResult {
            file_url: info.url.clone(),
            file_path,
            file_exists: true,
            bytes_downloaded: ranges.iter().map(|r| r.filled).sum(),
            file_length: info.length,
            time_taken_ms: elapsed_ms(started),
            parallel_downloads: ranges.len(),
        };
        tracing::info!(
            url = %result.file_url,
            path = %result.file_path.display(),
            bytes = result.bytes_downloaded,
            ms = result.time_taken_ms,
            "download finished"
        );
        inner.observers.download_completed(&result);
        Ok(result)
    }

    /// Run `download` on a background thread.
    pub fn download_async(
        &self,
        request: DownloadRequest,
    ) -> JoinHandle<Result<DownloadResult, DownloadError>> {
        let this = self.clone();
        std::thread::spawn(move || this.download(&request))
    }

    /// Stop every transfer of this downloader at its next block or retry boundary.
    pub fn shutdown(&self) {
        tracing::info!("downloader shutting down");
        self.inner.cancel.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }
}

impl std::fmt::Debug for Downloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Downloader")
            .field("settings", &self.inner.settings)
            .field("observers", &self.inner.observers)
            .field("cancel", &self.inner.cancel)
            .finish()
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

/// Last non-empty path segment of `url`, or `download.bin`.
pub fn default_file_name(url: &str) -> PathBuf {
    url::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back())
                .filter(|name| !name.is_empty())
                .map(str::to_string)
        })
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_FILE_NAME))
}
