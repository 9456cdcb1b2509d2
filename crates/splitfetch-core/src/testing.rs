//! In-memory transport for unit tests: serves one body and follows a script
//! of failures before falling back to normal behavior.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use crate::bandwidth::Bandwidth;
use crate::downloader::DownloadResult;
use crate::events::DownloadObserver;
use crate::progress::ProgressSnapshot;
use crate::transport::{ByteRange, HeadResponse, HttpTransport, TransportError};

#[derive(Debug, Clone, Copy)]
pub(crate) enum Step {
    /// Answer with this HTTP status (as an error).
    Status(u32),
    /// Stream this many bytes of the response, then drop the connection.
    CutAfter(usize),
    /// Behave normally.
    Serve,
}

pub(crate) struct ScriptedTransport {
    body: Vec<u8>,
    pub support_ranges: bool,
    pub advertise_ranges: bool,
    pub send_length: bool,
    /// Size of the chunks handed to the sink.
    pub chunk: usize,
    head_script: Mutex<VecDeque<Step>>,
    get_script: Mutex<VecDeque<Step>>,
    pub head_calls: Mutex<Vec<Option<ByteRange>>>,
    pub get_calls: Mutex<Vec<Option<ByteRange>>>,
}

impl ScriptedTransport {
    pub(crate) fn new(body: Vec<u8>) -> Self {
        Self {
            body,
            support_ranges: true,
            advertise_ranges: true,
            send_length: true,
            chunk: 1000,
            head_script: Mutex::new(VecDeque::new()),
            get_script: Mutex::new(VecDeque::new()),
            head_calls: Mutex::new(Vec::new()),
            get_calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn without_ranges(mut self) -> Self {
        self.support_ranges = false;
        self.advertise_ranges = false;
        self
    }

    pub(crate) fn script_head(self, steps: &[Step]) -> Self {
        self.head_script.lock().unwrap().extend(steps.iter().copied());
        self
    }

    pub(crate) fn script_get(self, steps: &[Step]) -> Self {
        self.get_script.lock().unwrap().extend(steps.iter().copied());
        self
    }

    pub(crate) fn head_count(&self) -> usize {
        self.head_calls.lock().unwrap().len()
    }

    pub(crate) fn get_count(&self) -> usize {
        self.get_calls.lock().unwrap().len()
    }

    fn slice_for(&self, range: Option<ByteRange>) -> (u32, &[u8]) {
        match range {
            Some(r) if self.support_ranges => {
                let start = (r.start as usize).min(self.body.len());
                let end = ((r.end + 1) as usize).min(self.body.len());
                (206, &self.body[start..end])
            }
            _ => (200, &self.body[..]),
        }
    }
}

impl HttpTransport for ScriptedTransport {
    fn head(
        &self,
        _url: &str,
        range: Option<ByteRange>,
        _timeout: Duration,
    ) -> Result<HeadResponse, TransportError> {
        self.head_calls.lock().unwrap().push(range);
        let step = self.head_script.lock().unwrap().pop_front().unwrap_or(Step::Serve);
        if let Step::Status(code) = step {
            return Err(TransportError::Http(code));
        }
        let (status, slice) = self.slice_for(range);
        Ok(HeadResponse {
            status,
            content_length: self.send_length.then_some(slice.len() as u64),
            accept_ranges: self.advertise_ranges,
        })
    }

    fn get(
        &self,
        _url: &str,
        range: Option<ByteRange>,
        _timeout: Duration,
        sink: &mut dyn FnMut(u32, &[u8]) -> bool,
    ) -> Result<u32, TransportError> {
        self.get_calls.lock().unwrap().push(range);
        let step = self.get_script.lock().unwrap().pop_front().unwrap_or(Step::Serve);
        let (status, slice) = self.slice_for(range);
        let limit = match step {
            Step::Status(code) => return Err(TransportError::Http(code)),
            Step::CutAfter(n) => n.min(slice.len()),
            Step::Serve => slice.len(),
        };
        for piece in slice[..limit].chunks(self.chunk.max(1)) {
            if !sink(status, piece) {
                return Ok(status);
            }
        }
        if limit < slice.len() {
            // CURLE_RECV_ERROR, as libcurl reports a reset connection
            return Err(TransportError::Curl(curl::Error::new(56)));
        }
        Ok(status)
    }
}

/// Deterministic test body.
pub(crate) fn body(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Observer that keeps every notification it receives.
#[derive(Default)]
pub(crate) struct Recorder {
    progress: Mutex<Vec<ProgressSnapshot>>,
    bandwidth: Mutex<Vec<Bandwidth>>,
    completed: Mutex<Vec<DownloadResult>>,
}

impl Recorder {
    pub(crate) fn progress(&self) -> Vec<ProgressSnapshot> {
        self.progress.lock().unwrap().clone()
    }

    pub(crate) fn bandwidth(&self) -> Vec<Bandwidth> {
        self.bandwidth.lock().unwrap().clone()
    }

    pub(crate) fn completed(&self) -> Vec<DownloadResult> {
        self.completed.lock().unwrap().clone()
    }
}

impl DownloadObserver for Recorder {
    fn progress_changed(&self, progress: &ProgressSnapshot) {
        self.progress.lock().unwrap().push(progress.clone());
    }

    fn bandwidth_measured(&self, bandwidth: &Bandwidth) {
        self.bandwidth.lock().unwrap().push(bandwidth.clone());
    }

    fn download_completed(&self, result: &DownloadResult) {
        self.completed.lock().unwrap().push(result.clone());
    }
}
