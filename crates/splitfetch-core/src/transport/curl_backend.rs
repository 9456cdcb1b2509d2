//! libcurl-backed transport: one `Easy` handle per request.

use std::cell::Cell;
use std::str;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use curl::easy::Easy;

use super::parse::{parse_headers, parse_status_line};
use super::{ByteRange, HeadResponse, HttpTransport, TransportError};

fn is_success(code: u32) -> bool {
    (200..300).contains(&code)
}

/// Production transport. Builds a new curl handle for every call with DNS
/// caching and connection reuse disabled.
#[derive(Debug, Default)]
pub struct CurlTransport {
    insecure: AtomicBool,
    buffer_size: Option<usize>,
}

impl CurlTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask libcurl to deliver body data in chunks of at most `size` bytes.
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = Some(size);
        self
    }

    fn configure(
        &self,
        easy: &mut Easy,
        url: &str,
        range: Option<ByteRange>,
        timeout: Duration,
    ) -> Result<(), curl::Error> {
        easy.url(url)?;
        easy.follow_location(true)?;
        easy.max_redirections(10)?;
        // Re-resolve and reconnect on every attempt.
        easy.fresh_connect(true)?;
        easy.forbid_reuse(true)?;
        easy.dns_cache_timeout(Duration::from_secs(0))?;
        easy.connect_timeout(timeout)?;
        // Read timeout: abort when nothing arrives for `timeout`.
        easy.low_speed_limit(1)?;
        easy.low_speed_time(timeout)?;
        if let Some(sz) = self.buffer_size {
            easy.buffer_size(sz)?;
        }
        if self.insecure.load(Ordering::Relaxed) {
            easy.ssl_verify_peer(false)?;
            easy.ssl_verify_host(false)?;
        }
        if let Some(r) = range {
            easy.range(&r.curl_spec())?;
        }
        Ok(())
    }
}

impl HttpTransport for CurlTransport {
    fn head(
        &self,
        url: &str,
        range: Option<ByteRange>,
        timeout: Duration,
    ) -> Result<HeadResponse, TransportError> {
        let mut headers: Vec<String> = Vec::new();

        let mut easy = Easy::new();
        self.configure(&mut easy, url, range, timeout)?;
        easy.nobody(true)?;
        easy.timeout(timeout)?;

        {
            let mut transfer = easy.transfer();
            transfer.header_function(|data| {
                if let Ok(s) = str::from_utf8(data) {
                    headers.push(s.trim_end().to_string());
                }
                true
            })?;
            transfer.perform()?;
        }

        let code = easy.response_code()?;
        if !is_success(code) {
            return Err(TransportError::Http(code));
        }

        let mut response = parse_headers(&headers);
        response.status = code;
        Ok(response)
    }

    fn get(
        &self,
        url: &str,
        range: Option<ByteRange>,
        timeout: Duration,
        sink: &mut dyn FnMut(u32, &[u8]) -> bool,
    ) -> Result<u32, TransportError> {
        let status = Cell::new(0u32);
        let stopped = Cell::new(false);
        let rejected = Cell::new(false);

        let mut easy = Easy::new();
        self.configure(&mut easy, url, range, timeout)?;

        let perform_result = {
            let mut transfer = easy.transfer();
            transfer.header_function(|data| {
                if let Some(code) = str::from_utf8(data).ok().and_then(parse_status_line) {
                    status.set(code);
                }
                true
            })?;
            transfer.write_function(|data| {
                if !is_success(status.get()) {
                    rejected.set(true);
                    return Ok(0);
                }
                if sink(status.get(), data) {
                    Ok(data.len())
                } else {
                    stopped.set(true);
                    Ok(0)
                }
            })?;
            transfer.perform()
        };

        let code = easy.response_code().unwrap_or_else(|_| status.get());
        match perform_result {
            Err(e) if e.is_write_error() && stopped.get() => Ok(code),
            Err(e) if e.is_write_error() && rejected.get() => Err(TransportError::Http(code)),
            Err(e) => Err(TransportError::Curl(e)),
            Ok(()) if !is_success(code) => Err(TransportError::Http(code)),
            Ok(()) => Ok(code),
        }
    }

    fn disable_tls_validation(&self) {
        if !self.insecure.swap(true, Ordering::Relaxed) {
            tracing::warn!("TLS certificate validation disabled for this downloader");
        }
    }
}
