//! Minimal HTTP/1.1 server for integration tests: HEAD, GET and `Range: bytes=a-b`.
//!
//! Serves one static body on every path. Each connection handles a single
//! request and is then closed.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RangeServerOptions {
    /// If false, GET ignores Range and always returns 200 with the full body.
    pub support_ranges: bool,
    /// If false, omit `Accept-Ranges: bytes` even if ranges work.
    pub advertise_ranges: bool,
    /// Answer every request with 404.
    pub not_found: bool,
    /// The first this-many GETs send half their body and hang up.
    pub cut_first_gets: usize,
}

impl Default for RangeServerOptions {
    fn default() -> Self {
        Self {
            support_ranges: true,
            advertise_ranges: true,
            not_found: false,
            cut_first_gets: 0,
        }
    }
}

#[derive(Debug, Default)]
pub struct ServerStats {
    pub heads: AtomicUsize,
    pub gets: AtomicUsize,
}

pub struct RangeServer {
    pub url: String,
    pub stats: Arc<ServerStats>,
}

/// Serve `body` from a background thread until the process exits.
pub fn start(body: Vec<u8>) -> RangeServer {
    start_with_options(body, RangeServerOptions::default())
}

pub fn start_with_options(body: Vec<u8>, opts: RangeServerOptions) -> RangeServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let body = Arc::new(body);
    let stats = Arc::new(ServerStats::default());
    let server_stats = Arc::clone(&stats);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let body = Arc::clone(&body);
            let stats = Arc::clone(&server_stats);
            thread::spawn(move || handle(stream, &body, opts, &stats));
        }
    });
    RangeServer {
        url: format!("http://127.0.0.1:{}/files/payload.bin", port),
        stats,
    }
}

fn handle(mut stream: TcpStream, body: &[u8], opts: RangeServerOptions, stats: &ServerStats) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => return,
    };
    let (method, range) = parse_request(request);
    let is_head = method.eq_ignore_ascii_case("HEAD");
    let get_number = if is_head {
        stats.heads.fetch_add(1, Ordering::SeqCst);
        0
    } else if method.eq_ignore_ascii_case("GET") {
        stats.gets.fetch_add(1, Ordering::SeqCst) + 1
    } else {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\n\r\n");
        return;
    };

    if opts.not_found {
        let _ = stream.write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n");
        return;
    }

    let total = body.len() as u64;
    let accept_ranges = if opts.advertise_ranges && opts.support_ranges {
        "Accept-Ranges: bytes\r\n"
    } else {
        ""
    };
    let (status, content_range, slice) = match range {
        Some((start, end_incl)) if opts.support_ranges => {
            let end_incl = end_incl.min(total.saturating_sub(1));
            if start > end_incl || start >= total {
                (
                    "416 Range Not Satisfiable",
                    format!("Content-Range: bytes */{}\r\n", total),
                    &body[0..0],
                )
            } else {
                (
                    "206 Partial Content",
                    format!("Content-Range: bytes {}-{}/{}\r\n", start, end_incl, total),
                    &body[start as usize..=end_incl as usize],
                )
            }
        }
        _ => ("200 OK", String::new(), body),
    };

    let response = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\n{}{}Connection: close\r\n\r\n",
        status,
        slice.len(),
        content_range,
        accept_ranges
    );
    let _ = stream.write_all(response.as_bytes());
    if is_head {
        return;
    }

    if get_number <= opts.cut_first_gets {
        let _ = stream.write_all(&slice[..slice.len() / 2]);
        let _ = stream.flush();
        return;
    }
    let _ = stream.write_all(slice);
}

/// Returns (method, optional (start, end_inclusive) for `Range: bytes=X-Y`).
fn parse_request(request: &str) -> (&str, Option<(u64, u64)>) {
    let mut method = "";
    let mut range = None;
    for line in request.lines() {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if method.is_empty() {
            method = line.split_whitespace().next().unwrap_or("");
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            if !name.trim().eq_ignore_ascii_case("range") {
                continue;
            }
            let value = value.trim();
            if let Some(part) = value.strip_prefix("bytes=") {
                if let Some((a, b)) = part.split_once('-') {
                    let start = a.trim().parse::<u64>().unwrap_or(0);
                    let end = b.trim();
                    let end_incl = if end.is_empty() {
                        u64::MAX
                    } else {
                        end.parse::<u64>().unwrap_or(0)
                    };
                    range = Some((start, end_incl));
                }
            }
        }
    }
    (method, range)
}
