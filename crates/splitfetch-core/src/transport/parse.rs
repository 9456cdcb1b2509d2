//! Parse HTTP response header lines into a `HeadResponse`.

use super::HeadResponse;

/// Status code from a status line such as `HTTP/1.1 206 Partial Content`.
pub(crate) fn parse_status_line(line: &str) -> Option<u32> {
    let line = line.trim();
    if !line.starts_with("HTTP/") {
        return None;
    }
    line.split_whitespace().nth(1)?.parse::<u32>().ok()
}

/// Parse collected header lines. When redirects were followed the lines of
/// several responses are present; only the last response counts.
pub(crate) fn parse_headers(lines: &[String]) -> HeadResponse {
    let mut status = 0;
    let mut content_length = None;
    let mut accept_ranges = false;

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(code) = parse_status_line(line) {
            status = code;
            content_length = None;
            accept_ranges = false;
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            let value = value.trim();
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.parse::<u64>().ok();
            }
            if name.eq_ignore_ascii_case("accept-ranges") {
                accept_ranges = value.eq_ignore_ascii_case("bytes");
            }
        }
    }

    HeadResponse {
        status,
        content_length,
        accept_ranges,
    }
}
