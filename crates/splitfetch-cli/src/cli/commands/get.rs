//! `splitfetch get` – download URLs, each on its own background transfer.

use anyhow::{Context, Result};
use splitfetch_core::config::{EngineSettings, SplitfetchConfig};
use splitfetch_core::downloader::default_file_name;
use splitfetch_core::{DownloadEvent, DownloadRequest, DownloadResult, Downloader};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Minimum gap between two bandwidth lines for the same URL.
const BANDWIDTH_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Default)]
pub struct GetOptions {
    pub parallel: Option<i64>,
    pub output: Option<PathBuf>,
    pub insecure: bool,
    pub json: bool,
}

/// Certificates are checked unless the config or `--insecure` says otherwise.
pub fn tls_validation(cfg: &SplitfetchConfig, insecure: bool) -> bool {
    cfg.validate_tls && !insecure
}

/// One destination per URL, rejected up front when two transfers would
/// write the same file.
pub fn destinations(urls: &[String], output: Option<&Path>) -> Result<Vec<PathBuf>> {
    if let Some(path) = output {
        if urls.len() > 1 {
            anyhow::bail!("--output can only be used with a single URL");
        }
        return Ok(urls.iter().map(|_| path.to_path_buf()).collect());
    }
    let mut seen = HashSet::new();
    let mut paths = Vec::with_capacity(urls.len());
    for url in urls {
        let path = default_file_name(url);
        if !seen.insert(path.clone()) {
            anyhow::bail!(
                "{} would be saved as {}, which another URL already uses; download it separately with --output",
                url,
                path.display()
            );
        }
        paths.push(path);
    }
    Ok(paths)
}

pub async fn run_get(cfg: &SplitfetchConfig, urls: Vec<String>, opts: GetOptions) -> Result<()> {
    let paths = destinations(&urls, opts.output.as_deref())?;

    let downloader = Downloader::new(EngineSettings::from(cfg));
    let (events_tx, events_rx) = tokio::sync::mpsc::channel::<DownloadEvent>(256);
    downloader.subscribe(Arc::new(events_tx));
    let printer = tokio::spawn(print_events(events_rx));

    let interrupt = {
        let d = downloader.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("interrupted, stopping downloads");
                d.shutdown();
            }
        })
    };

    let parallelism = opts.parallel.unwrap_or(cfg.default_parallelism);
    let validate_tls = tls_validation(cfg, opts.insecure);
    let transfers: Vec<_> = urls
        .iter()
        .zip(paths)
        .map(|(url, path)| {
            let request = DownloadRequest::new(url.as_str())
                .destination(path)
                .parallelism(parallelism)
                .validate_tls(validate_tls);
            let d = downloader.clone();
            tokio::task::spawn_blocking(move || d.download(&request))
        })
        .collect();

    let mut failures = 0usize;
    for (url, transfer) in urls.iter().zip(transfers) {
        let outcome = transfer.await.context("download task failed")?;
        match outcome {
            Ok(result) => {
                report(&result, opts.json)?;
                if !result.is_complete() {
                    failures += 1;
                }
            }
            Err(e) => {
                eprintln!("{}: {}", url, e);
                failures += 1;
            }
        }
    }

    // Release every handle so the event channel closes and the printer ends.
    interrupt.abort();
    let _ = interrupt.await;
    drop(downloader);
    let _ = printer.await;

    if failures > 0 {
        anyhow::bail!("{} of {} downloads did not complete", failures, urls.len());
    }
    Ok(())
}

fn report(result: &DownloadResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(result)?);
        return Ok(());
    }
    if !result.file_exists {
        println!("{}: not found", result.file_url);
        return Ok(());
    }
    let secs = result.time_taken_ms as f64 / 1000.0;
    println!(
        "{}: {} of {} bytes -> {} in {:.1}s ({} ranges){}",
        result.file_url,
        result.bytes_downloaded,
        result.file_length,
        result.file_path.display(),
        secs,
        result.parallel_downloads,
        if result.is_complete() { "" } else { " INCOMPLETE" }
    );
    Ok(())
}

/// Progress at each whole percent, bandwidth at most once per interval.
async fn print_events(mut rx: tokio::sync::mpsc::Receiver<DownloadEvent>) {
    let mut last_percent: HashMap<String, u64> = HashMap::new();
    let mut last_bandwidth: HashMap<String, Instant> = HashMap::new();

    while let Some(event) = rx.recv().await {
        match event {
            DownloadEvent::Progress(p) => {
                let percent = (p.fraction() * 100.0).floor() as u64;
                let seen = last_percent.get(&p.file_url).copied();
                if seen.map_or(true, |s| percent > s) {
                    eprintln!("{}: {}%", p.file_url, percent);
                    last_percent.insert(p.file_url, percent);
                }
            }
            DownloadEvent::Bandwidth(bw) => {
                let now = Instant::now();
                let due = last_bandwidth
                    .get(&bw.file_url)
                    .map_or(true, |t| now.duration_since(*t) >= BANDWIDTH_INTERVAL);
                if due {
                    let eta = bw
                        .remaining
                        .map(|s| format!("{}s", s))
                        .unwrap_or_else(|| "?".to_string());
                    eprintln!(
                        "{}: {:.2} MiB/s (5s {:.2}, 1m {:.2})  ETA {}",
                        bw.file_url,
                        mib(bw.mean_1s),
                        mib(bw.mean_5s),
                        mib(bw.mean_1m),
                        eta
                    );
                    last_bandwidth.insert(bw.file_url, now);
                }
            }
            DownloadEvent::Completed(result) => {
                tracing::debug!(url = %result.file_url, "transfer finished");
                last_percent.remove(&result.file_url);
                last_bandwidth.remove(&result.file_url);
            }
        }
    }
}

fn mib(bytes_per_sec: u64) -> f64 {
    bytes_per_sec as f64 / 1_048_576.0
}
