//! `splitfetch probe` – report what the server says about a URL.

use anyhow::{Context, Result};
use splitfetch_core::config::{EngineSettings, SplitfetchConfig};
use splitfetch_core::Downloader;

pub async fn run_probe(cfg: &SplitfetchConfig, url: String) -> Result<()> {
    let downloader = Downloader::new(EngineSettings::from(cfg));
    if !cfg.validate_tls {
        downloader.disable_tls_validation();
    }
    let info = tokio::task::spawn_blocking(move || downloader.probe(&url))
        .await
        .context("probe task failed")?;

    if !info.exists {
        anyhow::bail!("{} does not exist or is unreachable", info.url);
    }
    println!("url:            {}", info.url);
    println!("length:         {} bytes", info.length);
    println!("supports HEAD:  {}", info.supports_head);
    println!("supports range: {}", info.supports_range);
    Ok(())
}
