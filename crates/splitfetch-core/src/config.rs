use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Global configuration loaded from `~/.config/splitfetch/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitfetchConfig {
    /// Maximum number of attempts per probe step and per range (including the first).
    pub max_tries: u32,
    /// Fixed wait between attempts, in milliseconds.
    pub net_error_wait_ms: u64,
    /// Connect timeout and read-stall timeout for every request, in milliseconds.
    pub timeout_ms: u64,
    /// Block size used when streaming a response into a range buffer.
    pub block_size: usize,
    /// Interval of the bandwidth sampler, in milliseconds.
    pub sampler_tick_ms: u64,
    /// Upper bound on range workers running at once for one transfer.
    pub max_connections: usize,
    /// Ranges per download when the caller does not ask for a count (0 = number of CPUs).
    #[serde(default)]
    pub default_parallelism: i64,
    /// Verify TLS certificates. When false the downloader's transport skips verification.
    #[serde(default = "default_validate_tls")]
    pub validate_tls: bool,
}

fn default_validate_tls() -> bool {
    true
}

impl Default for SplitfetchConfig {
    fn default() -> Self {
        Self {
            max_tries: 100,
            net_error_wait_ms: 10_000,
            timeout_ms: 30_000,
            block_size: 4096,
            sampler_tick_ms: 100,
            max_connections: 100,
            default_parallelism: 0,
            validate_tls: default_validate_tls(),
        }
    }
}

/// Duration-typed settings consumed by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub max_tries: u32,
    pub net_error_wait: Duration,
    pub timeout: Duration,
    pub block_size: usize,
    pub sampler_tick: Duration,
    pub max_connections: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&SplitfetchConfig::default())
    }
}

impl From<&SplitfetchConfig> for EngineSettings {
    fn from(cfg: &SplitfetchConfig) -> Self {
        Self {
            max_tries: cfg.max_tries.max(1),
            net_error_wait: Duration::from_millis(cfg.net_error_wait_ms),
            timeout: Duration::from_millis(cfg.timeout_ms),
            block_size: cfg.block_size.max(1),
            sampler_tick: Duration::from_millis(cfg.sampler_tick_ms.max(1)),
            max_connections: cfg.max_connections.max(1),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("splitfetch")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<SplitfetchConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = SplitfetchConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: SplitfetchConfig =
        toml::from_str(&data).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}
