//! `splitfetch config` – show where the config lives and what it says.

use anyhow::Result;
use splitfetch_core::config::{self, SplitfetchConfig};

pub fn run_config(cfg: &SplitfetchConfig) -> Result<()> {
    let path = config::config_path()?;
    println!("config file: {}", path.display());
    println!("{}", serde_json::to_string_pretty(cfg)?);
    Ok(())
}
