//! CLI for the splitfetch range downloader.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use splitfetch_core::config;
use std::path::PathBuf;

use commands::{run_config, run_get, run_probe, GetOptions};

/// Top-level CLI for splitfetch.
#[derive(Debug, Parser)]
#[command(name = "splitfetch")]
#[command(about = "splitfetch: parallel, resumable HTTP range downloader", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download one or more URLs, each split into parallel ranges.
    Get {
        /// Direct HTTP/HTTPS URLs to download.
        #[arg(required = true)]
        urls: Vec<String>,

        /// Number of ranges per download (0 = one per CPU). Defaults to the config value.
        #[arg(short = 'n', long, value_name = "N")]
        parallel: Option<i64>,

        /// Destination file. Only valid with a single URL.
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Do not verify TLS certificates.
        #[arg(long)]
        insecure: bool,

        /// Print one JSON result per URL instead of a summary line.
        #[arg(long)]
        json: bool,
    },

    /// Probe a URL: existence, length and range support.
    Probe {
        /// Direct HTTP/HTTPS URL to probe.
        url: String,
    },

    /// Show the config file path and effective values.
    Config,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Get {
                urls,
                parallel,
                output,
                insecure,
                json,
            } => {
                let opts = GetOptions {
                    parallel,
                    output,
                    insecure,
                    json,
                };
                run_get(&cfg, urls, opts).await?;
            }
            CliCommand::Probe { url } => run_probe(&cfg, url).await?,
            CliCommand::Config => run_config(&cfg)?,
        }

        Ok(())
    }
}
