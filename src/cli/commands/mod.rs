//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod download;
mod inspect;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::load_settings;

#[derive(Parser)]
#[command(name = "chartfetch")]
#[command(about = "Download chart archives from third-party file hosts")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Download every chart in a JSON records file
    Download {
        /// JSON file containing an array of chart records
        records: PathBuf,
        /// Destination directory (overrides config)
        #[arg(short, long, env = "CHARTFETCH_DEST_DIR")]
        dest: Option<PathBuf>,
        /// Charts downloaded at once
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,
        /// Per-chart timeout in seconds
        #[arg(short, long)]
        timeout: Option<u64>,
        /// Replace archives that already exist
        #[arg(long)]
        overwrite: bool,
        /// Put archives in one subdirectory per source
        #[arg(long)]
        organize_by_source: bool,
        /// Disable progress bars
        #[arg(long)]
        no_progress: bool,
        /// Write a JSON report of every result to this path
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Print the provider category of each URL
    Classify {
        /// URLs to classify
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Resolve a URL to its fetchable location without downloading
    Resolve {
        /// URL to resolve
        url: String,
    },
}

/// Parse arguments and run the selected command.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Download {
            records,
            dest,
            concurrency,
            timeout,
            overwrite,
            organize_by_source,
            no_progress,
            report,
        } => {
            let mut settings = load_settings(cli.config.as_deref()).await?;
            if let Some(dest) = dest {
                settings.dest_dir = dest;
            }
            if let Some(concurrency) = concurrency {
                settings.max_concurrency = concurrency;
            }
            if let Some(timeout) = timeout {
                settings.item_timeout_secs = timeout;
            }
            settings.overwrite |= overwrite;
            settings.organize_by_source |= organize_by_source;

            download::cmd_download(&settings, &records, !no_progress, report.as_deref()).await
        }
        Commands::Classify { urls } => {
            inspect::cmd_classify(&urls);
            Ok(())
        }
        Commands::Resolve { url } => {
            let settings = load_settings(cli.config.as_deref()).await?;
            inspect::cmd_resolve(&settings, &url).await
        }
    }
}
