//! Argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use transit_transfers::DEFAULT_MAX_HTTP_RETRIES;

/// Download files over HTTP and report transfer status.
#[derive(Debug, Parser)]
#[command(name = "transit")]
#[command(about = "Download files and report transfer status")]
#[command(version)]
pub struct Cli {
    /// Directory downloads are saved to
    #[arg(long = "save-dir", env = "TRANSIT_SAVE_DIR", global = true)]
    pub save_dir: Option<PathBuf>,

    /// Seconds without data before a fetch attempt fails
    #[arg(long, env = "TRANSIT_TIMEOUT", default_value_t = 30, global = true)]
    pub timeout: u64,

    /// Retries granted when a server answers 503 with Retry-After
    #[arg(
        long = "max-retries",
        env = "TRANSIT_MAX_RETRIES",
        default_value_t = DEFAULT_MAX_HTTP_RETRIES,
        global = true
    )]
    pub max_retries: u32,

    /// Enable debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Download a URL and wait for it to finish
    Fetch {
        /// URL to download
        url: String,
        /// File name to save as (defaults to the URL's last path segment)
        #[arg(short, long)]
        name: Option<String>,
        /// Treat the payload as a zip archive and extract it when done
        #[arg(long)]
        compressed: bool,
        /// Don't draw a progress bar
        #[arg(short, long)]
        quiet: bool,
    },

    /// Print engine status and registered transfers
    Status {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}
