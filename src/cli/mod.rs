//! Command line interface.

pub mod command;

use std::path::PathBuf;
use std::time::Duration;

use clap::{command, Parser, Subcommand};
use indicatif::ProgressBar;

use crate::reading::DEFAULT_FALLBACK_DAYS;

#[derive(Parser)]
#[command(version, about, long_about = None)]
/// Contains the commands
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Cache database path
    #[arg(long, global = true)]
    pub cache: Option<PathBuf>,
}

impl Cli {
    pub fn cache_path(&self) -> PathBuf {
        self.cache.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("hdd")
                .join("cache.sqlite")
        })
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve postal codes to heating degree days
    Resolve {
        /// Comma-separated postal codes
        #[arg(long, value_delimiter = ',', required = true)]
        plz: Vec<String>,
        /// Target date (YYYY-MM-DD)
        #[arg(long)]
        date: String,
        /// Base temperature in degrees Celsius
        #[arg(long, default_value = "18.0")]
        base: String,
        /// Maximum days to walk back when the target date has no value
        #[arg(long, default_value_t = DEFAULT_FALLBACK_DAYS)]
        fallback_days: u32,
        /// Also write a semicolon-separated export file
        #[arg(long)]
        csv: bool,
    },
    /// Load the station catalog and print a summary
    Stations {
        /// Bypass the cached snapshot and re-fetch the list
        #[arg(long)]
        refresh: bool,
    },
}

/// Creates a spinner.
pub fn create_spinner(message: String) -> ProgressBar {
    let bar = ProgressBar::new_spinner().with_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));

    bar
}
