pub mod resolve;
pub mod stations;

use std::path::PathBuf;

pub use resolve::resolve;
pub use stations::stations;

/// Export filename carrying the target date, placed in the home directory.
pub fn make_csv_file_name(date: &str) -> PathBuf {
    let file_name = format!("hdd-{date}.csv");

    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(file_name)
}

// -- Tests -------------------------------------------------------------------
