//! File-backed tracing setup. The terminal belongs to the UI, so nothing is
//! ever written to stdout or stderr.

use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::EnvFilter;

/// Environment variable holding an `EnvFilter` directive string
pub const LOG_ENV: &str = "MOPRA_LOG";

pub fn log_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| anyhow!("Could not determine data directory"))?;
    Ok(data_dir.join("mopra").join("mopra.log"))
}

/// Filter used when `MOPRA_LOG` is unset: our crates at `level`, the rest at warn.
pub fn default_directives(level: Option<&str>) -> String {
    format!("mopra={},warn", level.unwrap_or("info"))
}

/// Install the global subscriber, appending to the log file. Returns its path.
pub fn init(level: Option<&str>) -> Result<PathBuf> {
    let path = log_path()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {:?}", path))?;

    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    Ok(path)
}
