//! Diagnostic logging setup.
//!
//! The chat interface owns the terminal, so diagnostics go to a file: the
//! path given with `--log`, or `murmur.log` in the data directory. The filter
//! comes from `MURMUR_LOG` and defaults to warnings only.

use std::error::Error;
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::core::config::io::project_dirs;

pub const LOG_ENV_VAR: &str = "MURMUR_LOG";
const DEFAULT_FILTER: &str = "warn";
const LOG_FILE_NAME: &str = "murmur.log";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

fn default_log_path() -> Result<PathBuf, Box<dyn Error>> {
    let dirs = project_dirs()?;
    Ok(dirs.data_dir().join(LOG_FILE_NAME))
}

/// Installs the global subscriber. Calling it twice leaves the first one in
/// place.
pub fn init_tracing(path: Option<PathBuf>) -> Result<(), Box<dyn Error>> {
    let path = match path {
        Some(path) => path,
        None => default_log_path()?,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut options = OpenOptions::new();
    options.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let file = options.open(&path)?;

    let _ = tracing_subscriber::fmt()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .with_env_filter(env_filter())
        .try_init();
    Ok(())
}
