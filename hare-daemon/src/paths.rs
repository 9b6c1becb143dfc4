use std::io;
use std::path::{Path, PathBuf};

use hare_core::Configuration;

/// Working directory of a detached daemon.
pub const DAEMON_ROOT_DIR: &str = "/";
pub const DEV_NULL: &str = "/dev/null";

/// Resolve `path` against the current directory when it is relative.
///
/// The daemon changes directory to `/` while detaching, so every path it is
/// handed must already be absolute.
pub fn absolutize(path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()?.join(path))
}

/// Copy of `config` with every path made absolute.
pub fn absolutize_config(config: &Configuration) -> io::Result<Configuration> {
    let mut out = config.clone();
    out.watched_dir = absolutize(&config.watched_dir)?;
    out.process_dir = absolutize(&config.process_dir)?;
    if let Some(log) = &config.daemon_log {
        out.daemon_log = Some(absolutize(log)?);
    }
    Ok(out)
}
