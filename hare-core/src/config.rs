//! Daemon configuration.
//!
//! A [`Configuration`] is built once by the harness (from a probed
//! [`Layout`] or a YAML file) and is immutable after the daemon starts. The
//! parent and the forked child each hold their own copy.
//!
//! ```yaml
//! watched_dir: /tmp/watch/
//! process_dir: /tmp/watch/processed/
//! poll_interval_ms: 1000      # optional
//! max_idle_polls: ~           # optional; unbounded when absent
//! require_root: true          # optional
//! daemon_log: /tmp/watch/hare-daemon.log  # optional
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, CoreError};
use crate::layout::Layout;

/// Default WatchLoop polling interval.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    /// Where new files show up.
    pub watched_dir: PathBuf,
    /// Where stamped files are moved.
    pub process_dir: PathBuf,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Give up after this many empty polls. `None` polls forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_idle_polls: Option<u32>,
    #[serde(default = "default_require_root")]
    pub require_root: bool,
    /// Log file for the detached daemon, whose standard streams are closed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daemon_log: Option<PathBuf>,
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_require_root() -> bool {
    true
}

impl Configuration {
    pub fn new(watched_dir: impl Into<PathBuf>, process_dir: impl Into<PathBuf>) -> Self {
        Self {
            watched_dir: watched_dir.into(),
            process_dir: process_dir.into(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_idle_polls: None,
            require_root: true,
            daemon_log: None,
        }
    }

    /// `<root>/watch/` and `<root>/watch/processed/`.
    pub fn from_layout(layout: &Layout) -> Self {
        Self::new(layout.watched_dir(), layout.process_dir())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Rejects empty directory fields.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.watched_dir.as_os_str().is_empty() {
            return Err(CoreError::EmptyPath {
                field: "watched_dir",
            });
        }
        if self.process_dir.as_os_str().is_empty() {
            return Err(CoreError::EmptyPath {
                field: "process_dir",
            });
        }
        Ok(())
    }
}

/// Load and validate a YAML configuration file.
pub fn load_config(path: &Path) -> Result<Configuration, CoreError> {
    if !path.exists() {
        return Err(CoreError::ConfigNotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    let config: Configuration =
        serde_yaml::from_str(&contents).map_err(|e| CoreError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
    config.validate()?;
    Ok(config)
}
