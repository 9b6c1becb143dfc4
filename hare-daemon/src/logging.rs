use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{fmt, EnvFilter};

use crate::log_rotation::{rotate_if_needed, MAX_LOG_BYTES, MAX_ROTATED_FILES};

/// Install the global stderr subscriber. `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    let _ = fmt()
        .with_env_filter(env_filter())
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

/// A subscriber appending to `path`, for a daemon whose stderr is `/dev/null`.
///
/// The file is rotated first when it has grown past [`MAX_LOG_BYTES`].
pub fn daemon_subscriber(
    path: &Path,
) -> io::Result<impl tracing::Subscriber + Send + Sync + 'static> {
    if let Err(err) = rotate_if_needed(path, MAX_LOG_BYTES, MAX_ROTATED_FILES) {
        tracing::warn!(path = %path.display(), error = %err, "daemon log rotation failed");
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(fmt()
        .with_env_filter(env_filter())
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .finish())
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}
