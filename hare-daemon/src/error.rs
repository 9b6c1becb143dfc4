use std::path::PathBuf;

use hare_core::exit::{EXIT_BAD_INPUT, EXIT_NO_EVENT, EXIT_NO_MATCH};
use hare_core::types::Pid;
use thiserror::Error;

/// Error surface for the event channel, daemon lifecycle, watch loop and harness.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("configuration error: {0}")]
    Config(#[from] hare_core::CoreError),

    #[error("event channel {op} failed: {source}")]
    Channel {
        op: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("short write on event channel: wrote {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    #[error("event channel closed before an event arrived")]
    ChannelClosed,

    #[error("no event after {polls} polls")]
    NoEvent { polls: u32 },

    #[error("no file matching {needle:?} under {root}")]
    NoMatch { root: PathBuf, needle: String },

    #[error("match error: {0}")]
    Match(#[from] hare_matcher::MatchError),

    #[error("stamp error: {0}")]
    Stamp(#[from] hare_stamp::StampError),

    #[error("daemon must be run with root privileges")]
    NotRoot,

    #[error("fork failed: {0}")]
    Fork(#[source] std::io::Error),

    #[error("waiting for daemon {pid} failed: {source}")]
    Wait {
        pid: Pid,
        #[source]
        source: std::io::Error,
    },
}

impl DaemonError {
    /// Exit code the daemon reports for this failure.
    ///
    /// OS failures map to their errno; misuse maps to [`EXIT_BAD_INPUT`].
    pub fn exit_code(&self) -> i32 {
        match self {
            DaemonError::Io { source, .. }
            | DaemonError::Channel { source, .. }
            | DaemonError::Fork(source)
            | DaemonError::Wait { source, .. } => errno_or_bad_input(source),
            DaemonError::Stamp(err) => err.exit_code(),
            DaemonError::Match(hare_matcher::MatchError::Walk { source, .. }) => source
                .io_error()
                .map(errno_or_bad_input)
                .unwrap_or(EXIT_BAD_INPUT),
            DaemonError::ChannelClosed | DaemonError::NoEvent { .. } => EXIT_NO_EVENT,
            DaemonError::NoMatch { .. } => EXIT_NO_MATCH,
            DaemonError::InvalidInput(_)
            | DaemonError::Config(_)
            | DaemonError::ShortWrite { .. }
            | DaemonError::Match(_)
            | DaemonError::NotRoot => EXIT_BAD_INPUT,
        }
    }
}

fn errno_or_bad_input(err: &std::io::Error) -> i32 {
    err.raw_os_error().unwrap_or(EXIT_BAD_INPUT)
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
