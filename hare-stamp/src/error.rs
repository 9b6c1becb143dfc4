//! Error types for hare-stamp.

use std::path::PathBuf;

use thiserror::Error;

use hare_core::exit::EXIT_BAD_INPUT;
use hare_matcher::MatchError;

/// All errors that can arise from stamping and cleanup.
#[derive(Debug, Error)]
pub enum StampError {
    /// Caller misuse: missing source, non-directory destination, empty basename.
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    /// A file already sits at the stamped destination.
    #[error("destination {path} already exists")]
    DestinationExists { path: PathBuf },

    /// An OS call failed, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Lookup of the file to clean up failed.
    #[error("match error: {0}")]
    Match(#[from] MatchError),
}

impl StampError {
    /// Process exit code for this failure: the errno of a failed syscall, or
    /// [`EXIT_BAD_INPUT`] for misuse.
    pub fn exit_code(&self) -> i32 {
        match self {
            StampError::InvalidInput { .. } | StampError::Match(_) => EXIT_BAD_INPUT,
            StampError::DestinationExists { .. } => libc::EEXIST,
            StampError::Io { source, .. } => source.raw_os_error().unwrap_or(EXIT_BAD_INPUT),
        }
    }
}

pub(crate) fn invalid(reason: impl Into<String>) -> StampError {
    StampError::InvalidInput {
        reason: reason.into(),
    }
}

/// Convenience constructor for [`StampError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StampError {
    StampError::Io {
        path: path.into(),
        source,
    }
}
