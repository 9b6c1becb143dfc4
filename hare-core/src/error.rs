//! Error types for hare-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or validating a [`crate::Configuration`].
#[derive(Debug, Error)]
pub enum CoreError {
    /// Underlying I/O failure, with the path that caused it.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load.
    #[error("failed to parse configuration at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The configuration file did not exist.
    #[error("configuration not found at {path}")]
    ConfigNotFound { path: PathBuf },

    /// A required directory field was empty.
    #[error("configuration field `{field}` must not be empty")]
    EmptyPath { field: &'static str },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> CoreError {
    CoreError::Io {
        path: path.into(),
        source,
    }
}
