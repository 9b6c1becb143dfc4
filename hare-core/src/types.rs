//! Domain types shared by the harness, the matcher and the daemon.
//!
//! Filenames and needles are carried as explicit-length byte buffers. Nothing
//! here treats a NUL byte as a terminator.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// An OS process identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pid(pub i32);

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<i32> for Pid {
    fn from(raw: i32) -> Self {
        Self(raw)
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A single "new file" notification, as carried over the event channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub payload: Vec<u8>,
}

impl Event {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// The payload up to (not including) its first NUL byte.
    ///
    /// This is the name a kernel `open(2)` would have created from the payload.
    pub fn until_nul(&self) -> &[u8] {
        until_nul(&self.payload)
    }
}

/// `bytes` up to (not including) the first NUL byte.
pub fn until_nul(bytes: &[u8]) -> &[u8] {
    match bytes.iter().position(|&b| b == 0) {
        Some(idx) => &bytes[..idx],
        None => bytes,
    }
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

/// A request to find a file under `search_root` whose name ends with `needle`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRequest {
    pub search_root: PathBuf,
    pub needle: Vec<u8>,
    /// True iff the needle carries an embedded NUL, i.e. its declared length
    /// exceeds its C-string length.
    pub needle_is_nul_truncated: bool,
}

impl MatchRequest {
    pub fn new(search_root: impl Into<PathBuf>, needle: impl Into<Vec<u8>>) -> Self {
        let needle = needle.into();
        let needle_is_nul_truncated = until_nul(&needle).len() < needle.len();
        Self {
            search_root: search_root.into(),
            needle,
            needle_is_nul_truncated,
        }
    }
}

/// The single path found by a match, if any.
pub type MatchResult = Option<PathBuf>;

// ---------------------------------------------------------------------------
// Daemon outcome
// ---------------------------------------------------------------------------

/// How a reaped child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "value")]
pub enum ChildExit {
    /// Normal termination with this exit status.
    Exited(i32),
    /// Terminated by this signal number.
    Signaled(i32),
}

impl fmt::Display for ChildExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChildExit::Exited(code) => write!(f, "exited with {code}"),
            ChildExit::Signaled(signo) => write!(f, "killed by signal {signo}"),
        }
    }
}

/// Result of reaping the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonOutcome {
    pub pid: Pid,
    pub status: ChildExit,
}

impl DaemonOutcome {
    /// Shell-style exit code: the exit status, or `128 + signo` for a signal.
    pub fn exit_code(&self) -> i32 {
        match self.status {
            ChildExit::Exited(code) => code,
            ChildExit::Signaled(signo) => 128 + signo,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == ChildExit::Exited(0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
