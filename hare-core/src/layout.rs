//! Harness directory layout.
//!
//! The layout root is the first of `/ramdisk`, `/tmp`, `./` that exists as a
//! directory. Under it live `watch/` and `watch/processed/`.

use std::path::{Path, PathBuf};

/// Candidate roots, in probe order.
pub const ROOT_CANDIDATES: [&str; 3] = ["/ramdisk", "/tmp", "."];

pub const WATCH_DIR: &str = "watch";
pub const PROCESSED_DIR: &str = "processed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Probe [`ROOT_CANDIDATES`] in order.
    pub fn probe() -> Self {
        Self::probe_from(ROOT_CANDIDATES.iter().map(Path::new))
    }

    /// First candidate that is an existing directory; `./` when none is.
    pub fn probe_from<'a>(candidates: impl IntoIterator<Item = &'a Path>) -> Self {
        candidates
            .into_iter()
            .find(|candidate| candidate.is_dir())
            .map(Self::new)
            .unwrap_or_else(|| Self::new("."))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/watch/`
    pub fn watched_dir(&self) -> PathBuf {
        with_trailing_slash(self.root.join(WATCH_DIR))
    }

    /// `<root>/watch/processed/`
    pub fn process_dir(&self) -> PathBuf {
        with_trailing_slash(self.root.join(WATCH_DIR).join(PROCESSED_DIR))
    }
}

fn with_trailing_slash(path: PathBuf) -> PathBuf {
    let mut raw = path.into_os_string();
    raw.push("/");
    PathBuf::from(raw)
}
