//! File lookup for `hare-matcher`.
//!
//! `find_matching_file(request)` walks a directory tree and returns the first
//! regular file whose name ends with the request's needle. Needles are plain
//! byte slices: a needle with an embedded NUL is compared over its full
//! length, exactly like any other needle.
//!
//! The walk is depth-first, never follows symlinks, and visits directory
//! entries in file-name order, so "first match" is the lexicographically
//! first candidate path.

use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use hare_core::types::{MatchRequest, MatchResult};
use thiserror::Error;
use walkdir::WalkDir;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Errors from a tree walk. "No match" is not an error.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("search root {path} does not exist or is not a directory")]
    RootNotFound { path: PathBuf },

    #[error("needle is empty after trimming leading '/'")]
    EmptyNeedle,

    #[error("walk failed under {root}: {source}")]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Find the first regular file under `request.search_root` whose name ends
/// with `request.needle`.
pub fn find_matching_file(request: &MatchRequest) -> Result<MatchResult, MatchError> {
    let needle = trim_leading_slashes(&request.needle);
    if needle.is_empty() {
        return Err(MatchError::EmptyNeedle);
    }

    tracing::debug!(
        root = %request.search_root.display(),
        needle = %String::from_utf8_lossy(needle).escape_debug(),
        needle_len = needle.len(),
        nul_truncated = request.needle_is_nul_truncated,
        "searching for matching file"
    );

    let found = find_first(&request.search_root, |path| name_matches(path, needle))?;
    match &found {
        Some(path) => tracing::debug!(path = %path.display(), "matched"),
        None => tracing::debug!(root = %request.search_root.display(), "no match"),
    }
    Ok(found)
}

/// Walk `root` and return the first regular file accepted by `predicate`.
///
/// The walk stops at the first hit.
pub fn find_first<F>(root: &Path, mut predicate: F) -> Result<Option<PathBuf>, MatchError>
where
    F: FnMut(&Path) -> bool,
{
    for path in regular_files(root)? {
        let path = path?;
        if predicate(&path) {
            return Ok(Some(path));
        }
    }
    Ok(None)
}

/// Lazily yield every regular file under `root`, in walk order.
pub fn regular_files(
    root: &Path,
) -> Result<impl Iterator<Item = Result<PathBuf, MatchError>>, MatchError> {
    if !root.is_dir() {
        return Err(MatchError::RootNotFound { path: root.to_path_buf() });
    }
    let owned_root = root.to_path_buf();
    let walk = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(move |entry| match entry {
            Ok(entry) if entry.file_type().is_file() => Some(Ok(entry.into_path())),
            Ok(_) => None,
            Err(source) => Some(Err(MatchError::Walk {
                root: owned_root.clone(),
                source,
            })),
        });
    Ok(walk)
}

/// First candidate whose file name ends with `needle`, leading `/` trimmed.
///
/// Works on any sequence of paths, not only on a live directory walk.
pub fn first_match<I, P>(candidates: I, needle: &[u8]) -> Option<PathBuf>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let needle = trim_leading_slashes(needle);
    if needle.is_empty() {
        return None;
    }
    candidates
        .into_iter()
        .find(|candidate| name_matches(candidate.as_ref(), needle))
        .map(|candidate| candidate.as_ref().to_path_buf())
}

/// Exact byte comparison of `name`'s trailing bytes against `needle`.
pub fn suffix_matches(name: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && name.ends_with(needle)
}

/// Strip every leading `/` from `needle`.
///
/// Needles are captured as raw path fragments but only ever compared against
/// a file name.
pub fn trim_leading_slashes(needle: &[u8]) -> &[u8] {
    let start = needle.iter().take_while(|&&b| b == b'/').count();
    &needle[start..]
}

fn name_matches(path: &Path, needle: &[u8]) -> bool {
    path.file_name()
        .map(|name| suffix_matches(name.as_bytes(), needle))
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
