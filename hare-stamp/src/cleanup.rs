//! Harness cleanup: delete the file a run left behind.

use std::path::{Path, PathBuf};

use hare_core::types::MatchRequest;
use hare_matcher::find_matching_file;

use crate::error::{io_err, StampError};

/// Delete the first file under `root` whose name ends with `needle`.
///
/// Returns the deleted path, or `Ok(None)` when nothing matched.
pub fn delete_matching_file(root: &Path, needle: &[u8]) -> Result<Option<PathBuf>, StampError> {
    let request = MatchRequest::new(root, needle.to_vec());
    let Some(path) = find_matching_file(&request)? else {
        tracing::debug!(root = %root.display(), "no matching file to delete");
        return Ok(None);
    };

    std::fs::remove_file(&path).map_err(|e| io_err(&path, e))?;
    tracing::info!(path = %path.display(), "deleted matching file");
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn deletes_stamped_file_by_basename() {
        let dir = TempDir::new().expect("tempdir");
        let stamped = dir.path().join("20240115_093042_notes.txt");
        fs::write(&stamped, b"hello").expect("write");

        let deleted = delete_matching_file(dir.path(), b"notes.txt").expect("delete");
        assert_eq!(deleted, Some(stamped.clone()));
        assert!(!stamped.exists());
    }

    #[test]
    fn no_match_is_not_an_error() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join("other"), b"x").expect("write");
        assert_eq!(delete_matching_file(dir.path(), b"notes.txt").expect("delete"), None);
        assert!(dir.path().join("other").exists());
    }
}
