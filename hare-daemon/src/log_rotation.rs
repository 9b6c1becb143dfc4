//! Size-based rotation of the daemon log.
//!
//! A detached daemon appends to one log file for its whole life. Before each
//! daemon start the file is rotated once it exceeds [`MAX_LOG_BYTES`]:
//! `hare-daemon.log` → `.1` → `.2` … up to [`MAX_ROTATED_FILES`] copies.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// 10 MiB.
pub const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;

pub const MAX_ROTATED_FILES: usize = 5;

/// Rotate `log_path` when it is at least `max_bytes` long.
///
/// Returns `true` when a rotation happened. A missing log is not an error.
pub fn rotate_if_needed(log_path: &Path, max_bytes: u64, max_files: usize) -> io::Result<bool> {
    let size = match fs::metadata(log_path) {
        Ok(meta) => meta.len(),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };
    if size < max_bytes || max_files == 0 {
        return Ok(false);
    }

    shift_backups(log_path, max_files)?;
    fs::rename(log_path, backup_path(log_path, 1))?;
    Ok(true)
}

/// Drop the oldest backup and move every other one up a slot.
fn shift_backups(log_path: &Path, max_files: usize) -> io::Result<()> {
    remove_if_exists(&backup_path(log_path, max_files))?;
    for n in (1..max_files).rev() {
        let from = backup_path(log_path, n);
        if from.exists() {
            fs::rename(&from, backup_path(log_path, n + 1))?;
        }
    }
    Ok(())
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}

/// `hare-daemon.log` → `hare-daemon.log.<n>`
pub fn backup_path(base: &Path, n: usize) -> PathBuf {
    let mut name = base.file_name().map(|s| s.to_os_string()).unwrap_or_default();
    name.push(format!(".{n}"));
    base.with_file_name(name)
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn small_log_is_left_alone() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("hare-daemon.log");
        fs::write(&log, b"line\n").unwrap();

        assert!(!rotate_if_needed(&log, 1024, MAX_ROTATED_FILES).unwrap());
        assert!(log.exists());
        assert!(!backup_path(&log, 1).exists());
    }

    #[test]
    fn oversized_log_moves_to_first_backup() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("hare-daemon.log");
        fs::write(&log, vec![b'x'; 64]).unwrap();

        assert!(rotate_if_needed(&log, 32, MAX_ROTATED_FILES).unwrap());
        assert!(!log.exists(), "the daemon recreates the live log on open");
        assert_eq!(fs::metadata(backup_path(&log, 1)).unwrap().len(), 64);
    }

    #[test]
    fn backups_are_capped() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("hare-daemon.log");
        for round in 0..4u8 {
            fs::write(&log, vec![b'a' + round; 64]).unwrap();
            rotate_if_needed(&log, 32, 2).unwrap();
        }

        assert_eq!(fs::read(backup_path(&log, 1)).unwrap()[0], b'd');
        assert_eq!(fs::read(backup_path(&log, 2)).unwrap()[0], b'c');
        assert!(!backup_path(&log, 3).exists());
    }

    #[test]
    fn missing_log_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("absent.log");
        assert!(!rotate_if_needed(&log, MAX_LOG_BYTES, MAX_ROTATED_FILES).unwrap());
    }
}
