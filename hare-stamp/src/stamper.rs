//! Stamp-and-move.
//!
//! ## Protocol
//!
//! 1. Validate: `source` is an existing regular file, `dest_dir` an existing
//!    directory, and `source` has a non-empty basename.
//! 2. Format the local wall-clock time as `YYYYMMDD_HHMMSS_`.
//! 3. Build `dest_dir` + exactly one `/` + stamp + basename.
//! 4. Move in one syscall that refuses to replace an existing destination.
//!
//! No staging file is ever created, so a failed move leaves nothing behind.
//! Two same-named files stamped within the same second collide: the first
//! move wins, the second fails with [`StampError::DestinationExists`] and its
//! source stays where it was.

use std::ffi::{CString, OsStr};
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};

use crate::error::{invalid, io_err, StampError};

/// `strftime` pattern of the stamp prefix.
pub const STAMP_FORMAT: &str = "%Y%m%d_%H%M%S_";

/// Byte length of a rendered stamp prefix.
pub const STAMP_LEN: usize = "YYYYMMDD_HHMMSS_".len();

// ---------------------------------------------------------------------------
// stamp_and_move
// ---------------------------------------------------------------------------

/// Move `source` into `dest_dir`, prefixing its name with the current local time.
///
/// Returns the destination path.
pub fn stamp_and_move(source: &Path, dest_dir: &Path) -> Result<PathBuf, StampError> {
    stamp_and_move_at(source, dest_dir, Local::now().naive_local())
}

/// [`stamp_and_move`] with an explicit timestamp.
pub fn stamp_and_move_at(
    source: &Path,
    dest_dir: &Path,
    when: NaiveDateTime,
) -> Result<PathBuf, StampError> {
    let basename = validate(source, dest_dir)?;
    let destination = stamped_destination(dest_dir, basename.as_bytes(), when);

    if let Err(err) = move_no_replace(source, &destination) {
        tracing::warn!(
            source = %source.display(),
            destination = %destination.display(),
            error = %err,
            "stamp-and-move failed"
        );
        return Err(err);
    }

    tracing::info!(
        source = %source.display(),
        destination = %destination.display(),
        "stamped and moved"
    );
    Ok(destination)
}

/// `YYYYMMDD_HHMMSS_` for `when`.
pub fn timestamp_prefix(when: NaiveDateTime) -> String {
    when.format(STAMP_FORMAT).to_string()
}

/// `dest_dir/` + stamp + `basename`, with exactly one `/` after `dest_dir`.
pub fn stamped_destination(dest_dir: &Path, basename: &[u8], when: NaiveDateTime) -> PathBuf {
    let dir = dest_dir.as_os_str().as_bytes();
    let dir = &dir[..dir.len() - trailing_slashes(dir)];
    let stamp = timestamp_prefix(when);

    let mut out = Vec::with_capacity(dir.len() + 1 + stamp.len() + basename.len());
    out.extend_from_slice(dir);
    out.push(b'/');
    out.extend_from_slice(stamp.as_bytes());
    out.extend_from_slice(basename);
    PathBuf::from(OsStr::from_bytes(&out))
}

fn trailing_slashes(bytes: &[u8]) -> usize {
    bytes.iter().rev().take_while(|&&b| b == b'/').count()
}

fn validate<'a>(source: &'a Path, dest_dir: &Path) -> Result<&'a OsStr, StampError> {
    if source.as_os_str().is_empty() {
        return Err(invalid("empty source path"));
    }
    if dest_dir.as_os_str().is_empty() {
        return Err(invalid("empty destination directory"));
    }

    match std::fs::symlink_metadata(source) {
        Ok(meta) if meta.file_type().is_file() => {}
        Ok(_) => return Err(invalid(format!("{} is not a regular file", source.display()))),
        Err(err) => return Err(invalid(format!("{}: {err}", source.display()))),
    }
    match std::fs::metadata(dest_dir) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => return Err(invalid(format!("{} is not a directory", dest_dir.display()))),
        Err(err) => return Err(invalid(format!("{}: {err}", dest_dir.display()))),
    }

    match source.file_name() {
        Some(name) if !name.is_empty() => Ok(name),
        _ => Err(invalid(format!("{} has no basename", source.display()))),
    }
}

// ---------------------------------------------------------------------------
// Atomic move
// ---------------------------------------------------------------------------

/// Rename `source` to `destination` unless `destination` already exists.
pub(crate) fn move_no_replace(source: &Path, destination: &Path) -> Result<(), StampError> {
    #[cfg(target_os = "linux")]
    {
        match renameat2_noreplace(source, destination)? {
            Ok(()) => return Ok(()),
            Err(err) if err.raw_os_error() == Some(libc::EEXIST) => {
                return Err(StampError::DestinationExists {
                    path: destination.to_path_buf(),
                });
            }
            // Kernel or filesystem without RENAME_NOREPLACE support.
            Err(err)
                if matches!(err.raw_os_error(), Some(libc::EINVAL) | Some(libc::ENOSYS)) =>
            {
                tracing::debug!(error = %err, "renameat2 unsupported, using link + unlink");
            }
            Err(err) => return Err(io_err(destination, err)),
        }
    }
    link_then_unlink(source, destination)
}

#[cfg(target_os = "linux")]
const RENAME_NOREPLACE: libc::c_uint = 1;

#[cfg(target_os = "linux")]
fn renameat2_noreplace(
    source: &Path,
    destination: &Path,
) -> Result<io::Result<()>, StampError> {
    let from = c_path(source)?;
    let to = c_path(destination)?;
    // SAFETY: both pointers come from live CStrings that outlive the call.
    let rc = unsafe {
        libc::syscall(
            libc::SYS_renameat2,
            libc::AT_FDCWD,
            from.as_ptr(),
            libc::AT_FDCWD,
            to.as_ptr(),
            RENAME_NOREPLACE,
        )
    };
    if rc == 0 {
        Ok(Ok(()))
    } else {
        Ok(Err(io::Error::last_os_error()))
    }
}

/// `link(2)` refuses an existing destination atomically; the source name is
/// only dropped once the new name exists.
fn link_then_unlink(source: &Path, destination: &Path) -> Result<(), StampError> {
    if let Err(err) = std::fs::hard_link(source, destination) {
        if err.kind() == io::ErrorKind::AlreadyExists {
            return Err(StampError::DestinationExists {
                path: destination.to_path_buf(),
            });
        }
        return Err(io_err(destination, err));
    }
    if let Err(err) = std::fs::remove_file(source) {
        undo_link(destination);
        return Err(io_err(source, err));
    }
    Ok(())
}

/// Drop the new name after the source could not be unlinked.
fn undo_link(destination: &Path) {
    if let Err(err) = std::fs::remove_file(destination) {
        tracing::warn!(
            destination = %destination.display(),
            error = %err,
            "rollback of hard link failed, file now has two names"
        );
    }
}

#[cfg(target_os = "linux")]
fn c_path(path: &Path) -> Result<CString, StampError> {
    CString::new(path.as_os_str().as_bytes())
        .map_err(|_| invalid(format!("{} contains a NUL byte", path.display())))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::fs;
    use tempfile::TempDir;

    fn jan_15() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .and_then(|d| d.and_hms_opt(9, 30, 42))
            .expect("valid date")
    }

    #[test]
    fn prefix_is_zero_padded() {
        let when = NaiveDate::from_ymd_opt(2024, 3, 5)
            .and_then(|d| d.and_hms_opt(7, 8, 9))
            .expect("valid date");
        assert_eq!(timestamp_prefix(when), "20240305_070809_");
        assert_eq!(timestamp_prefix(when).len(), STAMP_LEN);
    }

    #[test]
    fn destination_has_exactly_one_separator() {
        for dir in ["/tmp/watch/processed", "/tmp/watch/processed/", "/tmp/watch/processed///"] {
            assert_eq!(
                stamped_destination(Path::new(dir), b"notes.txt", jan_15()),
                PathBuf::from("/tmp/watch/processed/20240115_093042_notes.txt"),
                "dir: {dir}"
            );
        }
    }

    #[test]
    fn root_destination_keeps_single_slash() {
        assert_eq!(
            stamped_destination(Path::new("/"), b"a", jan_15()),
            PathBuf::from("/20240115_093042_a")
        );
    }

    #[test]
    fn link_fallback_refuses_existing_destination() {
        let dir = TempDir::new().expect("tempdir");
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        fs::write(&src, b"new").expect("write src");
        fs::write(&dst, b"old").expect("write dst");

        let err = link_then_unlink(&src, &dst).unwrap_err();
        assert!(matches!(err, StampError::DestinationExists { .. }), "got: {err}");
        assert_eq!(fs::read(&dst).expect("read dst"), b"old");
        assert!(src.exists());
    }

    #[test]
    fn failed_rollback_is_logged() {
        let dir = TempDir::new().expect("tempdir");
        let log = dir.path().join("stamp.log");
        let file = fs::File::create(&log).expect("create log");
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
            .finish();

        // unlink(2) on a directory fails.
        let stuck = dir.path().join("stuck");
        fs::create_dir(&stuck).expect("mkdir");
        tracing::subscriber::with_default(subscriber, || undo_link(&stuck));

        let text = fs::read_to_string(&log).expect("read log");
        assert!(text.contains("rollback of hard link failed"), "log: {text}");
        assert!(stuck.exists());
    }

    #[test]
    fn link_fallback_moves_file() {
        let dir = TempDir::new().expect("tempdir");
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        fs::write(&src, b"payload").expect("write src");

        link_then_unlink(&src, &dst).expect("move");
        assert!(!src.exists());
        assert_eq!(fs::read(&dst).expect("read dst"), b"payload");
    }
}
