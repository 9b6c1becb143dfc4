//! End-to-end driver: create a file, announce it, start the daemon, check
//! the result, clean up.
//!
//! ## Run sequence
//!
//! 1. Make sure both directories exist (mode `0777`, umask cleared meanwhile).
//! 2. Create `watched_dir/<base>` with the test content. `base` is raw bytes
//!    and may carry a NUL; the file on disk gets the name up to that NUL.
//! 3. Write the full, untruncated path bytes into a fresh event channel.
//! 4. Fork the daemon, close our write end, wait for it.
//! 5. Verify the source is gone and a stamped copy with the same SHA-256
//!    sits in the processed directory.
//! 6. Remove whatever is left. Cleanup failures are logged, never returned.

use std::ffi::OsStr;
use std::fs::{self, DirBuilder, File};
use std::io::Write;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};

use hare_core::exit::describe;
use hare_core::types::{until_nul, ChildExit, DaemonOutcome, Pid};
use hare_core::Configuration;
use hare_matcher::{regular_files, suffix_matches};
use hare_stamp::{delete_matching_file, STAMP_LEN};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::channel::EventChannel;
use crate::error::{io_err, DaemonError};
use crate::paths::absolutize_config;
use crate::supervisor::be_sure;

/// What the harness writes when no content is supplied.
pub const DEFAULT_CONTENT: &[u8] =
    b"This is my file.\nThere are many like it but this one is mine.\n";

/// Outcome of one harness run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HarnessReport {
    pub pid: Pid,
    pub status: ChildExit,
    pub exit_code: i32,
    pub description: String,
    /// Path of the file the harness created.
    pub source: String,
    /// Stamped file found in the processed directory, if any.
    pub processed: Option<String>,
    pub source_removed: bool,
    pub content_verified: bool,
}

impl HarnessReport {
    pub fn passed(&self) -> bool {
        self.exit_code == 0 && self.source_removed && self.content_verified
    }
}

pub struct Harness {
    config: Configuration,
}

impl Harness {
    pub fn new(config: Configuration) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// [`Harness::run`] with the base filename read from `input`.
    pub fn run_from_file(
        &self,
        input: &Path,
        content: &[u8],
    ) -> Result<HarnessReport, DaemonError> {
        let base = fs::read(input).map_err(|e| io_err(input, e))?;
        self.run(&base, content)
    }

    pub fn run(&self, base: &[u8], content: &[u8]) -> Result<HarnessReport, DaemonError> {
        if until_nul(base).is_empty() {
            return Err(DaemonError::InvalidInput(
                "test filename is empty before its first NUL".into(),
            ));
        }
        // The daemon resolves events after chdir("/"); paths must be absolute.
        let config = absolutize_config(&self.config)
            .map_err(|e| io_err(&self.config.watched_dir, e))?;
        prepare_dirs(&config)?;

        let event = event_bytes(&config.watched_dir, base);
        let source = PathBuf::from(OsStr::from_bytes(until_nul(&event)));
        write_test_file(&source, content)?;
        let expected = sha256_hex(content);
        tracing::info!(
            source = %source.display(),
            event_len = event.len(),
            sha256 = %expected,
            "test file created"
        );

        let outcome = match start_and_wait(&config, &event) {
            Ok(outcome) => outcome,
            Err(err) => {
                remove_quietly(&source);
                return Err(err);
            }
        };

        let report = verify(&config, outcome, &source, &expected);
        cleanup(&config, &source, report.processed.as_deref());
        Ok(report)
    }
}

fn start_and_wait(config: &Configuration, event: &[u8]) -> Result<DaemonOutcome, DaemonError> {
    let (read, write) = EventChannel::open()?;
    write.write(event)?;
    let (child, write) = be_sure(config, read, Some(write))?;
    drop(write);
    child.wait()
}

fn verify(
    config: &Configuration,
    outcome: DaemonOutcome,
    source: &Path,
    expected: &str,
) -> HarnessReport {
    let source_removed = !source.exists();
    let processed = source
        .file_name()
        .and_then(|name| match newest_stamped(&config.process_dir, name.as_bytes()) {
            Ok(found) => found,
            Err(err) => {
                tracing::warn!(error = %err, "could not scan processed directory");
                None
            }
        });

    let content_verified = match &processed {
        Some(path) => match fs::read(path) {
            Ok(bytes) => sha256_hex(&bytes) == expected,
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "could not read processed file"
                );
                false
            }
        },
        None => false,
    };

    let exit_code = outcome.exit_code();
    let report = HarnessReport {
        pid: outcome.pid,
        status: outcome.status,
        exit_code,
        description: describe(exit_code),
        source: source.to_string_lossy().into_owned(),
        processed: processed.map(|p| p.to_string_lossy().into_owned()),
        source_removed,
        content_verified,
    };
    tracing::info!(
        pid = %report.pid,
        exit_code,
        source_removed,
        content_verified,
        "daemon run verified"
    );
    report
}

fn cleanup(config: &Configuration, source: &Path, processed: Option<&str>) {
    remove_quietly(source);
    let Some(processed) = processed else {
        return;
    };
    let Some(name) = Path::new(processed).file_name() else {
        return;
    };
    if let Err(err) = delete_matching_file(&config.process_dir, name.as_bytes()) {
        tracing::warn!(error = %err, "could not delete processed file");
    }
}

/// Create both directories with mode `0777`.
///
/// The process umask is cleared while creating them and restored afterwards.
pub fn prepare_dirs(config: &Configuration) -> Result<(), DaemonError> {
    // SAFETY: umask(2) cannot fail.
    let previous = unsafe { libc::umask(0) };
    let result = [&config.watched_dir, &config.process_dir]
        .into_iter()
        .try_for_each(|dir| {
            if dir.is_dir() {
                return Ok(());
            }
            DirBuilder::new()
                .recursive(true)
                .mode(0o777)
                .create(dir)
                .map_err(|e| io_err(dir, e))
        });
    // SAFETY: as above.
    unsafe { libc::umask(previous) };
    result
}

/// `watched_dir` + `/` + `base`, bytes only.
fn event_bytes(watched_dir: &Path, base: &[u8]) -> Vec<u8> {
    let dir = watched_dir.as_os_str().as_bytes();
    let mut out = Vec::with_capacity(dir.len() + 1 + base.len());
    out.extend_from_slice(dir);
    if !dir.ends_with(b"/") {
        out.push(b'/');
    }
    out.extend_from_slice(base);
    out
}

fn write_test_file(path: &Path, content: &[u8]) -> Result<(), DaemonError> {
    let mut file = File::create(path).map_err(|e| io_err(path, e))?;
    file.write_all(content).map_err(|e| io_err(path, e))?;
    file.sync_all().map_err(|e| io_err(path, e))
}

/// The lexicographically greatest `YYYYMMDD_HHMMSS_<name>` under `dir`.
fn newest_stamped(dir: &Path, name: &[u8]) -> Result<Option<PathBuf>, DaemonError> {
    let mut newest: Option<PathBuf> = None;
    for path in regular_files(dir)? {
        let path = path?;
        let Some(file_name) = path.file_name().map(OsStr::as_bytes) else {
            continue;
        };
        if file_name.len() == STAMP_LEN + name.len()
            && suffix_matches(file_name, name)
            && newest.as_ref().map_or(true, |best| path > *best)
        {
            newest = Some(path);
        }
    }
    Ok(newest)
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn remove_quietly(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "removed"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => tracing::warn!(path = %path.display(), error = %err, "cleanup failed"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
