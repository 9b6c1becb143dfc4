//! The daemon's main loop.
//!
//! Single-shot: wait for one event, resolve it to a file under the watched
//! directory, stamp it into the processed directory, report an exit code.

use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use hare_core::exit::EXIT_SUCCESS;
use hare_core::types::{Event, MatchRequest};
use hare_core::Configuration;
use hare_matcher::find_matching_file;
use hare_stamp::stamp_and_move;

use crate::channel::ReadEnd;
use crate::error::DaemonError;

/// Everything the loop needs. Owned by the child after the fork.
#[derive(Debug)]
pub struct DaemonSession {
    config: Configuration,
    channel: ReadEnd,
}

impl DaemonSession {
    pub fn new(config: Configuration, channel: ReadEnd) -> Self {
        Self { config, channel }
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }
}

/// Process one event and return the daemon's exit code.
pub fn run_watch_loop(session: &DaemonSession) -> i32 {
    match process_one_event(session) {
        Ok(destination) => {
            tracing::info!(destination = %destination.display(), "event processed");
            EXIT_SUCCESS
        }
        Err(err) => {
            let code = err.exit_code();
            tracing::error!(error = %err, exit_code = code, "watch loop ended without stamping");
            code
        }
    }
}

/// Wait for an event, locate its file and stamp it. Returns the new path.
pub fn process_one_event(session: &DaemonSession) -> Result<PathBuf, DaemonError> {
    let event = wait_for_event(session)?;
    let source = resolve_source(&session.config, &event)?;
    Ok(stamp_and_move(&source, &session.config.process_dir)?)
}

fn wait_for_event(session: &DaemonSession) -> Result<Event, DaemonError> {
    let mut idle_polls: u32 = 0;
    loop {
        match session.channel.read_event()? {
            Some(event) if event.is_empty() => return Err(DaemonError::ChannelClosed),
            Some(event) => {
                tracing::debug!(bytes = event.len(), idle_polls, "event received");
                return Ok(event);
            }
            None => {
                idle_polls = idle_polls.saturating_add(1);
                if session.config.max_idle_polls.is_some_and(|max| idle_polls >= max) {
                    return Err(DaemonError::NoEvent { polls: idle_polls });
                }
                std::thread::sleep(session.config.poll_interval());
            }
        }
    }
}

/// Map an event to the file it announces.
///
/// The payload up to its first NUL is the name a kernel would have created;
/// when that names a regular file inside the watched directory it wins.
/// Otherwise the whole payload, minus a leading watched-directory prefix, is
/// used as a suffix needle for a tree search.
pub fn resolve_source(config: &Configuration, event: &Event) -> Result<PathBuf, DaemonError> {
    let direct = PathBuf::from(OsStr::from_bytes(event.until_nul()));
    if direct.starts_with(&config.watched_dir) && is_regular_file(&direct) {
        tracing::debug!(path = %direct.display(), "event names an existing file");
        return Ok(direct);
    }

    let needle = strip_dir_prefix(&event.payload, &config.watched_dir);
    let request = MatchRequest::new(&config.watched_dir, needle.to_vec());
    match find_matching_file(&request)? {
        Some(path) => Ok(path),
        None => Err(DaemonError::NoMatch {
            root: config.watched_dir.clone(),
            needle: String::from_utf8_lossy(needle).into_owned(),
        }),
    }
}

fn is_regular_file(path: &Path) -> bool {
    std::fs::symlink_metadata(path)
        .map(|meta| meta.file_type().is_file())
        .unwrap_or(false)
}

fn strip_dir_prefix<'a>(payload: &'a [u8], dir: &Path) -> &'a [u8] {
    let dir = dir.as_os_str().as_bytes();
    let dir = &dir[..dir.len() - dir.iter().rev().take_while(|&&b| b == b'/').count()];
    match payload.strip_prefix(dir) {
        Some(rest) if rest.first() == Some(&b'/') => rest,
        _ => payload,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::EventChannel;
    use hare_core::exit::{EXIT_NO_EVENT, EXIT_NO_MATCH};
    use rstest::rstest;
    use std::fs;
    use tempfile::TempDir;

    fn tree() -> (TempDir, Configuration) {
        let dir = TempDir::new().expect("tempdir");
        let watched = dir.path().join("watch");
        let processed = watched.join("processed");
        fs::create_dir_all(&processed).expect("mkdir");
        let mut config = Configuration::new(watched, processed);
        config.poll_interval_ms = 1;
        config.max_idle_polls = Some(3);
        config.require_root = false;
        (dir, config)
    }

    fn payload(config: &Configuration, name: &[u8]) -> Event {
        let mut bytes = config.watched_dir.as_os_str().as_bytes().to_vec();
        bytes.push(b'/');
        bytes.extend_from_slice(name);
        Event::new(bytes)
    }

    #[rstest]
    #[case(b"/tmp/watch/a.txt", b"/a.txt")]
    #[case(b"/tmp/watch/sub/a\0b", b"/sub/a\0b")]
    #[case(b"/tmp/watchers/a.txt", b"/tmp/watchers/a.txt")]
    #[case(b"a.txt", b"a.txt")]
    fn strip_dir_prefix_only_strips_whole_components(
        #[case] payload: &[u8],
        #[case] expected: &[u8],
    ) {
        assert_eq!(strip_dir_prefix(payload, Path::new("/tmp/watch/")), expected);
    }

    #[test]
    fn direct_path_wins() {
        let (_dir, config) = tree();
        let file = config.watched_dir.join("notes.txt");
        fs::write(&file, "hello").expect("write");

        let resolved = resolve_source(&config, &payload(&config, b"notes.txt")).expect("resolve");
        assert_eq!(resolved, file);
    }

    #[test]
    fn nul_payload_resolves_to_truncated_name() {
        let (_dir, config) = tree();
        let file = config.watched_dir.join("foo");
        fs::write(&file, "x").expect("write");

        let resolved = resolve_source(&config, &payload(&config, b"foo\0bar")).expect("resolve");
        assert_eq!(resolved, file);
    }

    #[test]
    fn missing_file_falls_back_to_suffix_search() {
        let (_dir, config) = tree();
        let nested = config.watched_dir.join("deep");
        fs::create_dir_all(&nested).expect("mkdir");
        fs::write(nested.join("xyz_report.csv"), "x").expect("write");

        let event = Event::new(b"report.csv".to_vec());
        let resolved = resolve_source(&config, &event).expect("resolve");
        assert_eq!(resolved, nested.join("xyz_report.csv"));
    }

    #[test]
    fn unmatched_payload_is_no_match() {
        let (_dir, config) = tree();
        let err = resolve_source(&config, &payload(&config, b"ghost.txt")).unwrap_err();
        assert!(matches!(err, DaemonError::NoMatch { .. }), "got: {err}");
        assert_eq!(err.exit_code(), EXIT_NO_MATCH);
    }

    #[test]
    fn idle_channel_gives_up_after_limit() {
        let (_dir, config) = tree();
        let (read, _write) = EventChannel::open().expect("open");
        let session = DaemonSession::new(config, read);

        let err = process_one_event(&session).unwrap_err();
        assert!(matches!(err, DaemonError::NoEvent { polls: 3 }), "got: {err}");
        assert_eq!(run_watch_loop(&session), EXIT_NO_EVENT);
    }

    #[test]
    fn closed_channel_ends_loop() {
        let (_dir, config) = tree();
        let (read, write) = EventChannel::open().expect("open");
        drop(write);
        let session = DaemonSession::new(config, read);
        assert!(matches!(process_one_event(&session), Err(DaemonError::ChannelClosed)));
    }

    #[test]
    fn event_is_stamped_into_processed_dir() {
        let (_dir, config) = tree();
        let file = config.watched_dir.join("notes.txt");
        fs::write(&file, "hello").expect("write");
        let (read, write) = EventChannel::open().expect("open");
        write.send(&payload(&config, b"notes.txt")).expect("send");

        let session = DaemonSession::new(config.clone(), read);
        let destination = process_one_event(&session).expect("process");

        assert!(!file.exists());
        assert_eq!(destination.parent(), Some(config.process_dir.as_path()));
        assert!(destination.to_string_lossy().ends_with("_notes.txt"));
        assert_eq!(fs::read_to_string(destination).expect("read"), "hello");
    }
}
