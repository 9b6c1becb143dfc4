//! Full fork/detach/reap cycles against temporary directory trees.

use std::fs;
use std::path::Path;
use std::time::Duration;

use hare_core::exit::{EXIT_NO_EVENT, EXIT_NO_MATCH};
use hare_core::types::ChildExit;
use hare_core::Configuration;
use hare_daemon::{be_sure, EventChannel, Harness, DEFAULT_CONTENT};
use tempfile::TempDir;

fn config(root: &Path) -> Configuration {
    let mut config = Configuration::new(root.join("watch/"), root.join("watch/processed/"));
    config.poll_interval_ms = 10;
    config.max_idle_polls = Some(500);
    config.require_root = false;
    config
}

fn entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<_> = fs::read_dir(dir)
        .expect("ls")
        .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn harness_run_stamps_and_cleans_up() {
    let dir = TempDir::new().expect("tempdir");
    let harness = Harness::new(config(dir.path()));

    let report = harness.run(b"notes.txt", b"hello").expect("run");

    assert_eq!(report.status, ChildExit::Exited(0), "{report:?}");
    assert!(report.passed(), "{report:?}");
    let processed = report.processed.as_deref().expect("processed path");
    assert!(processed.ends_with("_notes.txt"));
    assert_eq!(entries(&dir.path().join("watch")), ["processed"]);
    assert!(entries(&dir.path().join("watch/processed")).is_empty());
}

#[test]
fn nul_in_test_name_resolves_to_created_file() {
    let dir = TempDir::new().expect("tempdir");
    let harness = Harness::new(config(dir.path()));

    let report = harness.run(b"foo\0bar", DEFAULT_CONTENT).expect("run");

    assert!(report.passed(), "{report:?}");
    assert!(report.source.ends_with("/foo"));
    assert!(report.processed.as_deref().expect("processed").ends_with("_foo"));
}

#[test]
fn run_from_file_reads_raw_base_name() {
    let dir = TempDir::new().expect("tempdir");
    let input = dir.path().join("case.bin");
    fs::write(&input, b"fuzzed-\x01name").expect("write input");
    let harness = Harness::new(config(dir.path()));

    let report = harness.run_from_file(&input, DEFAULT_CONTENT).expect("run");
    assert!(report.passed(), "{report:?}");
}

#[test]
fn closed_channel_exits_with_no_event() {
    let dir = TempDir::new().expect("tempdir");
    let config = config(dir.path());
    hare_daemon::prepare_dirs(&config).expect("dirs");
    let (read, write) = EventChannel::open().expect("open");
    drop(write);

    let (child, _) = be_sure(&config, read, None).expect("start");
    let outcome = child.wait().expect("wait");
    assert_eq!(outcome.exit_code(), EXIT_NO_EVENT);
}

fn signal(pid: hare_core::Pid, signo: i32) {
    // SAFETY: kill(2) on our own child.
    assert_eq!(unsafe { libc::kill(pid.0, signo) }, 0, "kill({signo})");
}

#[test]
fn wait_sees_through_stop_and_continue() {
    let dir = TempDir::new().expect("tempdir");
    let config = config(dir.path());
    hare_daemon::prepare_dirs(&config).expect("dirs");
    let (read, write) = EventChannel::open().expect("open");

    let (child, write) = be_sure(&config, read, Some(write)).expect("start");
    let pid = child.pid();
    signal(pid, libc::SIGSTOP);
    std::thread::sleep(Duration::from_millis(50));
    signal(pid, libc::SIGCONT);
    drop(write);

    let outcome = child.wait().expect("wait");
    assert_eq!(outcome.pid, pid);
    assert_eq!(outcome.status, ChildExit::Exited(EXIT_NO_EVENT));
}

#[test]
fn killed_daemon_reports_signal() {
    let dir = TempDir::new().expect("tempdir");
    let config = config(dir.path());
    hare_daemon::prepare_dirs(&config).expect("dirs");
    let (read, write) = EventChannel::open().expect("open");

    let (child, _write) = be_sure(&config, read, Some(write)).expect("start");
    signal(child.pid(), libc::SIGKILL);

    let outcome = child.wait().expect("wait");
    assert_eq!(outcome.status, ChildExit::Signaled(libc::SIGKILL));
    assert_eq!(outcome.exit_code(), 137);
}

#[test]
fn unknown_file_exits_with_no_match_and_logs() {
    let dir = TempDir::new().expect("tempdir");
    let mut config = config(dir.path());
    let log = dir.path().join("hare-daemon.log");
    config.daemon_log = Some(log.clone());
    hare_daemon::prepare_dirs(&config).expect("dirs");

    let (read, write) = EventChannel::open().expect("open");
    write.write(b"ghost.txt").expect("write");
    let (child, write) = be_sure(&config, read, Some(write)).expect("start");
    drop(write);

    let outcome = child.wait().expect("wait");
    assert_eq!(outcome.exit_code(), EXIT_NO_MATCH);
    let text = fs::read_to_string(&log).expect("daemon log");
    assert!(text.contains("watch loop ended"), "log: {text}");
}
