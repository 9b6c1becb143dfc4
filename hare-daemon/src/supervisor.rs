//! Daemon lifecycle: fork, detach, reap.
//!
//! ```text
//! be_sure ─ fork ─┬─ parent: ChildHandle ── wait() ── DaemonOutcome
//!                 └─ child:  detach ── run_watch_loop ── _exit(code)
//! ```

use std::fs::OpenOptions;
use std::io;
use std::os::fd::IntoRawFd;

use hare_core::types::{ChildExit, DaemonOutcome, Pid};
use hare_core::Configuration;

use crate::channel::{ReadEnd, WriteEnd};
use crate::error::{io_err, DaemonError};
use crate::logging;
use crate::paths::{absolutize_config, DAEMON_ROOT_DIR, DEV_NULL};
use crate::watch::{run_watch_loop, DaemonSession};

/// Which side of a `fork(2)` we are on.
#[derive(Debug)]
pub enum ProcessRole {
    Parent(ChildHandle),
    Child,
}

/// The parent's handle on a forked daemon.
#[derive(Debug)]
pub struct ChildHandle {
    pid: Pid,
}

impl ChildHandle {
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Block until the child exits or is killed.
    ///
    /// Stop and continue notifications are logged and waited through. The
    /// child's own failure is reported in the outcome; `Err` means `waitpid`
    /// itself failed.
    pub fn wait(self) -> Result<DaemonOutcome, DaemonError> {
        let mut status: libc::c_int = 0;
        loop {
            // SAFETY: `status` is a live out-parameter for the duration of the call.
            let rc = unsafe {
                libc::waitpid(self.pid.0, &mut status, libc::WUNTRACED | libc::WCONTINUED)
            };
            if rc < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(DaemonError::Wait {
                    pid: self.pid,
                    source: err,
                });
            }

            let exit = if libc::WIFEXITED(status) {
                ChildExit::Exited(libc::WEXITSTATUS(status))
            } else if libc::WIFSIGNALED(status) {
                ChildExit::Signaled(libc::WTERMSIG(status))
            } else {
                if libc::WIFSTOPPED(status) {
                    let signal = libc::WSTOPSIG(status);
                    tracing::debug!(pid = %self.pid, signal, "daemon stopped");
                } else if libc::WIFCONTINUED(status) {
                    tracing::debug!(pid = %self.pid, "daemon continued");
                }
                continue;
            };

            let outcome = DaemonOutcome {
                pid: self.pid,
                status: exit,
            };
            tracing::info!(pid = %self.pid, exit_code = outcome.exit_code(), "daemon reaped");
            return Ok(outcome);
        }
    }
}

/// `fork(2)`.
pub fn spawn_child() -> Result<ProcessRole, DaemonError> {
    // SAFETY: the child only runs the watch loop and leaves through `_exit`.
    match unsafe { libc::fork() } {
        -1 => Err(DaemonError::Fork(io::Error::last_os_error())),
        0 => Ok(ProcessRole::Child),
        pid => Ok(ProcessRole::Parent(ChildHandle { pid: Pid(pid) })),
    }
}

// ---------------------------------------------------------------------------
// Detach
// ---------------------------------------------------------------------------

/// Detach steps that failed, in the order they ran.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetachReport {
    pub failed: Vec<&'static str>,
}

impl DetachReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

type DetachStep = (&'static str, fn() -> io::Result<()>);

const DETACH_STEPS: [DetachStep; 4] = [
    ("umask", reset_umask),
    ("setsid", new_session),
    ("chdir", chdir_root),
    ("redirect_stdio", redirect_stdio),
];

/// Run every detach step in order.
///
/// A failed step is logged and skipped; the daemon keeps going half-attached.
pub fn detach() -> DetachReport {
    let mut report = DetachReport::default();
    for (name, step) in DETACH_STEPS {
        if let Err(err) = step() {
            tracing::warn!(step = name, error = %err, "detach step failed, continuing");
            report.failed.push(name);
        }
    }
    tracing::debug!(failed = ?report.failed, "detach finished");
    report
}

fn reset_umask() -> io::Result<()> {
    // SAFETY: umask(2) cannot fail.
    unsafe { libc::umask(0) };
    Ok(())
}

fn new_session() -> io::Result<()> {
    // SAFETY: no arguments.
    if unsafe { libc::setsid() } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn chdir_root() -> io::Result<()> {
    std::env::set_current_dir(DAEMON_ROOT_DIR)
}

fn redirect_stdio() -> io::Result<()> {
    let null = OpenOptions::new().read(true).write(true).open(DEV_NULL)?;
    let fd = null.into_raw_fd();
    let mut result = Ok(());
    for target in [libc::STDIN_FILENO, libc::STDOUT_FILENO, libc::STDERR_FILENO] {
        // SAFETY: both descriptors are open; dup2 closes `target` first.
        if unsafe { libc::dup2(fd, target) } < 0 {
            result = Err(io::Error::last_os_error());
            break;
        }
    }
    // /dev/null may itself have landed on 0..=2.
    if fd > libc::STDERR_FILENO {
        // SAFETY: `fd` came from `into_raw_fd` and is closed exactly once.
        unsafe { libc::close(fd) };
    }
    result
}

// ---------------------------------------------------------------------------
// be_sure
// ---------------------------------------------------------------------------

/// Start the daemon.
///
/// In the parent this returns the child handle along with `write` so the
/// caller decides when to close it. In the child it never returns.
pub fn be_sure(
    config: &Configuration,
    read: ReadEnd,
    write: Option<WriteEnd>,
) -> Result<(ChildHandle, Option<WriteEnd>), DaemonError> {
    config.validate()?;
    let config = absolutize_config(config).map_err(|e| io_err(&config.watched_dir, e))?;

    // SAFETY: geteuid(2) cannot fail.
    if config.require_root && unsafe { libc::geteuid() } != 0 {
        return Err(DaemonError::NotRoot);
    }

    match spawn_child()? {
        ProcessRole::Parent(child) => {
            drop(read);
            tracing::info!(
                pid = %child.pid(),
                watched = %config.watched_dir.display(),
                processed = %config.process_dir.display(),
                "daemon started"
            );
            Ok((child, write))
        }
        ProcessRole::Child => {
            // The parent's copy is the only writer left, so its close is our EOF.
            drop(write);
            let session = DaemonSession::new(config, read);
            exit_child(run_daemon(&session))
        }
    }
}

fn run_daemon(session: &DaemonSession) -> i32 {
    let body = || {
        detach();
        run_watch_loop(session)
    };
    match session.config().daemon_log.as_deref() {
        None => body(),
        Some(path) => match logging::daemon_subscriber(path) {
            Ok(subscriber) => tracing::subscriber::with_default(subscriber, body),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "daemon log unavailable");
                body()
            }
        },
    }
}

fn exit_child(code: i32) -> ! {
    // SAFETY: `_exit` skips atexit handlers and stdio flushes that belong to the parent.
    unsafe { libc::_exit(code) }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
