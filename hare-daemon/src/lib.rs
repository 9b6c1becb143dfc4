//! HARE daemon: the event channel, the forked watcher and the test harness.
//!
//! - [`channel`]: non-blocking pipe standing in for a filesystem-event source
//! - [`supervisor`]: fork, detach, reap
//! - [`watch`]: the child's single-event loop
//! - [`harness`]: end-to-end driver used by the `hare run` command

pub mod channel;
mod error;
pub mod harness;
pub mod log_rotation;
pub mod logging;
pub mod paths;
pub mod supervisor;
pub mod watch;

pub use channel::{EventChannel, ReadEnd, WriteEnd, PIPE_READ_CAP};
pub use error::DaemonError;
pub use harness::{prepare_dirs, Harness, HarnessReport, DEFAULT_CONTENT};
pub use logging::init_tracing;
pub use supervisor::{be_sure, detach, spawn_child, ChildHandle, DetachReport, ProcessRole};
pub use watch::{process_one_event, resolve_source, run_watch_loop, DaemonSession};
