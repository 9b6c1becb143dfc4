//! Event channel: a one-way OS pipe standing in for a filesystem-event source.
//!
//! Wire format is raw bytes with no framing. One `write(2)` on the sender is
//! one message; the reader drains whatever is buffered, one byte at a time,
//! up to [`PIPE_READ_CAP`] bytes per call. Byte-wise reads never consume
//! past what is buffered, which is fine for a single filename-sized message.

use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

use hare_core::types::Event;

use crate::error::DaemonError;

/// Maximum bytes returned by a single [`ReadEnd::read`].
pub const PIPE_READ_CAP: usize = 2048;

/// Constructor for the two ends of an event pipe.
pub struct EventChannel;

impl EventChannel {
    /// Create a pipe whose read end is non-blocking.
    pub fn open() -> Result<(ReadEnd, WriteEnd), DaemonError> {
        let mut fds: [libc::c_int; 2] = [-1, -1];
        // SAFETY: `fds` has room for the two descriptors pipe(2) writes.
        if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
            return Err(channel_err("pipe"));
        }
        // SAFETY: pipe(2) succeeded, so both descriptors are open and ours alone.
        let (read, write) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };

        set_nonblocking(read.as_raw_fd())?;
        tracing::debug!(read_fd = fds[0], write_fd = fds[1], "event channel opened");
        Ok((ReadEnd { fd: read }, WriteEnd { fd: write }))
    }
}

/// Receiving side. Closed on drop.
#[derive(Debug)]
pub struct ReadEnd {
    fd: OwnedFd,
}

/// Sending side. Closed on drop.
#[derive(Debug)]
pub struct WriteEnd {
    fd: OwnedFd,
}

impl WriteEnd {
    /// Send `bytes` with a single `write(2)`.
    ///
    /// A partial write is reported as [`DaemonError::ShortWrite`] and is not
    /// retried.
    pub fn write(&self, bytes: &[u8]) -> Result<(), DaemonError> {
        if bytes.is_empty() {
            return Err(DaemonError::InvalidInput("refusing to send an empty event".into()));
        }
        // SAFETY: the pointer/length pair describes the live `bytes` slice.
        let written = unsafe {
            libc::write(self.fd.as_raw_fd(), bytes.as_ptr().cast(), bytes.len())
        };
        if written < 0 {
            return Err(channel_err("write"));
        }
        let written = written as usize;
        if written != bytes.len() {
            return Err(DaemonError::ShortWrite {
                written,
                expected: bytes.len(),
            });
        }
        tracing::debug!(bytes = written, "event written");
        Ok(())
    }

    pub fn send(&self, event: &Event) -> Result<(), DaemonError> {
        self.write(&event.payload)
    }
}

impl ReadEnd {
    /// Drain the pipe.
    ///
    /// - `Ok(None)`: nothing buffered right now.
    /// - `Ok(Some(bytes))`: everything buffered (capped at [`PIPE_READ_CAP`]);
    ///   empty when the writer side is closed and nothing was left.
    pub fn read(&self) -> Result<Option<Vec<u8>>, DaemonError> {
        let mut buf = Vec::with_capacity(PIPE_READ_CAP);
        let mut byte = 0u8;

        while buf.len() < PIPE_READ_CAP {
            // SAFETY: reads at most one byte into the local `byte`.
            let n = unsafe {
                libc::read(self.fd.as_raw_fd(), (&mut byte as *mut u8).cast(), 1)
            };
            match n {
                1 => buf.push(byte),
                0 => break,
                _ => {
                    let err = io::Error::last_os_error();
                    match err.kind() {
                        io::ErrorKind::Interrupted => continue,
                        io::ErrorKind::WouldBlock if buf.is_empty() => return Ok(None),
                        io::ErrorKind::WouldBlock => break,
                        _ => {
                            return Err(DaemonError::Channel {
                                op: "read",
                                source: err,
                            })
                        }
                    }
                }
            }
        }
        Ok(Some(buf))
    }

    pub fn read_event(&self) -> Result<Option<Event>, DaemonError> {
        Ok(self.read()?.map(Event::new))
    }
}

impl AsRawFd for ReadEnd {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

impl AsRawFd for WriteEnd {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

fn set_nonblocking(fd: RawFd) -> Result<(), DaemonError> {
    // SAFETY: fcntl on a descriptor we own; no pointers involved.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(channel_err("fcntl(F_GETFL)"));
    }
    // SAFETY: as above.
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
        return Err(channel_err("fcntl(F_SETFL)"));
    }
    Ok(())
}

fn channel_err(op: &'static str) -> DaemonError {
    DaemonError::Channel {
        op,
        source: io::Error::last_os_error(),
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pipe_reads_none_without_blocking() {
        let (read, _write) = EventChannel::open().expect("open");
        for _ in 0..3 {
            assert_eq!(read.read().expect("read"), None);
        }
    }

    #[test]
    fn single_write_reads_back_whole() {
        let (read, write) = EventChannel::open().expect("open");
        write.write(b"/tmp/watch/notes.txt").expect("write");
        assert_eq!(read.read().expect("read"), Some(b"/tmp/watch/notes.txt".to_vec()));
        assert_eq!(read.read().expect("read"), None);
    }

    #[test]
    fn nul_bytes_survive_the_pipe() {
        let (read, write) = EventChannel::open().expect("open");
        write.write(b"foo\0bar").expect("write");
        let event = read.read_event().expect("read").expect("event");
        assert_eq!(event.len(), 7);
        assert_eq!(event.until_nul(), b"foo");
    }

    #[test]
    fn reads_are_capped() {
        let (read, write) = EventChannel::open().expect("open");
        let payload: Vec<u8> = (0..3000u32).map(|i| (i % 251) as u8).collect();
        write.write(&payload).expect("write");

        let first = read.read().expect("read").expect("first chunk");
        let second = read.read().expect("read").expect("second chunk");
        assert_eq!(first.len(), PIPE_READ_CAP);
        assert_eq!(second.len(), 3000 - PIPE_READ_CAP);
        assert_eq!([first, second].concat(), payload);
        assert_eq!(read.read().expect("read"), None);
    }

    #[test]
    fn writes_concatenate() {
        let (read, write) = EventChannel::open().expect("open");
        write.write(b"abc").expect("write");
        write.write(b"def").expect("write");
        assert_eq!(read.read().expect("read"), Some(b"abcdef".to_vec()));
    }

    #[test]
    fn closed_writer_reads_empty() {
        let (read, write) = EventChannel::open().expect("open");
        drop(write);
        assert_eq!(read.read().expect("read"), Some(Vec::new()));
    }

    #[test]
    fn empty_write_is_rejected() {
        let (_read, write) = EventChannel::open().expect("open");
        assert!(matches!(write.write(b""), Err(DaemonError::InvalidInput(_))));
    }
}
