//! Self-pipe relay
//!
//! The OS handler installed for every relayed signal is `relay_handler`.
//! It runs in signal context and does exactly one thing: write the signal
//! number into the relay pipe. Everything else happens later, on the event
//! loop thread, when the read end polls readable.
//!
//! The pipe is non-blocking so a full pipe drops the delivery instead of
//! stalling the handler, and close-on-exec so an exec'd program never
//! inherits it.

use crate::constants::RECORD_SIZE;
use crate::os;
use sigrelay_core::{SignalError, SignalResult, Signo};

use nix::fcntl::OFlag;
use std::os::unix::io::{AsRawFd, OwnedFd, RawFd};
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};

/// Write end read by `relay_handler`; -1 when no relay is live
static RELAY_WRITE_FD: AtomicI32 = AtomicI32::new(-1);

/// Deliveries the handler failed to write
static WRITE_FAILURES: AtomicUsize = AtomicUsize::new(0);

/// errno of the most recent failed write (0 for a short write)
static LAST_WRITE_ERRNO: AtomicI32 = AtomicI32::new(0);

/// The OS signal handler
///
/// No allocation, no logging, no locks. A failed or short write is only
/// counted; `take_write_failures` reports it outside signal context.
pub(crate) extern "C" fn relay_handler(signo: libc::c_int) {
    let errno = os::errno_location();
    let saved = unsafe { *errno };

    let fd = RELAY_WRITE_FD.load(Ordering::Relaxed);
    let ret = unsafe {
        libc::write(
            fd,
            &signo as *const libc::c_int as *const libc::c_void,
            RECORD_SIZE,
        )
    };
    if ret != RECORD_SIZE as isize {
        let err = if ret < 0 { unsafe { *errno } } else { 0 };
        LAST_WRITE_ERRNO.store(err, Ordering::Relaxed);
        WRITE_FAILURES.fetch_add(1, Ordering::Relaxed);
    }

    unsafe { *errno = saved };
}

/// Address of `relay_handler` in the form `sigaction` expects
#[inline]
pub(crate) fn relay_handler_addr() -> libc::sighandler_t {
    relay_handler as extern "C" fn(libc::c_int) as libc::sighandler_t
}

/// Drain the failure counter: (failed deliveries, last errno)
///
/// `(0, 0)` when nothing was lost since the previous call.
pub fn take_write_failures() -> (usize, i32) {
    let count = WRITE_FAILURES.swap(0, Ordering::Relaxed);
    if count == 0 {
        return (0, 0);
    }
    (count, LAST_WRITE_ERRNO.swap(0, Ordering::Relaxed))
}

/// Create a non-blocking, close-on-exec pipe
fn open_pipe() -> nix::Result<(OwnedFd, OwnedFd)> {
    cfg_if::cfg_if! {
        if #[cfg(any(
            target_os = "linux",
            target_os = "android",
            target_os = "freebsd",
            target_os = "netbsd",
            target_os = "openbsd",
            target_os = "dragonfly",
        ))] {
            nix::unistd::pipe2(OFlag::O_NONBLOCK | OFlag::O_CLOEXEC)
        } else {
            use nix::fcntl::{fcntl, FcntlArg, FdFlag};

            let (read, write) = nix::unistd::pipe()?;
            for fd in [read.as_raw_fd(), write.as_raw_fd()] {
                let fl = OFlag::from_bits_truncate(fcntl(fd, FcntlArg::F_GETFL)?);
                fcntl(fd, FcntlArg::F_SETFL(fl | OFlag::O_NONBLOCK))?;
                let fd_fl = FdFlag::from_bits_truncate(fcntl(fd, FcntlArg::F_GETFD)?);
                fcntl(fd, FcntlArg::F_SETFD(fd_fl | FdFlag::FD_CLOEXEC))?;
            }
            Ok((read, write))
        }
    }
}

/// The relay pipe
///
/// Owns both descriptors. At most one channel is published to the handler
/// at a time; see `publish`.
#[derive(Debug)]
pub struct RelayChannel {
    read: Option<OwnedFd>,
    write: Option<OwnedFd>,
}

impl RelayChannel {
    /// Open a fresh channel
    pub fn open() -> SignalResult<Self> {
        let (read, write) = open_pipe().map_err(|e| SignalError::RelayCreate(e as i32))?;
        Ok(Self {
            read: Some(read),
            write: Some(write),
        })
    }

    /// A channel with both ends invalid
    pub const fn closed() -> Self {
        Self { read: None, write: None }
    }

    pub fn read_fd(&self) -> Option<RawFd> {
        self.read.as_ref().map(|fd| fd.as_raw_fd())
    }

    pub fn write_fd(&self) -> Option<RawFd> {
        self.write.as_ref().map(|fd| fd.as_raw_fd())
    }

    pub fn is_open(&self) -> bool {
        self.read.is_some() || self.write.is_some()
    }

    /// Point the signal handler at this channel's write end
    pub(crate) fn publish(&self) {
        RELAY_WRITE_FD.store(self.write_fd().unwrap_or(-1), Ordering::Release);
    }

    /// Detach the handler from any channel
    pub(crate) fn unpublish() {
        RELAY_WRITE_FD.store(-1, Ordering::Release);
    }

    /// Read one signal record
    ///
    /// `None` when the pipe holds less than one full record or the read end
    /// is closed.
    pub fn read_record(&self) -> Option<Signo> {
        let fd = self.read_fd()?;
        let mut buf = [0u8; RECORD_SIZE];
        loop {
            let n = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, RECORD_SIZE) };
            if n == RECORD_SIZE as isize {
                return Some(Signo::from_ne_bytes(buf));
            }
            if n < 0 && os::last_errno() == libc::EINTR {
                continue;
            }
            return None;
        }
    }

    /// Whether a record is waiting, without consuming it
    pub fn is_pending(&self) -> bool {
        let Some(fd) = self.read_fd() else {
            return false;
        };
        let mut pfd = libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        };
        let rc = unsafe { libc::poll(&mut pfd, 1, 0) };
        rc > 0 && (pfd.revents & libc::POLLIN) != 0
    }

    /// Close each end whose descriptor number is `>= min_fd`
    ///
    /// Lower descriptors are left alone; they are being remapped by the
    /// caller (standard streams before exec).
    pub fn close_above(&mut self, min_fd: RawFd) {
        if self.write_fd().is_some_and(|fd| fd >= min_fd) {
            if RELAY_WRITE_FD.load(Ordering::Acquire) == self.write_fd().unwrap_or(-1) {
                Self::unpublish();
            }
            self.write = None;
        }
        if self.read_fd().is_some_and(|fd| fd >= min_fd) {
            self.read = None;
        }
    }

    /// Close both ends
    pub fn close(&mut self) {
        self.close_above(RawFd::MIN);
    }
}

impl Default for RelayChannel {
    fn default() -> Self {
        Self::closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_record(channel: &RelayChannel, signo: Signo) {
        let fd = channel.write_fd().unwrap();
        let ret = unsafe {
            libc::write(fd, &signo as *const Signo as *const libc::c_void, RECORD_SIZE)
        };
        assert_eq!(ret, RECORD_SIZE as isize);
    }

    #[test]
    fn test_open_is_nonblocking_cloexec() {
        let channel = RelayChannel::open().unwrap();
        for fd in [channel.read_fd().unwrap(), channel.write_fd().unwrap()] {
            let fl = unsafe { libc::fcntl(fd, libc::F_GETFL) };
            assert!(fl & libc::O_NONBLOCK != 0);
            let fd_fl = unsafe { libc::fcntl(fd, libc::F_GETFD) };
            assert!(fd_fl & libc::FD_CLOEXEC != 0);
        }
    }

    #[test]
    fn test_records_fifo() {
        let channel = RelayChannel::open().unwrap();
        assert!(!channel.is_pending());
        assert_eq!(channel.read_record(), None);

        write_record(&channel, libc::SIGHUP);
        write_record(&channel, libc::SIGTERM);
        assert!(channel.is_pending());

        assert_eq!(channel.read_record(), Some(libc::SIGHUP));
        assert_eq!(channel.read_record(), Some(libc::SIGTERM));
        assert_eq!(channel.read_record(), None);
        assert!(!channel.is_pending());
    }

    #[test]
    fn test_partial_record_is_not_read() {
        let channel = RelayChannel::open().unwrap();
        let byte = 1u8;
        let ret = unsafe {
            libc::write(channel.write_fd().unwrap(), &byte as *const u8 as *const libc::c_void, 1)
        };
        assert_eq!(ret, 1);
        assert_eq!(channel.read_record(), None);
    }

    #[test]
    fn test_close_above_threshold() {
        let mut channel = RelayChannel::open().unwrap();
        let read = channel.read_fd().unwrap();
        let write = channel.write_fd().unwrap();

        channel.close_above(read.max(write) + 1);
        assert_eq!(channel.read_fd(), Some(read));
        assert_eq!(channel.write_fd(), Some(write));

        channel.close_above(read.max(write));
        assert!(channel.read_fd().is_some() != channel.write_fd().is_some());

        channel.close();
        assert!(!channel.is_open());
        assert_eq!(channel.read_record(), None);
        assert!(!channel.is_pending());
    }

    #[test]
    fn test_closed_channel() {
        let channel = RelayChannel::closed();
        assert_eq!(channel.read_fd(), None);
        assert_eq!(channel.write_fd(), None);
        assert!(!channel.is_open());
    }
}
