//! Readiness primitives consumable by the compositor's poll loop.
//!
//! All cross-thread traffic in this backend signals the loop thread through
//! an `eventfd(2)`: the event bridge uses semaphore mode so one wake unit
//! is observed per queued event, the presentation pipeline uses counter
//! mode so one read drains a whole completion pass. The raw fd is exposed
//! for the compositor's readiness polling; the loop thread never blocks on
//! it directly.

use std::io;
use std::os::unix::io::RawFd;

pub struct WakeFd {
    fd: RawFd,
}

impl WakeFd {
    /// Counting-semaphore wake: every `consume()` observes exactly one
    /// pending unit.
    pub fn semaphore() -> io::Result<Self> {
        Self::create(libc::EFD_CLOEXEC | libc::EFD_NONBLOCK | libc::EFD_SEMAPHORE)
    }

    /// Plain counter wake: `consume()` observes and clears all pending
    /// units at once.
    pub fn counter() -> io::Result<Self> {
        Self::create(libc::EFD_CLOEXEC | libc::EFD_NONBLOCK)
    }

    fn create(flags: libc::c_int) -> io::Result<Self> {
        let fd = unsafe { libc::eventfd(0, flags) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { fd })
    }

    /// Add `count` wake units.
    pub fn signal(&self, count: u64) -> io::Result<()> {
        let buf = count.to_ne_bytes();
        let written = unsafe { libc::write(self.fd, buf.as_ptr().cast(), buf.len()) };
        if written != buf.len() as isize {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Consume pending wake units. Returns `None` when nothing is pending.
    pub fn consume(&self) -> Option<u64> {
        let mut buf = [0u8; 8];
        let read = unsafe { libc::read(self.fd, buf.as_mut_ptr().cast(), buf.len()) };
        if read != buf.len() as isize {
            return None;
        }
        Some(u64::from_ne_bytes(buf))
    }

    /// File descriptor for the compositor's poll loop.
    pub fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for WakeFd {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}
