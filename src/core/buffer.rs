//! Presentable buffer handles.
//!
//! The host owns the actual image memory; the backend only tracks an
//! opaque buffer id plus an externally visible lock count. The producer
//! holds a buffer at count zero, `commit` takes one lock before queueing,
//! and the idle-recycle step drops it again — so the count returns to its
//! pre-commit value exactly once per commit, teardown included.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct BufferInner {
    id: u64,
    width: u32,
    height: u32,
    locks: AtomicI64,
}

/// Shared-ownership handle over one host buffer.
#[derive(Debug, Clone)]
pub struct PresentBuffer {
    inner: Arc<BufferInner>,
}

impl PresentBuffer {
    pub fn new(id: u64, width: u32, height: u32) -> Self {
        Self {
            inner: Arc::new(BufferInner {
                id,
                width,
                height,
                locks: AtomicI64::new(0),
            }),
        }
    }

    /// Opaque host buffer id.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn width(&self) -> u32 {
        self.inner.width
    }

    pub fn height(&self) -> u32 {
        self.inner.height
    }

    /// Take one lock. Producer on the loop thread, consumer on a
    /// presenting thread — hence the atomic.
    pub fn acquire(&self) {
        self.inner.locks.fetch_add(1, Ordering::AcqRel);
    }

    /// Drop one lock.
    pub fn release(&self) {
        let previous = self.inner.locks.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(
            previous > 0,
            "buffer {} lock count went negative",
            self.inner.id
        );
    }

    pub fn lock_count(&self) -> i64 {
        self.inner.locks.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_release_roundtrip() {
        let buffer = PresentBuffer::new(7, 640, 480);
        assert_eq!(buffer.lock_count(), 0);

        buffer.acquire();
        assert_eq!(buffer.lock_count(), 1);

        buffer.release();
        assert_eq!(buffer.lock_count(), 0);
    }

    #[test]
    fn test_clone_shares_count() {
        let buffer = PresentBuffer::new(1, 320, 240);
        let handle = buffer.clone();

        buffer.acquire();
        assert_eq!(handle.lock_count(), 1);
        assert_eq!(handle.id(), 1);

        handle.release();
        assert_eq!(buffer.lock_count(), 0);
    }
}
