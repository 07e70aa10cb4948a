//! Bounded byte ring with blocking and fail-fast semantics.
//!
//! [`BoundedBuffer`] is the single-producer/single-consumer queue underneath
//! every byte stream the core exposes: each logical channel's inbound queue
//! and both directions of the control port. Capacity is fixed at
//! construction; the ring is never reallocated.
//!
//! Two wait conditions drive the blocking variants: "data available" for
//! readers and "space available" for writers. The internal lock is held only
//! across the in-memory cursor update — a suspended reader or writer parks on
//! a [`Notify`] outside the lock, so producers are never stalled by a slow
//! consumer's wait.
//!
//! Single-reader/single-writer use is assumed (the owning channel or port
//! rejects a second open with `Busy`); wakeups use the one-permit
//! `notify_one` discipline, which cannot lose a wakeup under that contract.

use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use tokio::sync::Notify;

use crate::error::{Error, Result};

/// Snapshot readiness of a buffer, as a poll-style bitpair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Readiness {
    /// At least one byte can be read without blocking.
    pub readable: bool,
    /// At least one byte can be written without blocking.
    pub writable: bool,
}

struct Ring {
    buf: Box<[u8]>,
    read_pos: usize,
    occupied: usize,
    closed: bool,
}

impl Ring {
    fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Copy up to `bytes.len()` bytes in, bounded by free space.
    fn push(&mut self, bytes: &[u8]) -> usize {
        let cap = self.capacity();
        let n = bytes.len().min(cap - self.occupied);
        let write_pos = (self.read_pos + self.occupied) % cap;

        let first = n.min(cap - write_pos);
        self.buf[write_pos..write_pos + first].copy_from_slice(&bytes[..first]);
        let second = n - first;
        self.buf[..second].copy_from_slice(&bytes[first..n]);

        self.occupied += n;
        n
    }

    /// Remove and return up to `max` bytes, in FIFO order.
    fn take(&mut self, max: usize) -> Bytes {
        let cap = self.capacity();
        let n = max.min(self.occupied);
        let mut out = Vec::with_capacity(n);

        let first = n.min(cap - self.read_pos);
        out.extend_from_slice(&self.buf[self.read_pos..self.read_pos + first]);
        let second = n - first;
        out.extend_from_slice(&self.buf[..second]);

        self.read_pos = (self.read_pos + n) % cap;
        self.occupied -= n;
        Bytes::from(out)
    }
}

/// Fixed-capacity byte ring with blocking and non-blocking access.
///
/// Invariant: `0 <= occupied <= capacity`, and bytes come out in exactly the
/// order they went in — no loss or duplication across wraparound.
pub struct BoundedBuffer {
    ring: Mutex<Ring>,
    readable: Notify,
    writable: Notify,
}

impl BoundedBuffer {
    /// Create a buffer holding at most `capacity` bytes.
    ///
    /// `capacity` is clamped to at least 1 byte.
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: Mutex::new(Ring {
                buf: vec![0u8; capacity.max(1)].into_boxed_slice(),
                read_pos: 0,
                occupied: 0,
                closed: false,
            }),
            readable: Notify::new(),
            writable: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Ring> {
        self.ring.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Total byte capacity.
    pub fn capacity(&self) -> usize {
        self.lock().capacity()
    }

    /// Bytes currently buffered.
    pub fn occupied(&self) -> usize {
        self.lock().occupied
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Non-blocking readiness snapshot.
    ///
    /// A closed buffer reports neither readable nor writable.
    pub fn readiness(&self) -> Readiness {
        let ring = self.lock();
        if ring.closed {
            return Readiness::default();
        }
        Readiness {
            readable: ring.occupied > 0,
            writable: ring.occupied < ring.capacity(),
        }
    }

    /// Accept up to `bytes.len()` bytes without suspending.
    ///
    /// Fails with `WouldBlock` when the ring is completely full; otherwise
    /// accepts what fits and returns the exact count (short writes are legal
    /// and reported precisely).
    pub fn try_write(&self, bytes: &[u8]) -> Result<usize> {
        if bytes.is_empty() {
            return Ok(0);
        }
        let mut ring = self.lock();
        if ring.closed {
            return Err(Error::Interrupted);
        }
        if ring.occupied == ring.capacity() {
            return Err(Error::WouldBlock);
        }
        let n = ring.push(bytes);
        drop(ring);
        self.readable.notify_one();
        Ok(n)
    }

    /// Accept up to `bytes.len()` bytes, waiting while the ring is full.
    ///
    /// Once at least one byte of space frees, accepts what fits and returns
    /// the count. A wait aborted by [`close`](Self::close) returns
    /// `Interrupted`.
    pub async fn write(&self, bytes: &[u8]) -> Result<usize> {
        if bytes.is_empty() {
            return Ok(0);
        }
        loop {
            {
                let mut ring = self.lock();
                if ring.closed {
                    return Err(Error::Interrupted);
                }
                if ring.occupied < ring.capacity() {
                    let n = ring.push(bytes);
                    drop(ring);
                    self.readable.notify_one();
                    return Ok(n);
                }
            }
            self.writable.notified().await;
        }
    }

    /// Remove and return up to `max` bytes without suspending.
    ///
    /// Fails with `WouldBlock` when nothing is buffered.
    pub fn try_read(&self, max: usize) -> Result<Bytes> {
        if max == 0 {
            return Ok(Bytes::new());
        }
        let mut ring = self.lock();
        if ring.closed {
            return Err(Error::Interrupted);
        }
        if ring.occupied == 0 {
            return Err(Error::WouldBlock);
        }
        let out = ring.take(max);
        drop(ring);
        self.writable.notify_one();
        Ok(out)
    }

    /// Remove and return up to `max` bytes, waiting for at least one.
    ///
    /// A wait aborted by [`close`](Self::close) returns `Interrupted`.
    pub async fn read(&self, max: usize) -> Result<Bytes> {
        if max == 0 {
            return Ok(Bytes::new());
        }
        loop {
            {
                let mut ring = self.lock();
                if ring.closed {
                    return Err(Error::Interrupted);
                }
                if ring.occupied > 0 {
                    let out = ring.take(max);
                    drop(ring);
                    self.writable.notify_one();
                    return Ok(out);
                }
            }
            self.readable.notified().await;
        }
    }

    /// Discard all buffered bytes. The buffer stays usable.
    pub fn clear(&self) {
        let mut ring = self.lock();
        ring.read_pos = 0;
        ring.occupied = 0;
        drop(ring);
        self.writable.notify_one();
    }

    /// Close the buffer and wake any parked reader or writer.
    ///
    /// In-flight and subsequent operations return `Interrupted`.
    pub fn close(&self) {
        let mut ring = self.lock();
        ring.closed = true;
        drop(ring);
        self.readable.notify_one();
        self.writable.notify_one();
    }

    /// Reopen a closed buffer, discarding anything still buffered.
    ///
    /// Used by channel slots, which are allocated once and recycled across
    /// open/close cycles.
    pub(crate) fn reopen(&self) {
        let mut ring = self.lock();
        ring.closed = false;
        ring.read_pos = 0;
        ring.occupied = 0;
    }
}
