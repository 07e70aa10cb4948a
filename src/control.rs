//! User-facing control port.
//!
//! The control port is the simple byte-stream surface the device layer maps
//! to its character device: one open consumer at a time, a bounded ring in
//! each direction, and poll-style readiness for multiplexed I/O.
//!
//! The consumer side goes through [`ControlHandle`] (obtained from
//! [`ControlPort::open`]); the modem-facing plumbing feeds and drains the
//! port directly via [`ControlPort::feed_inbound`] and
//! [`ControlPort::drain_outbound`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;

use crate::buffer::{BoundedBuffer, Readiness};
use crate::error::{Error, Result};

/// Single-open control stream backed by an inbound/outbound buffer pair.
pub struct ControlPort {
    inbound: BoundedBuffer,
    outbound: BoundedBuffer,
    open: AtomicBool,
}

impl ControlPort {
    /// Create a port whose two rings each hold `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            inbound: BoundedBuffer::new(capacity),
            outbound: BoundedBuffer::new(capacity),
            open: AtomicBool::new(false),
        }
    }

    /// Bind the single consumer slot.
    ///
    /// Fails with `Busy` while a previous [`ControlHandle`] is alive.
    /// Dropping the handle frees the slot; buffered data survives the
    /// close/reopen cycle.
    pub fn open(self: &Arc<Self>) -> Result<ControlHandle> {
        if self
            .open
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::Busy);
        }
        Ok(ControlHandle {
            port: Arc::clone(self),
        })
    }

    /// Whether a consumer currently holds the port.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Enqueue modem-originated bytes for the consumer.
    ///
    /// Never suspends; returns the count accepted, or `WouldBlock` when the
    /// inbound ring is full.
    pub fn feed_inbound(&self, bytes: &[u8]) -> Result<usize> {
        self.inbound.try_write(bytes)
    }

    /// Pull consumer-written bytes for delivery to the modem, waiting for at
    /// least one.
    pub async fn drain_outbound(&self, max: usize) -> Result<Bytes> {
        self.outbound.read(max).await
    }

    /// Non-suspending variant of [`drain_outbound`](Self::drain_outbound).
    pub fn try_drain_outbound(&self, max: usize) -> Result<Bytes> {
        self.outbound.try_read(max)
    }

    /// Tear the port down: both rings close and any parked reader or writer
    /// returns `Interrupted`.
    pub fn shutdown(&self) {
        self.inbound.close();
        self.outbound.close();
    }
}

/// Consumer handle for the control port.
///
/// Reads see modem-originated bytes; writes are queued for the modem.
/// Dropping the handle releases the single-open slot.
pub struct ControlHandle {
    port: Arc<ControlPort>,
}

impl ControlHandle {
    /// Read up to `max` bytes, waiting until at least one is available.
    pub async fn read(&self, max: usize) -> Result<Bytes> {
        self.port.inbound.read(max).await
    }

    /// Read up to `max` bytes; `WouldBlock` when nothing is queued.
    pub fn try_read(&self, max: usize) -> Result<Bytes> {
        self.port.inbound.try_read(max)
    }

    /// Write bytes toward the modem, waiting while the outbound ring is full.
    /// Returns the count accepted (short writes are reported precisely).
    pub async fn write(&self, bytes: &[u8]) -> Result<usize> {
        self.port.outbound.write(bytes).await
    }

    /// Non-suspending write; `WouldBlock` when the outbound ring is full.
    pub fn try_write(&self, bytes: &[u8]) -> Result<usize> {
        self.port.outbound.try_write(bytes)
    }

    /// Poll-style readiness: readable from the inbound ring, writable from
    /// the outbound ring.
    pub fn readiness(&self) -> Readiness {
        Readiness {
            readable: self.port.inbound.readiness().readable,
            writable: self.port.outbound.readiness().writable,
        }
    }
}

impl Drop for ControlHandle {
    fn drop(&mut self) {
        self.port.open.store(false, Ordering::Release);
    }
}
