//! Link statistics for the monitoring endpoint.
//!
//! Counters are plain atomics so the hot paths (inbound dispatch, channel
//! writes) can bump them without taking a lock. A read of the monitoring
//! endpoint takes a coherent-enough snapshot and serializes it as a
//! fixed-size big-endian record, truncated to the caller's requested length
//! when shorter.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};

use bytes::{BufMut, Bytes, BytesMut};

/// Live packet/byte/error counters plus the last observed radio state.
#[derive(Debug, Default)]
pub struct LinkStats {
    rx_packets: AtomicU64,
    tx_packets: AtomicU64,
    rx_bytes: AtomicU64,
    tx_bytes: AtomicU64,
    errors: AtomicU64,
    signal_strength: AtomicU8,
    network_type: AtomicU8,
    registered: AtomicBool,
}

impl LinkStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one inbound unit of `len` bytes.
    pub fn record_rx(&self, len: usize) {
        self.rx_packets.fetch_add(1, Ordering::Relaxed);
        self.rx_bytes.fetch_add(len as u64, Ordering::Relaxed);
    }

    /// Count one outbound unit of `len` bytes.
    pub fn record_tx(&self, len: usize) {
        self.tx_packets.fetch_add(1, Ordering::Relaxed);
        self.tx_bytes.fetch_add(len as u64, Ordering::Relaxed);
    }

    /// Count a drop or delivery failure.
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the latest signal strength sample.
    pub fn set_signal_strength(&self, strength: u8) {
        self.signal_strength.store(strength, Ordering::Relaxed);
    }

    /// Record the latest network registration state.
    pub fn set_network(&self, network_type: u8, registered: bool) {
        self.network_type.store(network_type, Ordering::Relaxed);
        self.registered.store(registered, Ordering::Relaxed);
    }

    /// Take a snapshot of all fields.
    pub fn snapshot(&self) -> StatsRecord {
        StatsRecord {
            rx_packets: self.rx_packets.load(Ordering::Relaxed),
            tx_packets: self.tx_packets.load(Ordering::Relaxed),
            rx_bytes: self.rx_bytes.load(Ordering::Relaxed),
            tx_bytes: self.tx_bytes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            signal_strength: self.signal_strength.load(Ordering::Relaxed),
            network_type: self.network_type.load(Ordering::Relaxed),
            registered: self.registered.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time statistics record (43 bytes on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsRecord {
    pub rx_packets: u64,
    pub tx_packets: u64,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub errors: u64,
    pub signal_strength: u8,
    pub network_type: u8,
    pub registered: bool,
}

impl StatsRecord {
    pub const SIZE: usize = 43;

    /// Serialize the full record, big-endian.
    pub fn serialize(&self, buf: &mut impl BufMut) {
        buf.put_u64(self.rx_packets);
        buf.put_u64(self.tx_packets);
        buf.put_u64(self.rx_bytes);
        buf.put_u64(self.tx_bytes);
        buf.put_u64(self.errors);
        buf.put_u8(self.signal_strength);
        buf.put_u8(self.network_type);
        buf.put_u8(u8::from(self.registered));
    }

    /// Serialize the record truncated to `max_len` bytes, the behavior of a
    /// short read on the monitoring endpoint.
    pub fn read_into(&self, max_len: usize) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::SIZE);
        self.serialize(&mut buf);
        buf.truncate(max_len);
        buf.freeze()
    }
}
