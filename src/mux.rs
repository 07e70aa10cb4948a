//! Logical channel multiplexer.
//!
//! Presents N independent ordered byte streams over one physical transport.
//! The transport itself is behind the [`PhysicalLink`] trait: the mux tags
//! outbound bytes with a channel index and hands them over; the transport's
//! receive path calls [`ChannelMux::dispatch_inbound`] with whatever it
//! demultiplexed.
//!
//! Channel slots are allocated once at construction. `open`/`close` only
//! toggle the consumer binding — a closed channel keeps its (cleared) queue
//! and can be reopened at any time.
//!
//! Isolation invariant: a full, stalled, or closed channel never blocks or
//! corrupts another. Inbound dispatch never suspends; queue overflow drops
//! bytes and counts them as link errors.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures::future::BoxFuture;
use tokio::sync::Mutex as AsyncMutex;

use crate::buffer::{BoundedBuffer, Readiness};
use crate::error::{Error, Result};
use crate::netmon::LinkStats;

/// Physical transport under the multiplexer.
///
/// Implementations deliver `bytes` to the modem on the given logical
/// channel. The mux serializes calls per channel (holding that channel's
/// write lock across the send), so an implementation only has to keep
/// whatever ordering its own medium needs.
pub trait PhysicalLink: Send + Sync {
    /// Hand bytes tagged with a channel index to the transport.
    fn send(&self, channel: u8, bytes: Bytes) -> BoxFuture<'_, Result<()>>;
}

struct ChannelSlot {
    bound: AtomicBool,
    queue: BoundedBuffer,
    /// Held across the link send so same-channel writes keep submission
    /// order while other channels interleave freely.
    write_lock: AsyncMutex<()>,
}

/// Fixed set of logical channels over one [`PhysicalLink`].
pub struct ChannelMux {
    link: Arc<dyn PhysicalLink>,
    channels: Vec<ChannelSlot>,
    stats: Arc<LinkStats>,
}

impl ChannelMux {
    /// Create a mux with `num_channels` slots of `queue_capacity` bytes each.
    pub fn new(
        link: Arc<dyn PhysicalLink>,
        num_channels: usize,
        queue_capacity: usize,
        stats: Arc<LinkStats>,
    ) -> Self {
        let channels = (0..num_channels)
            .map(|_| ChannelSlot {
                bound: AtomicBool::new(false),
                queue: BoundedBuffer::new(queue_capacity),
                write_lock: AsyncMutex::new(()),
            })
            .collect();
        Self {
            link,
            channels,
            stats,
        }
    }

    /// Number of channel slots.
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Whether a consumer is currently bound to `channel`.
    pub fn is_bound(&self, channel: u8) -> bool {
        self.channels
            .get(channel as usize)
            .is_some_and(|slot| slot.bound.load(Ordering::Acquire))
    }

    /// Bind a consumer to `channel`.
    ///
    /// Fails with `NotFound` for an out-of-range index and `Busy` while a
    /// previous [`ChannelHandle`] is alive. The inbound queue starts empty.
    pub fn open(self: &Arc<Self>, channel: u8) -> Result<ChannelHandle> {
        let slot = self
            .channels
            .get(channel as usize)
            .ok_or(Error::NotFound)?;

        if slot
            .bound
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::Busy);
        }

        slot.queue.reopen();
        Ok(ChannelHandle {
            mux: Arc::clone(self),
            channel,
        })
    }

    /// Enqueue demultiplexed inbound bytes for `channel`'s consumer.
    ///
    /// Called from the transport's receive path; never suspends. With no
    /// bound consumer the bytes are dropped — no consumer means no interest.
    /// Queue overflow drops the excess and counts a link error.
    pub fn dispatch_inbound(&self, channel: u8, bytes: &[u8]) {
        let Some(slot) = self.channels.get(channel as usize) else {
            tracing::warn!(channel, "inbound bytes for out-of-range channel");
            self.stats.record_error();
            return;
        };

        if !slot.bound.load(Ordering::Acquire) {
            tracing::trace!(channel, len = bytes.len(), "dropping inbound bytes, no consumer");
            return;
        }

        match slot.queue.try_write(bytes) {
            Ok(accepted) => {
                self.stats.record_rx(accepted);
                if accepted < bytes.len() {
                    tracing::debug!(
                        channel,
                        dropped = bytes.len() - accepted,
                        "inbound queue overflow"
                    );
                    self.stats.record_error();
                }
            }
            // Full queue or a consumer mid-close; either way the bytes go
            // nowhere and the producer must not stall.
            Err(_) => {
                tracing::debug!(channel, len = bytes.len(), "inbound queue rejected bytes");
                self.stats.record_error();
            }
        }
    }

    async fn write(&self, channel: u8, bytes: &[u8]) -> Result<()> {
        let slot = self
            .channels
            .get(channel as usize)
            .ok_or(Error::NotFound)?;

        let _ordered = slot.write_lock.lock().await;
        match self.link.send(channel, Bytes::copy_from_slice(bytes)).await {
            Ok(()) => {
                self.stats.record_tx(bytes.len());
                Ok(())
            }
            Err(e) => {
                self.stats.record_error();
                Err(e)
            }
        }
    }

    fn release(&self, channel: u8) {
        if let Some(slot) = self.channels.get(channel as usize) {
            // Pending inbound data is discarded with the binding.
            slot.queue.close();
            slot.queue.clear();
            slot.bound.store(false, Ordering::Release);
        }
    }

    /// Tear down all channels: queues close and parked readers return
    /// `Interrupted`. Used on core shutdown.
    pub fn shutdown(&self) {
        for slot in &self.channels {
            slot.queue.close();
        }
    }
}

/// Exclusive consumer binding for one logical channel.
///
/// Dropping the handle closes the channel and discards any queued inbound
/// bytes; the slot can then be reopened.
pub struct ChannelHandle {
    mux: Arc<ChannelMux>,
    channel: u8,
}

impl ChannelHandle {
    /// This handle's channel index.
    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// Read up to `max` inbound bytes, waiting until at least one arrives.
    pub async fn read(&self, max: usize) -> Result<Bytes> {
        self.mux.channels[self.channel as usize].queue.read(max).await
    }

    /// Read up to `max` inbound bytes; `WouldBlock` when the queue is empty.
    pub fn try_read(&self, max: usize) -> Result<Bytes> {
        self.mux.channels[self.channel as usize].queue.try_read(max)
    }

    /// Write bytes to the physical transport on this channel.
    ///
    /// Writes on the same channel preserve submission order; writes on
    /// different channels may interleave.
    pub async fn write(&self, bytes: &[u8]) -> Result<()> {
        self.mux.write(self.channel, bytes).await
    }

    /// Readiness of the inbound queue.
    pub fn readiness(&self) -> Readiness {
        self.mux.channels[self.channel as usize].queue.readiness()
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.mux.release(self.channel);
    }
}
