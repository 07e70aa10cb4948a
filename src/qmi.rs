//! Reference QMI-flavored driver binding.
//!
//! [`QmiDriver`] is the concrete [`DriverBinding`] for modems that speak the
//! control framing of [`wire`](crate::wire) over logical channel 0. It is
//! also the worked example of how a binding composes the core's pieces:
//!
//! - `init` opens the command channel and spawns a reader task;
//! - the reader demultiplexes frames — responses resolve transactions,
//!   indications become [`RilEvent`]s on the bus;
//! - queries are begin/send/wait exchanges against the transaction
//!   multiplexer with the configured deadline;
//! - `cleanup` stops the reader and releases the channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::{Buf, Bytes, BytesMut};
use futures::future::BoxFuture;
use tokio::task::JoinHandle;

use crate::bus::{DriverBinding, RilEvent};
use crate::core::{EventSink, RilCore};
use crate::error::{Error, Result};
use crate::mux::{ChannelHandle, ChannelMux};
use crate::txn::TransactionMux;
use crate::wire::{
    CardStatus, Frame, FrameHeader, FrameKind, SignalSample, SystemInfo, MSG_GET_CARD_STATUS,
    MSG_GET_SIGNAL_STRENGTH, MSG_GET_SYSTEM_INFO, MSG_MODEM_READY, MSG_NETWORK_STATUS,
    SERVICE_NAS, SERVICE_RIL,
};

/// Logical channel carrying control frames.
pub const COMMAND_CHANNEL: u8 = 0;

struct DriverInner {
    command: Option<Arc<ChannelHandle>>,
    reader: Option<JoinHandle<()>>,
}

/// Driver binding speaking the control framing over the command channel.
pub struct QmiDriver {
    channels: Arc<ChannelMux>,
    transactions: Arc<TransactionMux>,
    events: EventSink,
    request_timeout: Duration,
    /// Set by the modem-ready pulse; gates [`send_request`](DriverBinding).
    ready: Arc<AtomicBool>,
    inner: Mutex<DriverInner>,
}

impl QmiDriver {
    /// Build a driver wired to `core`'s mux, transactions, and event path.
    ///
    /// The returned `Arc` is what gets passed to
    /// [`RilCore::register_driver`](crate::RilCore::register_driver).
    pub fn new(core: &RilCore) -> Arc<Self> {
        Arc::new(Self {
            channels: Arc::clone(core.channels()),
            transactions: Arc::clone(core.transactions()),
            events: core.event_sink(),
            request_timeout: core.config().request_timeout,
            ready: Arc::new(AtomicBool::new(false)),
            inner: Mutex::new(DriverInner {
                command: None,
                reader: None,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, DriverInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the modem-ready pulse has been seen since `init`.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    fn command_channel(&self) -> Result<Arc<ChannelHandle>> {
        self.lock().command.clone().ok_or(Error::NotReady)
    }

    async fn query<T, D>(&self, service: u8, message: u16, decoder: D) -> Result<T>
    where
        T: Send + 'static,
        D: FnOnce(&[u8]) -> Result<T> + Send + 'static,
    {
        let channel = self.command_channel()?;
        let handle = self.transactions.begin(decoder, self.request_timeout);

        let frame = Frame::request(service, message, handle.id(), &[]);
        channel.write(&frame.serialize()).await?;

        handle.wait().await
    }
}

impl DriverBinding for QmiDriver {
    fn init(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let mut inner = self.lock();
            if inner.command.is_some() {
                return Err(Error::Busy);
            }

            let channel = Arc::new(self.channels.open(COMMAND_CHANNEL)?);
            let reader = tokio::spawn(reader_loop(
                Arc::clone(&channel),
                Arc::clone(&self.transactions),
                self.events.clone(),
                Arc::clone(&self.ready),
            ));

            inner.command = Some(channel);
            inner.reader = Some(reader);
            Ok(())
        })
    }

    fn cleanup(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let (command, reader) = {
                let mut inner = self.lock();
                (inner.command.take(), inner.reader.take())
            };
            self.ready.store(false, Ordering::Release);

            if let Some(reader) = reader {
                reader.abort();
                let _ = reader.await;
            }
            // Last Arc drops here, releasing the channel binding.
            drop(command);
        })
    }

    fn send_request(&self, service: u8, message: u16, payload: Bytes) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if !self.is_ready() {
                return Err(Error::NotReady);
            }
            let channel = self.command_channel()?;
            // Fire-and-forget: correlation id 0 is never allocated, so any
            // response to this request is discarded as unknown.
            let frame = Frame::request(service, message, 0, &payload);
            channel.write(&frame.serialize()).await
        })
    }

    fn get_sim_status(&self) -> BoxFuture<'_, Result<CardStatus>> {
        Box::pin(self.query(SERVICE_RIL, MSG_GET_CARD_STATUS, |payload| {
            CardStatus::parse(payload)
        }))
    }

    fn get_signal_strength(&self) -> BoxFuture<'_, Result<SignalSample>> {
        Box::pin(self.query(SERVICE_NAS, MSG_GET_SIGNAL_STRENGTH, |payload| {
            SignalSample::parse(payload)
        }))
    }

    fn get_system_info(&self) -> BoxFuture<'_, Result<SystemInfo>> {
        Box::pin(self.query(SERVICE_NAS, MSG_GET_SYSTEM_INFO, |payload| {
            SystemInfo::parse(payload)
        }))
    }
}

// ============================================================================
// READER TASK
// ============================================================================

async fn reader_loop(
    channel: Arc<ChannelHandle>,
    transactions: Arc<TransactionMux>,
    events: EventSink,
    ready: Arc<AtomicBool>,
) {
    let mut acc = BytesMut::new();
    loop {
        match channel.read(4096).await {
            Ok(bytes) => {
                acc.extend_from_slice(&bytes);
                while let Some(frame) = take_frame(&mut acc) {
                    handle_frame(frame, &transactions, &events, &ready);
                }
            }
            // Channel closed under us; the driver is being torn down.
            Err(_) => break,
        }
    }
}

/// Extract the next complete frame from the accumulator, resyncing past
/// bytes that do not start a valid header.
fn take_frame(acc: &mut BytesMut) -> Option<Frame> {
    loop {
        if acc.len() < FrameHeader::SIZE {
            return None;
        }

        let mut peek = &acc[..];
        let Some(header) = FrameHeader::parse(&mut peek) else {
            tracing::warn!("unparseable frame header, resyncing");
            acc.advance(1);
            continue;
        };

        let total = FrameHeader::SIZE + header.length as usize;
        if acc.len() < total {
            return None;
        }

        let mut frame_bytes = acc.split_to(total).freeze();
        return Frame::parse(&mut frame_bytes);
    }
}

fn handle_frame(
    frame: Frame,
    transactions: &TransactionMux,
    events: &EventSink,
    ready: &AtomicBool,
) {
    let header = &frame.header;
    match header.kind {
        FrameKind::Response => {
            transactions.complete(header.txn_id, frame.payload);
        }
        FrameKind::Indication => {
            if let Some(event) = decode_indication(header.service, header.message, &frame.payload)
            {
                if event == RilEvent::ModemReady {
                    ready.store(true, Ordering::Release);
                }
                events.send(&event);
            }
        }
        FrameKind::Request => {
            tracing::warn!(
                service = header.service,
                message = header.message,
                "unexpected request frame from modem, ignoring"
            );
        }
    }
}

fn decode_indication(service: u8, message: u16, payload: &[u8]) -> Option<RilEvent> {
    let event = match (service, message) {
        (SERVICE_RIL, MSG_MODEM_READY) => RilEvent::ModemReady,
        (SERVICE_RIL, MSG_GET_CARD_STATUS) => RilEvent::SimReady(
            CardStatus::parse(payload)
                .map_err(|e| tracing::warn!("bad card status indication: {e}"))
                .ok()?,
        ),
        (SERVICE_NAS, MSG_NETWORK_STATUS) => RilEvent::NetworkStatus(
            SystemInfo::parse(payload)
                .map_err(|e| tracing::warn!("bad network status indication: {e}"))
                .ok()?,
        ),
        (SERVICE_NAS, MSG_GET_SIGNAL_STRENGTH) => RilEvent::SignalStrength(
            SignalSample::parse(payload)
                .map_err(|e| tracing::warn!("bad signal indication: {e}"))
                .ok()?,
        ),
        _ => {
            tracing::trace!(service, message, "unhandled indication");
            return None;
        }
    };
    Some(event)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_bytes(kind: FrameKind, service: u8, message: u16, txn: u16, payload: &[u8]) -> Bytes {
        Frame {
            header: FrameHeader {
                kind,
                service,
                message,
                txn_id: txn,
                length: payload.len() as u16,
            },
            payload: Bytes::copy_from_slice(payload),
        }
        .serialize()
    }

    #[test]
    fn take_frame_handles_fragmentation() {
        let bytes = frame_bytes(
            FrameKind::Response,
            SERVICE_NAS,
            MSG_GET_SIGNAL_STRENGTH,
            7,
            &[21, 2],
        );

        let mut acc = BytesMut::new();
        // First half: not enough for a frame yet.
        acc.extend_from_slice(&bytes[..5]);
        assert!(take_frame(&mut acc).is_none());

        acc.extend_from_slice(&bytes[5..]);
        let frame = take_frame(&mut acc).unwrap();
        assert_eq!(frame.header.txn_id, 7);
        assert_eq!(&frame.payload[..], &[21, 2]);
        assert!(acc.is_empty());
    }

    #[test]
    fn take_frame_resyncs_past_garbage() {
        let mut acc = BytesMut::new();
        acc.extend_from_slice(&[0xFF, 0xEE, 0xDD]); // not a valid frame start
        acc.extend_from_slice(&frame_bytes(
            FrameKind::Indication,
            SERVICE_RIL,
            MSG_MODEM_READY,
            0,
            &[],
        ));

        let frame = take_frame(&mut acc).unwrap();
        assert_eq!(frame.header.kind, FrameKind::Indication);
        assert_eq!(frame.header.message, MSG_MODEM_READY);
    }

    #[test]
    fn take_frame_extracts_back_to_back_frames() {
        let mut acc = BytesMut::new();
        acc.extend_from_slice(&frame_bytes(
            FrameKind::Response,
            SERVICE_RIL,
            MSG_GET_CARD_STATUS,
            1,
            &[1, 0, 3, 3],
        ));
        acc.extend_from_slice(&frame_bytes(
            FrameKind::Indication,
            SERVICE_NAS,
            MSG_NETWORK_STATUS,
            0,
            &[1, 1, 1, 3, 0],
        ));

        assert_eq!(take_frame(&mut acc).unwrap().header.txn_id, 1);
        assert_eq!(
            take_frame(&mut acc).unwrap().header.message,
            MSG_NETWORK_STATUS
        );
        assert!(take_frame(&mut acc).is_none());
    }

    #[test]
    fn indication_decoding_covers_known_messages() {
        assert_eq!(
            decode_indication(SERVICE_RIL, MSG_MODEM_READY, &[]),
            Some(RilEvent::ModemReady)
        );
        assert!(matches!(
            decode_indication(SERVICE_NAS, MSG_GET_SIGNAL_STRENGTH, &[21, 2]),
            Some(RilEvent::SignalStrength(s)) if s.strength == 21
        ));
        // Truncated payload is dropped, not an event.
        assert_eq!(
            decode_indication(SERVICE_NAS, MSG_NETWORK_STATUS, &[1]),
            None
        );
        // Unknown message ids are ignored.
        assert_eq!(decode_indication(SERVICE_NAS, 0x7777, &[]), None);
    }
}
