//! Shared test fixtures: an in-process fake modem link.
//!
//! `FakeModem` implements [`PhysicalLink`] and plays the modem side of the
//! control protocol deterministically: it records every outbound frame,
//! answers requests it has a canned response for, and can push unsolicited
//! indications through the mux at any time.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use ril_runtime::mux::ChannelMux;
use ril_runtime::prelude::*;
use ril_runtime::qmi::COMMAND_CHANNEL;
use ril_runtime::wire::{Frame, FrameHeader, FrameKind};

pub fn init_tracing() {
    static TRACING_INIT: OnceLock<()> = OnceLock::new();
    TRACING_INIT.get_or_init(|| {
        let _ = tracing::subscriber::set_global_default(
            tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .with_test_writer()
                .finish(),
        );
    });
}

/// Deterministic modem double behind the [`PhysicalLink`] seam.
pub struct FakeModem {
    /// Every frame handed to the link, in send order.
    sent: Mutex<Vec<(u8, Bytes)>>,
    /// Canned response payloads keyed by (service, message).
    responses: Mutex<HashMap<(u8, u16), Vec<u8>>>,
    /// Receive path back into the core; attached after construction.
    mux: Mutex<Option<Arc<ChannelMux>>>,
}

impl FakeModem {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            responses: Mutex::new(HashMap::new()),
            mux: Mutex::new(None),
        })
    }

    /// Wire the receive path back into the core's mux.
    pub fn attach(&self, mux: &Arc<ChannelMux>) {
        *self.mux.lock().unwrap() = Some(Arc::clone(mux));
    }

    /// Answer future requests for `(service, message)` with `payload`.
    pub fn respond_with(&self, service: u8, message: u16, payload: &[u8]) {
        self.responses
            .lock()
            .unwrap()
            .insert((service, message), payload.to_vec());
    }

    /// Stop answering requests for `(service, message)`.
    pub fn go_silent(&self, service: u8, message: u16) {
        self.responses.lock().unwrap().remove(&(service, message));
    }

    /// Push an unsolicited indication at the core.
    pub fn indicate(&self, service: u8, message: u16, payload: &[u8]) {
        let frame = Frame {
            header: FrameHeader {
                kind: FrameKind::Indication,
                service,
                message,
                txn_id: 0,
                length: payload.len() as u16,
            },
            payload: Bytes::copy_from_slice(payload),
        };
        self.dispatch(COMMAND_CHANNEL, &frame.serialize());
    }

    /// Raw injection into a channel's receive path.
    pub fn dispatch(&self, channel: u8, bytes: &[u8]) {
        let mux = self.mux.lock().unwrap();
        mux.as_ref()
            .expect("FakeModem::attach not called")
            .dispatch_inbound(channel, bytes);
    }

    /// All frames sent on `channel`, in order.
    pub fn sent_on(&self, channel: u8) -> Vec<Bytes> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(ch, _)| *ch == channel)
            .map(|(_, bytes)| bytes.clone())
            .collect()
    }

    fn answer(&self, bytes: &Bytes) {
        let mut cursor = &bytes[..];
        while let Some(frame) = Frame::parse(&mut cursor) {
            if frame.header.kind != FrameKind::Request || frame.header.txn_id == 0 {
                continue;
            }
            let key = (frame.header.service, frame.header.message);
            let Some(payload) = self.responses.lock().unwrap().get(&key).cloned() else {
                continue;
            };
            let response = Frame {
                header: FrameHeader {
                    kind: FrameKind::Response,
                    service: frame.header.service,
                    message: frame.header.message,
                    txn_id: frame.header.txn_id,
                    length: payload.len() as u16,
                },
                payload: Bytes::from(payload),
            };
            self.dispatch(COMMAND_CHANNEL, &response.serialize());
        }
    }
}

impl PhysicalLink for FakeModem {
    fn send(&self, channel: u8, bytes: Bytes) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.sent.lock().unwrap().push((channel, bytes.clone()));
            if channel == COMMAND_CHANNEL {
                self.answer(&bytes);
            }
            Ok(())
        })
    }
}

/// Build a core over a fresh fake modem, receive path already attached.
pub fn core_with_fake_modem(config: CoreConfig) -> (RilCore, Arc<FakeModem>) {
    let modem = FakeModem::new();
    let core = RilCore::new(
        Arc::clone(&modem) as Arc<dyn PhysicalLink>,
        config,
    );
    modem.attach(core.channels());
    (core, modem)
}

/// Poll `predicate` until it holds or ~1 second of (possibly paused) time
/// passes. Lets background tasks drain deterministically under
/// `start_paused` runtimes.
pub async fn wait_until(predicate: impl Fn() -> bool) -> bool {
    for _ in 0..1000 {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    predicate()
}
