//! # ril-runtime
//!
//! An **async RIL control-plane runtime** for cellular modems, built on
//! [tokio](https://tokio.rs).
//!
//! The crate is the glue between a modem's physical transport and the
//! telephony stack above it: it multiplexes one physical link into
//! independent logical byte streams, correlates outgoing queries with the
//! modem's asynchronous responses, and fans unsolicited indications out to
//! registered subscribers.
//!
//! ## Features
//!
//! - **Logical channels**: N independent ordered byte streams over one
//!   transport, with per-channel isolation and backpressure
//! - **Correlated transactions**: monotonic correlation ids, per-request
//!   deadlines, first-class cancellation
//! - **Event bus**: bounded subscriber table, in-order exactly-once
//!   delivery, modem lifecycle state machine
//! - **Pluggable transports**: the physical link and the driver binding are
//!   traits; tests run against in-process fakes
//! - **No globals**: everything hangs off an explicitly constructed
//!   [`RilCore`], so independent instances coexist in one process
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use bytes::Bytes;
//! use futures::future::BoxFuture;
//! use ril_runtime::prelude::*;
//! use ril_runtime::qmi::QmiDriver;
//!
//! /// Whatever carries tagged bytes to the modem (UART, shared memory, ...).
//! struct UartLink;
//!
//! impl PhysicalLink for UartLink {
//!     fn send(&self, channel: u8, bytes: Bytes) -> BoxFuture<'_, Result<()>> {
//!         Box::pin(async move {
//!             // hand the tagged frame to the hardware
//!             Ok(())
//!         })
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let core = RilCore::new(Arc::new(UartLink), CoreConfig::default());
//!
//!     // Bind the reference driver and bring the modem up.
//!     let driver = QmiDriver::new(&core);
//!     core.register_driver(driver).await?;
//!
//!     // Watch indications.
//!     let _sub = core.add_subscriber(|event| println!("indication: {event:?}"))?;
//!
//!     // Correlated query with the configured 5 s deadline.
//!     let signal = core.get_signal_strength().await?;
//!     println!("signal strength: {}", signal.strength);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                    telephony stack / device layer             │
//! │   open/read/write/poll        queries        subscribers      │
//! └─────────┬──────────────────────┬────────────────┬─────────────┘
//!           ▼                      ▼                ▼
//! ┌───────────────────────────────────────────────────────────────┐
//! │                           RilCore                             │
//! │  ┌─────────────┐  ┌────────────────┐  ┌───────────────────┐   │
//! │  │ ControlPort │  │ TransactionMux │  │ EventBus          │   │
//! │  │ (ring pair) │  │ (pending map)  │  │ (state machine)   │   │
//! │  └─────────────┘  └───────┬────────┘  └─────────┬─────────┘   │
//! │                           │ complete()          │ send_event()│
//! │  ┌────────────────────────┴─────────────────────┴──────────┐  │
//! │  │            DriverBinding (e.g. QmiDriver)               │  │
//! │  └───────────────────────────┬─────────────────────────────┘  │
//! │  ┌───────────────────────────┴─────────────────────────────┐  │
//! │  │       ChannelMux: N logical channels, one link          │  │
//! │  └───────────────────────────┬─────────────────────────────┘  │
//! └──────────────────────────────┼────────────────────────────────┘
//!                                ▼
//!                      PhysicalLink (trait)
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`core`] | [`RilCore`] façade composing everything below |
//! | [`bus`] | Modem state machine, [`DriverBinding`], subscriber fan-out |
//! | [`txn`] | Correlation ids, pending transactions, deadlines |
//! | [`mux`] | Logical channels over one [`PhysicalLink`] |
//! | [`buffer`] | Bounded byte ring with blocking/fail-fast access |
//! | [`control`] | Single-open control stream for the device layer |
//! | [`netmon`] | Link counters and the monitoring record |
//! | [`wire`] | Control framing and fixed-layout modem records |
//! | [`qmi`] | Reference driver binding over channel 0 |
//! | [`config`] | [`CoreConfig`] and defaults |
//! | [`error`] | [`Error`] taxonomy and [`Result`] alias |
//!
//! ## Concurrency Contract
//!
//! Producer-side operations — [`RilCore::send_event`],
//! [`TransactionMux::complete`](txn::TransactionMux::complete),
//! [`ChannelMux::dispatch_inbound`](mux::ChannelMux::dispatch_inbound) —
//! never suspend and are safe to call from the transport's receive path.
//! Locks guard in-memory mutations only; anything that waits does so on a
//! notification primitive outside the lock, with a deadline or close signal
//! as the way out. `Timeout`, `Cancelled`, and `Interrupted` are distinct
//! results, so a caller always knows *why* a wait ended.

pub mod buffer;
pub mod bus;
pub mod config;
pub mod control;
pub mod core;
pub mod error;
pub mod mux;
pub mod netmon;
pub mod qmi;
pub mod txn;

/// Control framing and record layouts.
/// Exposed for bindings and interoperability tests.
pub mod wire;

pub use bus::{DriverBinding, ModemState, RilEvent, SubscriberId};
pub use config::{CoreConfig, CoreConfigBuilder};
pub use crate::core::{EventSink, RilCore};
pub use error::{DecodeError, Error, Result};
pub use mux::PhysicalLink;
pub use wire::{CardStatus, SignalSample, SystemInfo};

pub mod prelude {
    //! One-stop imports for typical users of the crate.
    pub use crate::buffer::Readiness;
    pub use crate::bus::{DriverBinding, ModemState, RilEvent, SubscriberId};
    pub use crate::config::CoreConfig;
    pub use crate::core::RilCore;
    pub use crate::error::{Error, Result};
    pub use crate::mux::PhysicalLink;
    pub use crate::wire::{CardStatus, SignalSample, SystemInfo};
}
