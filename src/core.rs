//! RIL core façade.
//!
//! [`RilCore`] composes the event bus, the transaction multiplexer, the
//! logical channel multiplexer, the control port, and the link statistics
//! behind the one surface external collaborators call. It is an explicitly
//! constructed context — no global registry — so independent instances can
//! coexist (and be constructed freely in tests); a process normally creates
//! exactly one per physical modem link.
//!
//! Control flow: a [`DriverBinding`] is registered, moving the modem state to
//! `Initializing` and running the binding's `init` hook; the binding opens
//! logical channels to talk to the transport, correlates its queries through
//! the transaction multiplexer, and reports indications back through
//! [`send_event`](RilCore::send_event); queries from above are forwarded to
//! the binding and come back as fixed-layout records or typed failures.

use std::sync::Arc;

use crate::bus::{DriverBinding, EventBus, ModemState, RilEvent, SubscriberId};
use crate::config::CoreConfig;
use crate::control::{ControlHandle, ControlPort};
use crate::error::Result;
use crate::mux::{ChannelHandle, ChannelMux, PhysicalLink};
use crate::netmon::{LinkStats, StatsRecord};
use crate::txn::TransactionMux;
use crate::wire::{CardStatus, SignalSample, SystemInfo};

/// Where driver bindings hand in indications.
///
/// A cheap clone of the core's event path: refreshes the monitoring record
/// for signal/registration events, then fans out through the bus. Never
/// blocks.
#[derive(Clone)]
pub struct EventSink {
    bus: Arc<EventBus>,
    stats: Arc<LinkStats>,
}

impl EventSink {
    /// Deliver an indication to all subscribers, in registration order.
    pub fn send(&self, event: &RilEvent) {
        match event {
            RilEvent::SignalStrength(sample) => {
                self.stats.set_signal_strength(sample.strength);
            }
            RilEvent::NetworkStatus(info) => {
                self.stats.set_network(info.network_type, info.is_registered());
            }
            _ => {}
        }
        self.bus.send_event(event);
    }
}

/// The assembled RIL control plane for one physical modem link.
pub struct RilCore {
    config: CoreConfig,
    bus: Arc<EventBus>,
    transactions: Arc<TransactionMux>,
    channels: Arc<ChannelMux>,
    control: Arc<ControlPort>,
    stats: Arc<LinkStats>,
}

impl RilCore {
    /// Assemble a core over the given physical link.
    pub fn new(link: Arc<dyn PhysicalLink>, config: CoreConfig) -> Self {
        let stats = Arc::new(LinkStats::new());
        let channels = Arc::new(ChannelMux::new(
            link,
            config.num_channels,
            config.buffer_capacity,
            Arc::clone(&stats),
        ));
        Self {
            bus: Arc::new(EventBus::new(config.max_subscribers)),
            transactions: Arc::new(TransactionMux::new()),
            control: Arc::new(ControlPort::new(config.buffer_capacity)),
            channels,
            stats,
            config,
        }
    }

    /// The configuration this core was built with.
    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Driver lifecycle
    // ------------------------------------------------------------------

    /// Register the driver binding and run its `init` hook.
    ///
    /// See [`EventBus::register_driver`] for the Busy and init-failure
    /// semantics.
    pub async fn register_driver(&self, binding: Arc<dyn DriverBinding>) -> Result<()> {
        self.bus.register_driver(binding).await
    }

    /// Unregister the driver binding.
    ///
    /// In-flight transactions are cancelled first so a concurrent `wait`
    /// resolves with `Cancelled` instead of dangling; then the binding's
    /// `cleanup` runs, the state drops to `Off`, and all subscribers are
    /// cleared.
    pub async fn unregister_driver(&self) {
        self.transactions.cancel_all();
        self.bus.unregister_driver().await;
    }

    /// Current modem state snapshot, non-blocking.
    pub fn state(&self) -> ModemState {
        self.bus.state()
    }

    // ------------------------------------------------------------------
    // Events and subscribers
    // ------------------------------------------------------------------

    /// Add an event subscriber. Fails with `ResourceExhausted` at capacity.
    pub fn add_subscriber<F>(&self, callback: F) -> Result<SubscriberId>
    where
        F: Fn(&RilEvent) + Send + Sync + 'static,
    {
        self.bus.add_subscriber(callback)
    }

    /// Remove an event subscriber. Fails with `NotFound` for unknown tokens.
    pub fn remove_subscriber(&self, id: SubscriberId) -> Result<()> {
        self.bus.remove_subscriber(id)
    }

    /// Deliver an indication to all subscribers, in registration order.
    ///
    /// Signal and registration events also refresh the monitoring counters
    /// before fan-out. Never blocks; callable from the transport's receive
    /// path.
    pub fn send_event(&self, event: &RilEvent) {
        self.event_sink().send(event);
    }

    /// An [`EventSink`] clone for a driver binding to report through.
    pub fn event_sink(&self) -> EventSink {
        EventSink {
            bus: Arc::clone(&self.bus),
            stats: Arc::clone(&self.stats),
        }
    }

    // ------------------------------------------------------------------
    // Queries forwarded to the binding
    // ------------------------------------------------------------------

    fn binding(&self) -> Result<Arc<dyn DriverBinding>> {
        self.bus.binding().ok_or(crate::Error::NotReady)
    }

    /// Query SIM card status through the registered binding.
    pub async fn get_sim_status(&self) -> Result<CardStatus> {
        self.binding()?.get_sim_status().await
    }

    /// Query signal strength through the registered binding.
    ///
    /// A successful sample also refreshes the monitoring record.
    pub async fn get_signal_strength(&self) -> Result<SignalSample> {
        let sample = self.binding()?.get_signal_strength().await?;
        self.stats.set_signal_strength(sample.strength);
        Ok(sample)
    }

    /// Query registration/attach state through the registered binding.
    pub async fn get_system_info(&self) -> Result<SystemInfo> {
        let info = self.binding()?.get_system_info().await?;
        self.stats.set_network(info.network_type, info.is_registered());
        Ok(info)
    }

    // ------------------------------------------------------------------
    // Byte-stream surfaces
    // ------------------------------------------------------------------

    /// Open the single-consumer control port.
    pub fn open_control(&self) -> Result<ControlHandle> {
        self.control.open()
    }

    /// The control port itself, for the modem-facing plumbing.
    pub fn control(&self) -> &Arc<ControlPort> {
        &self.control
    }

    /// Open a logical channel.
    pub fn open_channel(&self, channel: u8) -> Result<ChannelHandle> {
        self.channels.open(channel)
    }

    /// The channel multiplexer, for bindings and the transport's receive
    /// path.
    pub fn channels(&self) -> &Arc<ChannelMux> {
        &self.channels
    }

    /// The transaction multiplexer, for bindings issuing correlated queries.
    pub fn transactions(&self) -> &Arc<TransactionMux> {
        &self.transactions
    }

    // ------------------------------------------------------------------
    // Monitoring
    // ------------------------------------------------------------------

    /// Live counters, for paths that feed them directly.
    pub fn stats(&self) -> &Arc<LinkStats> {
        &self.stats
    }

    /// Snapshot of the monitoring record.
    pub fn stats_snapshot(&self) -> StatsRecord {
        self.stats.snapshot()
    }

    /// Tear the core down: unregister the driver (cancelling in-flight
    /// transactions) and close every byte stream so parked readers and
    /// writers return `Interrupted`.
    pub async fn shutdown(&self) {
        self.unregister_driver().await;
        self.channels.shutdown();
        self.control.shutdown();
    }
}
