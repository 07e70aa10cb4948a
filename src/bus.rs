//! Modem event bus and lifecycle state machine.
//!
//! One writer side (the driver binding reporting indications), many reader
//! sides (registered subscribers), plus the modem lifecycle state itself.
//!
//! ## Locking discipline
//!
//! All bus state lives behind one mutex that is held only across the
//! in-memory mutation — never across `init`/`cleanup` awaits and never across
//! a subscriber callback. [`send_event`](EventBus::send_event) snapshots the
//! subscriber list under the lock and dispatches outside it, so it never
//! suspends and a slow subscriber cannot stall a producer.
//!
//! ## Subscriber identity
//!
//! Subscribers are keyed by the [`SubscriberId`] the bus assigns, so
//! registering the same closure twice simply creates two subscribers, each
//! invoked at its own position in registration order. Callbacks may add or
//! remove subscribers (the snapshot makes this safe), but such mutations only
//! affect dispatches that start afterwards.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use futures::future::BoxFuture;

use crate::error::{Error, Result};
use crate::wire::{CardStatus, SignalSample, SystemInfo};

/// Modem lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModemState {
    /// State has never been established.
    Unknown,
    /// No driver binding registered.
    Off,
    /// A binding is registered but the modem has not reported ready.
    Initializing,
    /// The modem answered with a ready indication.
    Ready,
    /// The binding reported an unrecoverable failure.
    Error,
}

/// Indication delivered to subscribers.
///
/// Dispatch passes events by reference; a subscriber that needs the payload
/// beyond the callback must clone it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RilEvent {
    /// Placeholder event carrying nothing.
    None,
    /// The modem finished booting.
    ModemReady,
    /// SIM card became usable.
    SimReady(CardStatus),
    /// Registration or attach state changed.
    NetworkStatus(SystemInfo),
    /// Unsolicited signal strength report.
    SignalStrength(SignalSample),
    /// The binding hit an unrecoverable failure.
    Error,
}

/// Capability set a concrete modem transport supplies.
///
/// Methods return [`BoxFuture`] so bindings stay object-safe; the bus stores
/// exactly one `Arc<dyn DriverBinding>` at a time.
pub trait DriverBinding: Send + Sync {
    /// Bring the transport up. Called once from driver registration; a
    /// failure propagates to the registering caller.
    fn init(&self) -> BoxFuture<'_, Result<()>>;

    /// Tear the transport down. Called from unregistration.
    fn cleanup(&self) -> BoxFuture<'_, ()>;

    /// Fire a raw control request without waiting for a response.
    fn send_request(&self, service: u8, message: u16, payload: Bytes) -> BoxFuture<'_, Result<()>>;

    /// Query SIM card status.
    fn get_sim_status(&self) -> BoxFuture<'_, Result<CardStatus>>;

    /// Query the current signal strength.
    fn get_signal_strength(&self) -> BoxFuture<'_, Result<SignalSample>>;

    /// Query registration/attach state.
    fn get_system_info(&self) -> BoxFuture<'_, Result<SystemInfo>>;
}

/// Token identifying one subscriber registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

type SubscriberFn = Arc<dyn Fn(&RilEvent) + Send + Sync>;

struct BusInner {
    state: ModemState,
    binding: Option<Arc<dyn DriverBinding>>,
    subscribers: Vec<(SubscriberId, SubscriberFn)>,
    next_subscriber: u64,
}

/// Single-writer-many-reader fan-out of modem events plus the lifecycle
/// state.
pub struct EventBus {
    inner: Mutex<BusInner>,
    max_subscribers: usize,
}

impl EventBus {
    /// Create a bus admitting at most `max_subscribers` subscribers.
    pub fn new(max_subscribers: usize) -> Self {
        Self {
            inner: Mutex::new(BusInner {
                state: ModemState::Off,
                binding: None,
                subscribers: Vec::new(),
                next_subscriber: 1,
            }),
            max_subscribers,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BusInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state snapshot, non-blocking.
    pub fn state(&self) -> ModemState {
        self.lock().state
    }

    /// Snapshot of the registered binding, if any.
    pub fn binding(&self) -> Option<Arc<dyn DriverBinding>> {
        self.lock().binding.clone()
    }

    /// Register the driver binding and run its `init` hook.
    ///
    /// Fails with `Busy` if a binding is already registered — the first
    /// registration stays in effect. An `init` failure propagates to the
    /// caller but leaves the binding stored: the modem is not usable, and the
    /// caller decides between retrying through a fresh registration cycle or
    /// tearing down with [`unregister_driver`](Self::unregister_driver).
    pub async fn register_driver(&self, binding: Arc<dyn DriverBinding>) -> Result<()> {
        {
            let mut inner = self.lock();
            if inner.binding.is_some() {
                return Err(Error::Busy);
            }
            inner.binding = Some(Arc::clone(&binding));
            inner.state = ModemState::Initializing;
        }

        tracing::debug!("driver binding registered, initializing");
        binding.init().await
    }

    /// Unregister the driver binding.
    ///
    /// Clears the binding and all subscribers, sets the state to `Off`, then
    /// awaits the binding's `cleanup`. A no-op without a registered binding.
    pub async fn unregister_driver(&self) {
        let binding = {
            let mut inner = self.lock();
            inner.state = ModemState::Off;
            inner.subscribers.clear();
            inner.binding.take()
        };

        if let Some(binding) = binding {
            tracing::debug!("driver binding unregistered, running cleanup");
            binding.cleanup().await;
        }
    }

    /// Add a subscriber; events are delivered in registration order.
    ///
    /// Fails with `ResourceExhausted` at capacity.
    pub fn add_subscriber<F>(&self, callback: F) -> Result<SubscriberId>
    where
        F: Fn(&RilEvent) + Send + Sync + 'static,
    {
        let mut inner = self.lock();
        if inner.subscribers.len() >= self.max_subscribers {
            return Err(Error::ResourceExhausted);
        }
        let id = SubscriberId(inner.next_subscriber);
        inner.next_subscriber += 1;
        inner.subscribers.push((id, Arc::new(callback)));
        Ok(id)
    }

    /// Remove a subscriber by its token.
    ///
    /// Fails with `NotFound` for an unknown (or already removed) token. The
    /// subscriber is excluded from dispatches that start after this call;
    /// one already running completes with the old snapshot.
    pub fn remove_subscriber(&self, id: SubscriberId) -> Result<()> {
        let mut inner = self.lock();
        let before = inner.subscribers.len();
        inner.subscribers.retain(|(sid, _)| *sid != id);
        if inner.subscribers.len() == before {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Deliver `event` to every current subscriber, synchronously and in
    /// registration order — exactly once each per call.
    ///
    /// Also drives the state machine: the first `ModemReady` moves
    /// `Initializing` to `Ready`, and `Error` moves any state to `Error`.
    /// Never blocks; safe to call from the transport's receive path.
    pub fn send_event(&self, event: &RilEvent) {
        let snapshot: Vec<SubscriberFn> = {
            let mut inner = self.lock();
            match event {
                RilEvent::ModemReady if inner.state == ModemState::Initializing => {
                    inner.state = ModemState::Ready;
                }
                RilEvent::Error => {
                    inner.state = ModemState::Error;
                }
                _ => {}
            }
            inner.subscribers.iter().map(|(_, f)| Arc::clone(f)).collect()
        };

        for subscriber in snapshot {
            subscriber(event);
        }
    }
}
