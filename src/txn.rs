//! Correlated request/response transactions.
//!
//! Turns a fire-and-wait modem query into an async exchange: [`begin`]
//! allocates a correlation id and registers a pending entry, the response
//! path calls [`complete`] with the raw payload, and the caller [`wait`]s on
//! the handle with a deadline.
//!
//! ## Correlation id policy
//!
//! Ids are 16-bit, start at 1, and wrap from 0xFFFF back to 1 — id 0 is
//! reserved (indications carry it). On wraparound, any id still in flight is
//! skipped, so a stale late response cannot resolve a new transaction within
//! one id-space cycle.
//!
//! ## Resolution
//!
//! Every transaction reaches exactly one terminal state: Completed (decoded
//! payload or decode error), Cancelled, or TimedOut. [`complete`] and
//! [`cancel`] remove the pending entry before resolving, and a timed-out
//! `wait` removes it before returning, so a response arriving afterwards is
//! discarded as unknown. [`complete`] never blocks — it runs the stored
//! decoder and fires a oneshot, nothing more — and is safe to call from the
//! transport's receive path.
//!
//! [`begin`]: TransactionMux::begin
//! [`complete`]: TransactionMux::complete
//! [`cancel`]: TransactionMux::cancel
//! [`wait`]: TransactionHandle::wait

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::oneshot;

use crate::error::{Error, Result};

enum Outcome {
    Response(Bytes),
    Cancelled,
}

/// Decodes the raw payload and resolves the waiter. Stored boxed so pending
/// entries are homogeneous while each waiter gets its own typed result.
type Resolver = Box<dyn FnOnce(Outcome) + Send>;

struct PendingTransaction {
    resolve: Resolver,
}

/// Allocates correlation ids and matches responses to waiters.
pub struct TransactionMux {
    pending: DashMap<u16, PendingTransaction>,
    next_id: Mutex<u16>,
}

impl Default for TransactionMux {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionMux {
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
            next_id: Mutex::new(1),
        }
    }

    fn id_counter(&self) -> MutexGuard<'_, u16> {
        self.next_id.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_txn_id(&self) -> u16 {
        let mut counter = self.id_counter();
        // The skip loop terminates because the pending set is always far
        // smaller than the id space.
        loop {
            let id = *counter;
            *counter = if id == u16::MAX { 1 } else { id + 1 };
            if !self.pending.contains_key(&id) {
                return id;
            }
        }
    }

    /// Register a transaction and return the handle to wait on.
    ///
    /// `decoder` runs when the matching response arrives; its result (or
    /// decode error) is what [`wait`](TransactionHandle::wait) returns.
    /// `timeout` is the deadline `wait` enforces.
    pub fn begin<T, D>(self: &Arc<Self>, decoder: D, timeout: Duration) -> TransactionHandle<T>
    where
        T: Send + 'static,
        D: FnOnce(&[u8]) -> Result<T> + Send + 'static,
    {
        let id = self.next_txn_id();
        let (tx, rx) = oneshot::channel();

        let resolve: Resolver = Box::new(move |outcome| {
            let result = match outcome {
                Outcome::Response(payload) => decoder(&payload),
                Outcome::Cancelled => Err(Error::Cancelled),
            };
            // The waiter may already be gone (abandoned handle); that is
            // its problem, not ours.
            let _ = tx.send(result);
        });

        self.pending.insert(id, PendingTransaction { resolve });

        TransactionHandle {
            id,
            rx,
            deadline: timeout,
            mux: Arc::clone(self),
            finished: false,
        }
    }

    /// Resolve the transaction `id` with a raw response payload.
    ///
    /// Unknown or already-resolved ids are discarded silently; this is the
    /// normal fate of a response that lost the race against its deadline.
    pub fn complete(&self, id: u16, payload: Bytes) {
        match self.pending.remove(&id) {
            Some((_, entry)) => (entry.resolve)(Outcome::Response(payload)),
            None => {
                tracing::trace!(txn_id = id, "response for unknown transaction, discarding");
            }
        }
    }

    /// Cancel the transaction `id`, resolving its waiter with `Cancelled`.
    ///
    /// Returns whether a pending entry existed.
    pub fn cancel(&self, id: u16) -> bool {
        match self.pending.remove(&id) {
            Some((_, entry)) => {
                (entry.resolve)(Outcome::Cancelled);
                true
            }
            None => false,
        }
    }

    /// Cancel every in-flight transaction.
    ///
    /// Used when the driver binding is torn down: concurrent waiters resolve
    /// with `Cancelled` instead of dangling until their deadlines.
    pub fn cancel_all(&self) {
        let ids: Vec<u16> = self.pending.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            self.cancel(id);
        }
    }

    /// Number of transactions currently in flight.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }
}

/// Wait side of one transaction.
///
/// `wait` consumes the handle, so there is at most one wait per transaction
/// by construction. Dropping the handle without waiting abandons the
/// transaction and removes its pending entry.
pub struct TransactionHandle<T> {
    id: u16,
    rx: oneshot::Receiver<Result<T>>,
    deadline: Duration,
    mux: Arc<TransactionMux>,
    finished: bool,
}

impl<T> TransactionHandle<T> {
    /// The correlation id carried by the request on the wire.
    pub fn id(&self) -> u16 {
        self.id
    }

    /// Wait for the transaction to resolve.
    ///
    /// Returns the decoded payload, `Cancelled`, a `Decode` error from the
    /// stored decoder, or `Timeout` once the deadline elapses — in which case
    /// the pending entry is removed and a late response becomes a no-op.
    pub async fn wait(mut self) -> Result<T> {
        let result = match tokio::time::timeout(self.deadline, &mut self.rx).await {
            Ok(Ok(result)) => result,
            // The mux (and its pending entry) went away without resolving.
            Ok(Err(_)) => Err(Error::Cancelled),
            Err(_elapsed) => {
                if self.mux.pending.remove(&self.id).is_some() {
                    Err(Error::Timeout)
                } else {
                    // A response or cancel raced the deadline and already
                    // resolved us; prefer its outcome.
                    match self.rx.try_recv() {
                        Ok(result) => result,
                        Err(_) => Err(Error::Timeout),
                    }
                }
            }
        };
        self.finished = true;
        result
    }
}

impl<T> Drop for TransactionHandle<T> {
    fn drop(&mut self) {
        if !self.finished {
            self.mux.pending.remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn raw_decoder(payload: &[u8]) -> Result<Bytes> {
        Ok(Bytes::copy_from_slice(payload))
    }

    /// Correlation ids wrap from 0xFFFF to 1 and never hit 0.
    #[test]
    fn txn_id_wraps_to_one_not_zero() {
        let mux = Arc::new(TransactionMux::new());

        let mut last = 0u16;
        for _ in 0..(u16::MAX as u32 + 10) {
            let handle = mux.begin(raw_decoder, Duration::from_secs(1));
            let id = handle.id();
            assert_ne!(id, 0, "correlation id must never be 0");
            last = id;
            drop(handle);
        }
        // 65545 allocations = one full cycle plus ten.
        assert_eq!(last, 10);
    }

    /// Ids still in flight are skipped on wraparound.
    #[test]
    fn in_flight_ids_are_skipped() {
        let mux = Arc::new(TransactionMux::new());

        let held = mux.begin::<Bytes, _>(raw_decoder, Duration::from_secs(1));
        assert_eq!(held.id(), 1);

        // Burn through the rest of the id space.
        for _ in 0..(u16::MAX - 1) {
            drop(mux.begin::<Bytes, _>(raw_decoder, Duration::from_secs(1)));
        }

        // The counter is back at the start, but id 1 is taken.
        let next = mux.begin::<Bytes, _>(raw_decoder, Duration::from_secs(1));
        assert_eq!(next.id(), 2);
        drop(next);
        drop(held);
    }

    #[tokio::test]
    async fn complete_resolves_waiter_with_decoded_payload() {
        let mux = Arc::new(TransactionMux::new());

        let handle = mux.begin(
            |payload| crate::wire::SignalSample::parse(payload),
            Duration::from_secs(5),
        );
        let id = handle.id();

        mux.complete(id, Bytes::from_static(&[21, 2]));

        let sample = handle.wait().await.unwrap();
        assert_eq!(sample.strength, 21);
        assert_eq!(sample.radio_interface, 2);
        assert_eq!(mux.in_flight(), 0);
    }

    #[tokio::test]
    async fn decode_failure_surfaces_to_waiter() {
        let mux = Arc::new(TransactionMux::new());

        let handle = mux.begin(
            |payload| crate::wire::SystemInfo::parse(payload),
            Duration::from_secs(5),
        );
        let id = handle.id();

        mux.complete(id, Bytes::from_static(&[1]));

        assert!(matches!(handle.wait().await, Err(Error::Decode(_))));
    }

    #[test]
    fn complete_unknown_id_is_noop() {
        let mux = Arc::new(TransactionMux::new());
        mux.complete(42, Bytes::from_static(b"stale"));
        assert_eq!(mux.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_elapses_to_timeout_and_removes_entry() {
        let mux = Arc::new(TransactionMux::new());

        let handle = mux.begin(raw_decoder, Duration::from_secs(5));
        let id = handle.id();

        assert_eq!(handle.wait().await.unwrap_err(), Error::Timeout);
        assert_eq!(mux.in_flight(), 0);

        // A late response for the timed-out id is a no-op.
        mux.complete(id, Bytes::from_static(b"too late"));
        assert_eq!(mux.in_flight(), 0);
    }

    #[tokio::test]
    async fn cancel_resolves_concurrent_waiter() {
        let mux = Arc::new(TransactionMux::new());

        let handle = mux.begin::<Bytes, _>(raw_decoder, Duration::from_secs(30));
        let id = handle.id();

        let waiter = tokio::spawn(handle.wait());
        tokio::task::yield_now().await;

        assert!(mux.cancel(id));
        assert_eq!(waiter.await.unwrap().unwrap_err(), Error::Cancelled);
    }

    #[tokio::test]
    async fn cancel_all_drains_in_flight() {
        let mux = Arc::new(TransactionMux::new());

        let a = mux.begin::<Bytes, _>(raw_decoder, Duration::from_secs(30));
        let b = mux.begin::<Bytes, _>(raw_decoder, Duration::from_secs(30));
        assert_eq!(mux.in_flight(), 2);

        let wa = tokio::spawn(a.wait());
        let wb = tokio::spawn(b.wait());
        tokio::task::yield_now().await;

        mux.cancel_all();
        assert_eq!(mux.in_flight(), 0);
        assert_eq!(wa.await.unwrap().unwrap_err(), Error::Cancelled);
        assert_eq!(wb.await.unwrap().unwrap_err(), Error::Cancelled);
    }

    #[test]
    fn abandoned_handle_removes_pending_entry() {
        let mux = Arc::new(TransactionMux::new());

        let handle = mux.begin::<Bytes, _>(raw_decoder, Duration::from_secs(30));
        assert_eq!(mux.in_flight(), 1);

        drop(handle);
        assert_eq!(mux.in_flight(), 0);
    }
}
