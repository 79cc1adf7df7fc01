//! One-shot waits for a specific `(peer, type)` message.
//!
//! A waiter parks until the router hands it the next matching message. The
//! message is delivered to the waiter only; standing routes never see it.

use std::{
    collections::HashMap,
    future::IntoFuture,
    sync::Mutex,
    time::Duration,
};

use {
    futures::future::BoxFuture,
    tokio::sync::oneshot,
    tracing::{debug, warn},
};

#[cfg(feature = "metrics")]
use parley_metrics::{counter, gauge, waiters as waiter_metrics};

use crate::{Error, Result, handler::Delivery, key::PeerKey};

/// Pending waits keyed by `(peer, type)`, at most one live wait per key.
#[derive(Debug, Default)]
pub struct AwaitRegistry {
    waiters: Mutex<HashMap<PeerKey, oneshot::Sender<Delivery>>>,
}

impl AwaitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a wait for the next `msg_type` message from `peer`.
    ///
    /// Fails with [`Error::AwaitAlreadyRegistered`] while another live wait
    /// holds the key. A wait whose receiver is gone (timed out, dropped) no
    /// longer counts as live and is replaced.
    pub fn register_wait(
        &self,
        peer: &str,
        msg_type: &str,
        deadline: Option<Duration>,
    ) -> Result<PendingMessage> {
        let key = PeerKey::new(peer, msg_type);
        let (tx, rx) = oneshot::channel();
        {
            let mut waiters = self.lock();
            if let Some(existing) = waiters.get(&key)
                && !existing.is_closed()
            {
                return Err(Error::AwaitAlreadyRegistered {
                    peer: key.peer,
                    msg_type: key.msg_type,
                });
            }
            waiters.insert(key.clone(), tx);
            self.record_pending(waiters.len());
        }

        #[cfg(feature = "metrics")]
        counter!(waiter_metrics::REGISTERED_TOTAL).increment(1);
        debug!(key = %key, ?deadline, "waiting for message");

        Ok(PendingMessage { key, rx, deadline })
    }

    /// Hand `delivery` to the waiter for `(peer, msg_type)`, if any.
    ///
    /// Returns `true` only when a live waiter took the message. The entry is
    /// removed and fulfilled under one lock, so two racing messages cannot
    /// both match the same wait.
    pub fn try_resolve(&self, peer: &str, msg_type: &str, delivery: Delivery) -> bool {
        let key = PeerKey::new(peer, msg_type);
        let mut waiters = self.lock();
        let Some(tx) = waiters.remove(&key) else {
            return false;
        };
        self.record_pending(waiters.len());

        if tx.send(delivery).is_err() {
            debug!(key = %key, "waiter went away before a match, dropping stale wait");
            return false;
        }

        #[cfg(feature = "metrics")]
        counter!(waiter_metrics::RESOLVED_TOTAL).increment(1);
        debug!(key = %key, "wait resolved");
        true
    }

    /// Drop the wait for `(peer, msg_type)`; the waiter sees
    /// [`Error::WaitCancelled`].
    pub fn cancel(&self, peer: &str, msg_type: &str) -> bool {
        let mut waiters = self.lock();
        let removed = waiters.remove(&PeerKey::new(peer, msg_type)).is_some();
        self.record_pending(waiters.len());
        removed
    }

    pub fn is_waiting(&self, peer: &str, msg_type: &str) -> bool {
        self.lock()
            .get(&PeerKey::new(peer, msg_type))
            .is_some_and(|tx| !tx.is_closed())
    }

    /// Number of registered waits, stale ones included until they are swept.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PeerKey, oneshot::Sender<Delivery>>> {
        self.waiters.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[cfg(feature = "metrics")]
    fn record_pending(&self, pending: usize) {
        gauge!(waiter_metrics::PENDING).set(pending as f64);
    }

    #[cfg(not(feature = "metrics"))]
    fn record_pending(&self, _pending: usize) {}
}

/// Completion handle returned by a wait registration.
///
/// Await it directly (`pending.await`) or call [`PendingMessage::recv`].
#[derive(Debug)]
pub struct PendingMessage {
    key: PeerKey,
    rx: oneshot::Receiver<Delivery>,
    deadline: Option<Duration>,
}

impl PendingMessage {
    pub fn key(&self) -> &PeerKey {
        &self.key
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// Wait for the matching message, the deadline, or cancellation.
    pub async fn recv(self) -> Result<Delivery> {
        let Self { key, rx, deadline } = self;
        let Some(after) = deadline else {
            return rx.await.map_err(|_| cancelled(key));
        };
        match tokio::time::timeout(after, rx).await {
            Ok(Ok(delivery)) => Ok(delivery),
            Ok(Err(_)) => Err(cancelled(key)),
            Err(_) => {
                #[cfg(feature = "metrics")]
                counter!(waiter_metrics::TIMED_OUT_TOTAL).increment(1);
                warn!(key = %key, ?after, "wait timed out");
                Err(Error::WaitTimedOut {
                    peer: key.peer,
                    msg_type: key.msg_type,
                    after,
                })
            },
        }
    }
}

fn cancelled(key: PeerKey) -> Error {
    Error::WaitCancelled {
        peer: key.peer,
        msg_type: key.msg_type,
    }
}

impl IntoFuture for PendingMessage {
    type Output = Result<Delivery>;
    type IntoFuture = BoxFuture<'static, Result<Delivery>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.recv())
    }
}
