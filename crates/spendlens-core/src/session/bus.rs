//! Typed publish/subscribe channel for session transitions.
//!
//! Delivery is synchronous: a published event reaches every listener that is
//! subscribed at that moment before `flush` returns. Late subscribers do not
//! see history; they read the latest state from the session manager.
//!
//! Events are queued and drained by a single dispatcher at a time, so a
//! listener that itself causes a transition does not deadlock and the nested
//! event is delivered after the current one, preserving transition order.

use super::SessionEvent;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::mpsc;

type Listener = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

#[derive(Default)]
struct BusInner {
    listeners: Mutex<Vec<(u64, Listener)>>,
    pending: Mutex<VecDeque<SessionEvent>>,
    dispatching: AtomicBool,
    next_id: AtomicU64,
}

impl BusInner {
    fn listeners(&self) -> MutexGuard<'_, Vec<(u64, Listener)>> {
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn pending(&self) -> MutexGuard<'_, VecDeque<SessionEvent>> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn remove(&self, id: u64) -> bool {
        let mut listeners = self.listeners();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }
}

/// Broadcast bus for [`SessionEvent`]s.
///
/// Cloning a bus yields another handle to the same set of listeners.
#[derive(Clone, Default)]
pub struct SessionBus {
    inner: Arc<BusInner>,
}

impl SessionBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener. The listener stays attached until the returned
    /// [`Subscription`] is dropped or explicitly unsubscribed.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners().push((id, Arc::new(listener)));
        Subscription {
            id,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Subscribes a channel instead of a callback, for async consumers.
    pub fn subscribe_channel(&self) -> (Subscription, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.subscribe(move |event| {
            let _ = tx.send(event.clone());
        });
        (subscription, rx)
    }

    /// Number of attached listeners.
    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners().len()
    }

    /// Queues an event and delivers everything pending.
    pub fn publish(&self, event: SessionEvent) {
        self.enqueue(event);
        self.flush();
    }

    /// Queues an event without delivering it.
    ///
    /// The session manager enqueues while it still holds its state lock, which
    /// fixes the delivery order to the transition order.
    pub(crate) fn enqueue(&self, event: SessionEvent) {
        self.inner.pending().push_back(event);
    }

    /// Delivers pending events unless another caller is already doing so.
    pub(crate) fn flush(&self) {
        loop {
            if self
                .inner
                .dispatching
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return;
            }

            loop {
                let Some(event) = self.inner.pending().pop_front() else {
                    break;
                };
                // Snapshot so listeners may (un)subscribe while being called.
                let listeners: Vec<Listener> = self
                    .inner
                    .listeners()
                    .iter()
                    .map(|(_, listener)| listener.clone())
                    .collect();
                tracing::debug!(
                    cause = ?event.cause,
                    epoch = event.epoch,
                    listeners = listeners.len(),
                    "Delivering session event"
                );
                for listener in listeners {
                    listener(&event);
                }
            }

            self.inner.dispatching.store(false, Ordering::Release);

            // An event may have been queued between the last pop and the reset.
            if self.inner.pending().is_empty() {
                return;
            }
        }
    }
}

/// Handle to an attached listener. Dropping it detaches the listener.
#[must_use = "dropping a Subscription immediately unsubscribes the listener"]
pub struct Subscription {
    id: u64,
    bus: Weak<BusInner>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Detaches the listener now.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.remove(self.id);
        }
    }
}
