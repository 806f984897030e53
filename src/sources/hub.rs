//! Broadcast stream source.

use super::{CancelHandle, Observer, StreamSource};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Shared hub state.
struct HubShared<T, E> {
    /// Live subscribers by id. BTreeMap keeps delivery in registration
    /// order.
    subscribers: Mutex<BTreeMap<u64, Box<dyn Observer<T, E>>>>,
    /// Counter for generating subscriber ids.
    next_id: AtomicU64,
    /// Set once by `close`.
    closed: AtomicBool,
}

/// A multi-subscriber broadcast stream source.
///
/// `emit`, `emit_error`, and `close` deliver to every live subscriber in
/// registration order. Cancelling a subscription removes the observer
/// synchronously: once the cancel returns, no further event reaches it.
/// Clones share the hub.
pub struct EventHub<T, E> {
    shared: Arc<HubShared<T, E>>,
}

impl<T, E> EventHub<T, E> {
    /// Create an open hub with no subscribers.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(HubShared {
                subscribers: Mutex::new(BTreeMap::new()),
                next_id: AtomicU64::new(1),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.lock().len()
    }

    /// Whether the hub has been closed.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Close the stream: deliver completion to every subscriber and drop
    /// them. Closing twice is a no-op.
    pub fn close(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let drained = std::mem::take(&mut *self.shared.subscribers.lock());
        for (_, mut observer) in drained {
            observer.on_done();
        }
    }
}

impl<T: Clone, E> EventHub<T, E> {
    /// Broadcast a value to every live subscriber.
    pub fn emit(&self, value: T) {
        if self.is_closed() {
            tracing::debug!("emit after close ignored");
            return;
        }
        let mut subscribers = self.shared.subscribers.lock();
        for observer in subscribers.values_mut() {
            observer.on_data(value.clone());
        }
    }
}

impl<T, E: Clone> EventHub<T, E> {
    /// Broadcast an error to every live subscriber. The stream stays open.
    pub fn emit_error(&self, error: E) {
        if self.is_closed() {
            tracing::debug!("emit after close ignored");
            return;
        }
        let mut subscribers = self.shared.subscribers.lock();
        for observer in subscribers.values_mut() {
            observer.on_error(error.clone());
        }
    }
}

impl<T, E> Default for EventHub<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> Clone for EventHub<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T, E> StreamSource<T, E> for EventHub<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn subscribe(&self, mut observer: Box<dyn Observer<T, E>>) -> Box<dyn CancelHandle> {
        let mut subscribers = self.shared.subscribers.lock();
        if self.shared.closed.load(Ordering::SeqCst) {
            drop(subscribers);
            observer.on_done();
            return Box::new(HubHandle::<T, E>::detached());
        }

        let id = self.shared.next_id.fetch_add(1, Ordering::SeqCst);
        subscribers.insert(id, observer);
        Box::new(HubHandle {
            id,
            shared: Arc::downgrade(&self.shared),
        })
    }
}

/// Cancellation handle for one hub subscription.
pub struct HubHandle<T, E> {
    id: u64,
    shared: Weak<HubShared<T, E>>,
}

impl<T, E> HubHandle<T, E> {
    /// Handle for a subscription that was already complete at subscribe
    /// time; cancelling it is a no-op.
    fn detached() -> Self {
        Self {
            id: 0,
            shared: Weak::new(),
        }
    }
}

impl<T, E> CancelHandle for HubHandle<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn cancel(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.subscribers.lock().remove(&self.id);
            self.shared = Weak::new();
        }
    }
}
