//! Live notification fan-out.
//!
//! A [`Broadcaster`] keeps a registry of subscribers, each with its own
//! small bounded queue. [`Broadcaster::notify`] never blocks: a subscriber
//! whose queue is full simply misses that notification. A stalled consumer
//! therefore only ever sees a stale view and can catch up by re-querying the
//! store with its last cursor.
//!
//! A [`Subscription`] unregisters itself on [`close`](Subscription::close)
//! or when dropped. Streams also end when the broadcaster itself is dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

pub use tokio::sync::mpsc::error::TryRecvError;

/// Per-subscriber queue length used when none (or zero) is configured.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 10;

/// Signal delivered to clear subscribers after a store was emptied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Cleared {
    /// Number of entries the clear removed.
    pub removed: usize,
}

struct Registry<T> {
    subscribers: RwLock<HashMap<u64, mpsc::Sender<T>>>,
    next_id: AtomicU64,
}

/// Fan-out point for one kind of notification.
pub struct Broadcaster<T> {
    registry: Arc<Registry<T>>,
    buffer: usize,
}

impl<T> std::fmt::Debug for Broadcaster<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broadcaster")
            .field("subscribers", &self.registry.subscribers.read().len())
            .field("buffer", &self.buffer)
            .finish()
    }
}

impl<T: Clone + Send + 'static> Broadcaster<T> {
    /// Creates a broadcaster whose subscribers each buffer up to `buffer`
    /// notifications. A `buffer` of zero falls back to
    /// [`DEFAULT_SUBSCRIBER_BUFFER`].
    pub fn new(buffer: usize) -> Self {
        let buffer = if buffer == 0 {
            tracing::debug!(
                default = DEFAULT_SUBSCRIBER_BUFFER,
                "zero subscriber buffer, using default"
            );
            DEFAULT_SUBSCRIBER_BUFFER
        } else {
            buffer
        };
        Self {
            registry: Arc::new(Registry {
                subscribers: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
            buffer,
        }
    }

    /// Registers a new subscriber.
    pub fn subscribe(&self) -> Subscription<T> {
        let (sender, receiver) = mpsc::channel(self.buffer);
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry.subscribers.write().insert(id, sender);
        tracing::debug!(subscriber = id, "subscriber registered");

        Subscription {
            id,
            receiver,
            registry: Arc::downgrade(&self.registry),
            closed: false,
        }
    }

    /// Delivers `value` to every live subscriber without blocking.
    ///
    /// Returns the number of subscribers that accepted the notification.
    pub fn notify(&self, value: &T) -> usize {
        let subscribers = self.registry.subscribers.read();
        let mut delivered = 0;
        for (id, sender) in subscribers.iter() {
            match sender.try_send(value.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::trace!(subscriber = id, "subscriber queue full, notification dropped");
                }
                Err(TrySendError::Closed(_)) => {}
            }
        }
        delivered
    }

    /// Returns the number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.registry.subscribers.read().len()
    }

    /// Returns the per-subscriber queue length.
    pub fn buffer(&self) -> usize {
        self.buffer
    }
}

/// Receiving end of a [`Broadcaster`] registration.
pub struct Subscription<T> {
    id: u64,
    receiver: mpsc::Receiver<T>,
    registry: Weak<Registry<T>>,
    closed: bool,
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("closed", &self.closed)
            .finish()
    }
}

impl<T> Subscription<T> {
    /// Returns the subscriber id, unique within its broadcaster.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Waits for the next notification.
    ///
    /// Returns `None` once the subscription is closed (and its buffer
    /// drained) or the broadcaster has been dropped.
    pub async fn recv(&mut self) -> Option<T> {
        self.receiver.recv().await
    }

    /// Blocking variant of [`recv`](Self::recv) for plain threads.
    ///
    /// # Panics
    ///
    /// Panics if called from within an asynchronous execution context.
    pub fn blocking_recv(&mut self) -> Option<T> {
        self.receiver.blocking_recv()
    }

    /// Returns a buffered notification if one is ready.
    ///
    /// # Errors
    ///
    /// [`TryRecvError::Empty`] when nothing is buffered yet and
    /// [`TryRecvError::Disconnected`] once the stream has ended.
    pub fn try_recv(&mut self) -> Result<T, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Unregisters from the broadcaster and ends the stream.
    ///
    /// Notifications already buffered can still be drained. Calling this
    /// more than once has no further effect.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(registry) = self.registry.upgrade() {
            registry.subscribers.write().remove(&self.id);
        }
        self.receiver.close();
        tracing::debug!(subscriber = self.id, "subscriber closed");
    }

    /// Returns whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.close();
    }
}
