//! # Event Emitter
//!
//! Publishing side of a typed event channel. One emitter exists per open
//! database and one for the handle manager.

use crate::events::BusEvent;
use crate::listener::Listener;
use crate::DEFAULT_CHANNEL_CAPACITY;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace};

struct EmitterInner<E: BusEvent> {
    sender: broadcast::Sender<E>,
    events_emitted: AtomicU64,
    capacity: usize,
}

/// Cloneable emitter backed by `tokio::sync::broadcast`.
///
/// Listeners observe the end of the channel once every clone of the
/// emitter has been dropped.
pub struct EventEmitter<E: BusEvent> {
    inner: Arc<EmitterInner<E>>,
}

impl<E: BusEvent> EventEmitter<E> {
    /// Create an emitter with the default buffer size.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create an emitter buffering at most `capacity` events per listener.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(EmitterInner {
                sender,
                events_emitted: AtomicU64::new(0),
                capacity,
            }),
        }
    }

    /// Emit an event to every attached listener.
    ///
    /// Returns the number of listeners that received it. Emitting with no
    /// listeners attached is not an error.
    pub fn emit(&self, event: E) -> usize {
        self.inner.events_emitted.fetch_add(1, Ordering::Relaxed);
        let name = event.name();
        match self.inner.sender.send(event) {
            Ok(receivers) => {
                trace!(event = %name, receivers, "Event emitted");
                receivers
            }
            Err(_) => {
                trace!(event = %name, "Event emitted with no listeners");
                0
            }
        }
    }

    /// Attach a listener receiving every event.
    #[must_use]
    pub fn listen(&self) -> Listener<E> {
        debug!("Listener attached");
        Listener::new(self.inner.sender.subscribe(), None)
    }

    /// Attach a listener receiving only events named `name`.
    #[must_use]
    pub fn listen_for(&self, name: E::Name) -> Listener<E> {
        debug!(event = %name, "Listener attached");
        Listener::new(self.inner.sender.subscribe(), Some(name))
    }

    /// Number of attached listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.sender.receiver_count()
    }

    /// Total events emitted over the emitter's lifetime.
    #[must_use]
    pub fn events_emitted(&self) -> u64 {
        self.inner.events_emitted.load(Ordering::Relaxed)
    }

    /// Per-listener buffer size.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }
}

impl<E: BusEvent> Clone for EventEmitter<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: BusEvent> Default for EventEmitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: BusEvent> std::fmt::Debug for EventEmitter<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("listeners", &self.listener_count())
            .field("events_emitted", &self.events_emitted())
            .finish()
    }
}
