//! # Listener
//!
//! Receiving side of an `EventEmitter`. Dropping a listener detaches it.

use crate::events::BusEvent;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;

/// Errors from non-blocking receives.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ListenerError {
    /// Every emitter clone was dropped.
    #[error("Emitter closed")]
    Closed,
}

/// A handle receiving events from one emitter.
pub struct Listener<E: BusEvent> {
    receiver: broadcast::Receiver<E>,
    filter: Option<E::Name>,
}

impl<E: BusEvent> Listener<E> {
    pub(crate) fn new(receiver: broadcast::Receiver<E>, filter: Option<E::Name>) -> Self {
        Self { receiver, filter }
    }

    fn accepts(&self, event: &E) -> bool {
        self.filter.map_or(true, |name| event.name() == name)
    }

    /// Receive the next matching event.
    ///
    /// Returns `None` once the emitter is gone. Events missed while lagging
    /// are skipped.
    pub async fn recv(&mut self) -> Option<E> {
        loop {
            let event = match self.receiver.recv().await {
                Ok(e) => e,
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    debug!(lagged = count, "Listener lagged, some events dropped");
                    continue;
                }
            };
            if self.accepts(&event) {
                return Some(event);
            }
        }
    }

    /// Receive without waiting. `Ok(None)` means nothing is buffered.
    pub fn try_recv(&mut self) -> Result<Option<E>, ListenerError> {
        loop {
            let event = match self.receiver.try_recv() {
                Ok(e) => e,
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => return Err(ListenerError::Closed),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            };
            if self.accepts(&event) {
                return Ok(Some(event));
            }
        }
    }

    /// The event name this listener is restricted to, if any.
    #[must_use]
    pub fn filter(&self) -> Option<E::Name> {
        self.filter
    }
}

impl<E: BusEvent> Drop for Listener<E> {
    fn drop(&mut self) {
        match self.filter {
            Some(name) => debug!(event = %name, "Listener detached"),
            None => debug!("Listener detached"),
        }
    }
}
