//! Typed session events and their fan-out to observers.

use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc;

use crate::pairer::StreamPairing;
use crate::peer::ConnectionState;

/// A non-2xx response to the offer request, kept raw for the observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseError {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

#[derive(Debug, Clone)]
pub enum SessionEvent<H> {
    /// The server rejected the offer; negotiation halted.
    ResponseError(ResponseError),
    /// A new audio/video grouping is ready to render.
    TrackPaired(StreamPairing<H>),
    ConnectionState(ConnectionState),
}

/// Delivers every emitted event to every live observer, in emission order.
pub struct EventHub<E> {
    observers: Mutex<Vec<mpsc::UnboundedSender<E>>>,
}

impl<E: Clone> EventHub<E> {
    pub fn new() -> Self {
        Self {
            observers: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<E> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Returns the number of observers the event reached.
    pub fn emit(&self, event: E) -> usize {
        let mut observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner);
        observers.retain(|tx| tx.send(event.clone()).is_ok());
        observers.len()
    }

    pub fn observer_count(&self) -> usize {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl<E: Clone> Default for EventHub<E> {
    fn default() -> Self {
        Self::new()
    }
}
