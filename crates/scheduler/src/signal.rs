//! Notification handlers for jobs
//!
//! A `Signal` is a list of handlers that consumers connect to. Jobs emit
//! signals only on the owning context; handlers therefore never run on a
//! worker thread, but they are stored in a job that is shared with one, so
//! they must be `Send + Sync`.

use std::sync::{Arc, Mutex, PoisonError};

/// Identifier returned by [`Signal::connect`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

type Handler<A> = Arc<dyn Fn(&A) + Send + Sync>;

/// A named notification with a payload of type `A`
///
/// Handlers that need the emitting job should capture a `Weak` reference to
/// it; capturing an `Arc` creates a cycle that keeps the job alive.
pub struct Signal<A> {
    name: &'static str,
    handlers: Mutex<SignalHandlers<A>>,
}

struct SignalHandlers<A> {
    next_id: u64,
    entries: Vec<(HandlerId, Handler<A>)>,
}

impl<A> Signal<A> {
    /// Create a signal with no handlers
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            handlers: Mutex::new(SignalHandlers {
                next_id: 1,
                entries: Vec::new(),
            }),
        }
    }

    /// Name of the signal, e.g. `"finished"`
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Connect a handler
    pub fn connect<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        let mut handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        let id = HandlerId(handlers.next_id);
        handlers.next_id += 1;
        handlers.entries.push((id, Arc::new(handler)));
        id
    }

    /// Disconnect a handler. Returns `false` if it was not connected.
    pub fn disconnect(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        let before = handlers.entries.len();
        handlers.entries.retain(|(handler_id, _)| *handler_id != id);
        handlers.entries.len() != before
    }

    /// Number of connected handlers
    pub fn handler_count(&self) -> usize {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    /// Invoke every connected handler in connection order
    ///
    /// The handler list is snapshotted first, so handlers may connect or
    /// disconnect while being emitted.
    pub fn emit(&self, payload: &A) {
        let snapshot: Vec<Handler<A>> = self
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();

        for handler in snapshot {
            handler(payload);
        }
    }
}

impl<A> std::fmt::Debug for Signal<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("name", &self.name)
            .field("handlers", &self.handler_count())
            .finish()
    }
}
