//! Main loop for the owning context
//!
//! The application's primary thread owns a [`MainContext`] and drives it by
//! calling one of the iteration methods from its event loop. Other threads
//! (and the owner itself) hand work to it through a cloneable
//! [`MainContextHandle`]:
//!
//! - `invoke` queues a one-shot callback. Worker threads use it to redeliver
//!   job notifications on the owning context.
//! - `add_idle` registers a cooperative source that is re-invoked until it
//!   returns `false`. Cooperative jobs run this way.
//!
//! Pending work is dispatched one entry per iteration, highest
//! [`DispatchPriority`] first and FIFO within a priority. An idle source that
//! wants to continue is re-queued behind entries of the same priority, so
//! several cooperative jobs interleave.

use crate::priority::{DispatchPriority, PriorityQueue};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

type Callback = Box<dyn FnOnce() + Send + 'static>;
type IdleCallback = Box<dyn FnMut() -> bool + Send + 'static>;

enum Message {
    Invoke(DispatchPriority, Callback),
    AddIdle(DispatchPriority, IdleCallback),
}

enum Source {
    Once(Callback),
    Idle(IdleCallback),
}

/// Primary-loop dispatcher owned by one thread
pub struct MainContext {
    owner: ThreadId,
    sender: Sender<Message>,
    receiver: Receiver<Message>,
    pending: PriorityQueue<DispatchPriority, Source>,
}

impl MainContext {
    /// Create a context owned by the calling thread
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            owner: thread::current().id(),
            sender,
            receiver,
            pending: PriorityQueue::new(),
        }
    }

    /// Handle for queueing work onto this context from any thread
    pub fn handle(&self) -> MainContextHandle {
        MainContextHandle {
            owner: self.owner,
            sender: self.sender.clone(),
        }
    }

    /// Whether the calling thread owns this context
    pub fn is_owner(&self) -> bool {
        thread::current().id() == self.owner
    }

    fn enqueue(&self, message: Message) {
        match message {
            Message::Invoke(priority, callback) => {
                self.pending.push(priority, Source::Once(callback));
            }
            Message::AddIdle(priority, callback) => {
                self.pending.push(priority, Source::Idle(callback));
            }
        }
    }

    fn drain_incoming(&self) {
        while let Ok(message) = self.receiver.try_recv() {
            self.enqueue(message);
        }
    }

    /// Number of entries waiting to be dispatched
    pub fn pending(&self) -> usize {
        self.drain_incoming();
        self.pending.len()
    }

    /// Dispatch the highest priority pending entry without blocking
    ///
    /// Returns `true` if something was dispatched.
    pub fn iteration(&mut self) -> bool {
        self.drain_incoming();

        let Some((_, priority, source)) = self.pending.pop() else {
            return false;
        };

        match source {
            Source::Once(callback) => callback(),
            Source::Idle(mut callback) => {
                if callback() {
                    self.pending.push(priority, Source::Idle(callback));
                }
            }
        }

        true
    }

    /// Like [`iteration`](Self::iteration), but waits up to `timeout` for work
    /// to arrive from another thread when nothing is pending
    pub fn iteration_timeout(&mut self, timeout: Duration) -> bool {
        self.drain_incoming();

        if self.pending.is_empty() {
            match self.receiver.recv_timeout(timeout) {
                Ok(message) => self.enqueue(message),
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return false;
                }
            }
        }

        self.iteration()
    }

    /// Dispatch everything currently pending, including idle sources, until
    /// nothing is left
    ///
    /// Returns the number of dispatched entries. Idle sources that never
    /// return `false` keep this from returning.
    pub fn run_until_idle(&mut self) -> usize {
        let mut dispatched = 0;
        while self.iteration() {
            dispatched += 1;
        }
        dispatched
    }

    /// Keep iterating until `done` returns `true` or `timeout` elapses
    ///
    /// Returns the final value of `done`.
    pub fn run_until<F>(&mut self, timeout: Duration, mut done: F) -> bool
    where
        F: FnMut() -> bool,
    {
        let deadline = Instant::now() + timeout;

        loop {
            if done() {
                return true;
            }

            let now = Instant::now();
            if now >= deadline {
                return done();
            }

            self.iteration_timeout((deadline - now).min(Duration::from_millis(10)));
        }
    }
}

impl Default for MainContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable, thread-safe handle to a [`MainContext`]
#[derive(Clone)]
pub struct MainContextHandle {
    owner: ThreadId,
    sender: Sender<Message>,
}

impl MainContextHandle {
    /// Queue a one-shot callback to run on the owning context
    ///
    /// Returns `false` if the context has been dropped.
    pub fn invoke<F>(&self, priority: DispatchPriority, callback: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let sent = self
            .sender
            .send(Message::Invoke(priority, Box::new(callback)))
            .is_ok();
        if !sent {
            tracing::warn!("main context is gone, dropping callback");
        }
        sent
    }

    /// Register a cooperative source, re-invoked while it returns `true`
    ///
    /// Returns `false` if the context has been dropped.
    pub fn add_idle<F>(&self, priority: DispatchPriority, callback: F) -> bool
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let sent = self
            .sender
            .send(Message::AddIdle(priority, Box::new(callback)))
            .is_ok();
        if !sent {
            tracing::warn!("main context is gone, dropping idle source");
        }
        sent
    }

    /// Whether the calling thread owns the context
    pub fn is_owner_thread(&self) -> bool {
        thread::current().id() == self.owner
    }
}

impl std::fmt::Debug for MainContextHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainContextHandle")
            .field("owner", &self.owner)
            .finish()
    }
}
