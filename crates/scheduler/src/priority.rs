//! Priority levels and the priority queue shared by the worker pool and the
//! main loop
//!
//! Entries are dequeued highest priority first, FIFO within a priority level.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Mutex, PoisonError};

/// Job priority levels
///
/// Higher numeric values have higher priority and are executed first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum JobPriority {
    /// Background work nobody is waiting on
    None = 0,

    /// Prefetch and other speculative work
    #[default]
    Low = 1,

    /// Work for content close to what is visible
    High = 2,

    /// Work for visible content, must run immediately
    Urgent = 3,
}

/// Dispatch priority inside the main loop
///
/// Mirrors the idle priorities of a classic event loop: `High` entries are
/// dispatched before `Default` ones, which run before `Low` ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum DispatchPriority {
    /// Cooperative work that can wait
    Low = 0,

    /// Ordinary notifications ("finished", "updated") and cooperative jobs
    #[default]
    Default = 1,

    /// Partial results such as "page-ready"
    High = 2,
}

impl From<JobPriority> for DispatchPriority {
    fn from(priority: JobPriority) -> Self {
        match priority {
            JobPriority::Urgent => DispatchPriority::High,
            JobPriority::High => DispatchPriority::Default,
            JobPriority::Low | JobPriority::None => DispatchPriority::Low,
        }
    }
}

/// Unique identifier of a queued entry
pub type EntryId = u64;

/// A queued item with its priority
///
/// Ordered by priority (higher first), then by insertion order (earlier
/// first) so that equal priorities stay FIFO.
struct Entry<P, T> {
    id: EntryId,
    priority: P,
    insertion_order: u64,
    item: T,
}

impl<P: Ord, T> PartialEq for Entry<P, T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<P: Ord, T> Eq for Entry<P, T> {}

impl<P: Ord, T> PartialOrd for Entry<P, T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<P: Ord, T> Ord for Entry<P, T> {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.priority.cmp(&other.priority) {
            // BinaryHeap is a max heap, so reverse insertion order
            Ordering::Equal => other.insertion_order.cmp(&self.insertion_order),
            other => other,
        }
    }
}

/// Priority queue
///
/// Thread-safe queue that orders items by priority and insertion order.
pub struct PriorityQueue<P, T> {
    state: Mutex<QueueState<P, T>>,
}

struct QueueState<P, T> {
    /// Binary heap for priority-ordered entries (max heap)
    heap: BinaryHeap<Entry<P, T>>,

    /// Next entry ID (for automatic ID assignment)
    next_id: EntryId,

    /// Insertion counter (for FIFO ordering within same priority)
    insertion_counter: u64,
}

impl<P: Ord + Copy, T> PriorityQueue<P, T> {
    /// Create a new empty priority queue
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                heap: BinaryHeap::new(),
                next_id: 1,
                insertion_counter: 0,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState<P, T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Push an item onto the queue
    ///
    /// Returns the ID assigned to the entry.
    pub fn push(&self, priority: P, item: T) -> EntryId {
        let mut state = self.lock();
        let id = state.next_id;
        state.next_id += 1;

        let insertion_order = state.insertion_counter;
        state.insertion_counter += 1;

        state.heap.push(Entry {
            id,
            priority,
            insertion_order,
            item,
        });

        id
    }

    /// Pop the highest priority item from the queue
    pub fn pop(&self) -> Option<(EntryId, P, T)> {
        let mut state = self.lock();
        state
            .heap
            .pop()
            .map(|entry| (entry.id, entry.priority, entry.item))
    }

    /// Get the number of items in the queue
    pub fn len(&self) -> usize {
        self.lock().heap.len()
    }

    /// Check if the queue is empty
    pub fn is_empty(&self) -> bool {
        self.lock().heap.is_empty()
    }

    /// Remove all items matching a predicate
    ///
    /// Returns the number of items removed.
    pub fn remove_if<F>(&self, predicate: F) -> usize
    where
        F: Fn(&T) -> bool,
    {
        let mut state = self.lock();
        let original_len = state.heap.len();

        let remaining: Vec<_> = std::mem::take(&mut state.heap)
            .into_vec()
            .into_iter()
            .filter(|entry| !predicate(&entry.item))
            .collect();
        state.heap = remaining.into_iter().collect();

        original_len - state.heap.len()
    }
}

impl<P: Ord + Copy, T> Default for PriorityQueue<P, T> {
    fn default() -> Self {
        Self::new()
    }
}
