//! Bounded drop-oldest notification queue

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

/// Everything pending at one wake-up, collapsed to the newest entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coalesced<T> {
    pub latest: T,
    /// Older entries discarded in favour of `latest`
    pub skipped: usize,
}

struct State<T> {
    items: VecDeque<T>,
    closed: bool,
    evicted: u64,
}

/// Single-consumer queue that never blocks the producer
///
/// A push into a full queue evicts the oldest entry first. The consumer
/// only ever sees the newest pending entry per wake-up.
pub struct NotificationQueue<T> {
    state: Mutex<State<T>>,
    notify: Notify,
    capacity: usize,
}

impl<T> NotificationQueue<T> {
    /// Create an empty queue holding at most `capacity` entries (min 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(State {
                items: VecDeque::with_capacity(capacity),
                closed: false,
                evicted: 0,
            }),
            notify: Notify::new(),
            capacity,
        }
    }

    fn state(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Admit `item`; returns true if the oldest entry was evicted for it
    pub fn push(&self, item: T) -> bool {
        let evicted = {
            let mut state = self.state();
            if state.closed {
                return false;
            }
            let evicted = state.items.len() >= self.capacity;
            if evicted {
                state.items.pop_front();
                state.evicted += 1;
            }
            state.items.push_back(item);
            evicted
        };
        self.notify.notify_one();
        evicted
    }

    /// No more pushes; the consumer drains what is left and then sees `None`
    pub fn close(&self) {
        self.state().closed = true;
        self.notify.notify_one();
    }

    /// Take the newest entry and drop the rest, without waiting
    pub fn try_take_latest(&self) -> Option<Coalesced<T>> {
        let mut state = self.state();
        let latest = state.items.pop_back()?;
        let skipped = state.items.len();
        state.items.clear();
        Some(Coalesced { latest, skipped })
    }

    /// Wait for at least one entry, then take the newest and drop the rest
    ///
    /// Returns `None` once the queue is closed and empty.
    pub async fn take_latest(&self) -> Option<Coalesced<T>> {
        loop {
            let notified = self.notify.notified();
            if let Some(batch) = self.try_take_latest() {
                return Some(batch);
            }
            if self.state().closed {
                return None;
            }
            notified.await;
        }
    }

    pub fn len(&self) -> usize {
        self.state().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total entries evicted by full-queue pushes
    pub fn evicted(&self) -> u64 {
        self.state().evicted
    }
}
