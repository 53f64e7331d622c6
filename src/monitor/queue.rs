//! FIFO of dispatched events between the event source and consumers.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::types::DispatchedEvent;

/// Default number of pending events kept before the oldest are evicted.
pub const DEFAULT_QUEUE_CAPACITY: usize = 65_536;

#[derive(Debug, Default)]
struct QueueState {
    events: VecDeque<DispatchedEvent>,
    shut_down: bool,
    /// Events evicted because the queue was full.
    dropped: u64,
    /// Set while the queue is overflowing, so the warning is logged once.
    overflowing: bool,
}

/// Thread-safe queue with bounded memory.
///
/// Once shut down, pushes are ignored and every pop, current or future,
/// returns `None`.
#[derive(Debug)]
pub struct EventQueue {
    state: Mutex<QueueState>,
    ready: Condvar,
    capacity: usize,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a queue holding at most `capacity` pending events.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            ready: Condvar::new(),
            capacity: capacity.max(1),
        }
    }

    /// Append an event and wake one waiter.
    ///
    /// Returns `false` if the queue is shut down and the event was dropped.
    pub fn push(&self, event: DispatchedEvent) -> bool {
        let mut state = self.state.lock();
        if state.shut_down {
            return false;
        }

        if state.events.len() >= self.capacity {
            state.events.pop_front();
            state.dropped += 1;
            if !state.overflowing {
                state.overflowing = true;
                tracing::warn!(
                    "[queue] full at {} events, dropping oldest (consumer too slow?)",
                    self.capacity
                );
            }
        } else {
            state.overflowing = false;
        }

        state.events.push_back(event);
        self.ready.notify_one();
        true
    }

    /// Block until an event arrives or the queue is shut down.
    pub fn pop_blocking(&self) -> Option<DispatchedEvent> {
        let mut state = self.state.lock();
        loop {
            if state.shut_down {
                return None;
            }
            if let Some(event) = state.events.pop_front() {
                return Some(event);
            }
            self.ready.wait(&mut state);
        }
    }

    /// Take the next event if one is pending. Never blocks.
    pub fn pop_non_blocking(&self) -> Option<DispatchedEvent> {
        let mut state = self.state.lock();
        if state.shut_down {
            return None;
        }
        state.events.pop_front()
    }

    /// Block for at most `timeout` waiting for an event.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<DispatchedEvent> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if state.shut_down {
                return None;
            }
            if let Some(event) = state.events.pop_front() {
                return Some(event);
            }
            if self.ready.wait_until(&mut state, deadline).timed_out() {
                if state.shut_down {
                    return None;
                }
                return state.events.pop_front();
            }
        }
    }

    /// Discard pending events and release every waiter. Idempotent.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        state.shut_down = true;
        state.events.clear();
        self.ready.notify_all();
    }

    pub fn is_shut_down(&self) -> bool {
        self.state.lock().shut_down
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        self.state.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Events evicted because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.state.lock().dropped
    }
}
