//! Bounded drop-oldest queue shared between capture threads.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// Outcome of a timed pop.
#[derive(Debug, PartialEq, Eq)]
pub enum Pop<T> {
    Item(T),
    /// Nothing arrived within the timeout.
    Empty,
    /// Closed and fully drained.
    Closed,
}

/// Returned when pushing to a closed queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueClosed;

/// A thread-safe bounded queue that never blocks writers.
///
/// When full, a push evicts the oldest item: for a live feed the newest
/// frame matters more than a complete history. Closing lets readers drain
/// what is left and then observe [`Pop::Closed`].
///
/// ```
/// use facetriage_capture::{DropQueue, Pop};
/// use std::time::Duration;
///
/// let q = DropQueue::new(2);
/// q.push(1).unwrap();
/// q.push(2).unwrap();
/// assert_eq!(q.push(3).unwrap(), Some(1));
/// assert_eq!(q.pop_timeout(Duration::ZERO), Pop::Item(2));
/// ```
pub struct DropQueue<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    state: Mutex<State<T>>,
    notify: Condvar,
}

struct State<T> {
    items: VecDeque<T>,
    capacity: usize,
    closed: bool,
    dropped: u64,
}

impl<T> Clone for DropQueue<T> {
    fn clone(&self) -> Self {
        DropQueue {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> DropQueue<T> {
    /// Creates a queue holding at most `capacity` items (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        DropQueue {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    items: VecDeque::with_capacity(capacity),
                    capacity,
                    closed: false,
                    dropped: 0,
                }),
                notify: Condvar::new(),
            }),
        }
    }

    /// Appends `item`, returning the evicted oldest item if the queue was
    /// full.
    pub fn push(&self, item: T) -> Result<Option<T>, QueueClosed> {
        let mut state = self.inner.state.lock();
        if state.closed {
            return Err(QueueClosed);
        }
        let evicted = if state.items.len() >= state.capacity {
            state.dropped += 1;
            state.items.pop_front()
        } else {
            None
        };
        state.items.push_back(item);
        self.inner.notify.notify_one();
        Ok(evicted)
    }

    /// Takes the oldest item, waiting up to `timeout` for one to arrive.
    pub fn pop_timeout(&self, timeout: Duration) -> Pop<T> {
        let mut state = self.inner.state.lock();
        if state.items.is_empty() && !state.closed && !timeout.is_zero() {
            // Spurious wakeups are fine: the caller loops on Empty.
            self.inner.notify.wait_for(&mut state, timeout);
        }
        match state.items.pop_front() {
            Some(item) => Pop::Item(item),
            None if state.closed => Pop::Closed,
            None => Pop::Empty,
        }
    }

    /// Takes the oldest item without waiting.
    pub fn try_pop(&self) -> Option<T> {
        self.inner.state.lock().items.pop_front()
    }

    /// Removes and returns everything queued.
    pub fn drain(&self) -> Vec<T> {
        self.inner.state.lock().items.drain(..).collect()
    }

    /// Rejects further pushes and wakes every waiting reader.
    pub fn close(&self) {
        let mut state = self.inner.state.lock();
        state.closed = true;
        self.inner.notify.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.state.lock().capacity
    }

    /// Items evicted so far.
    pub fn dropped(&self) -> u64 {
        self.inner.state.lock().dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn keeps_newest() {
        let q = DropQueue::new(3);
        for i in 0..10 {
            q.push(i).unwrap();
        }
        assert_eq!(q.len(), 3);
        assert_eq!(q.dropped(), 7);
        assert_eq!(q.drain(), vec![7, 8, 9]);
    }

    #[test]
    fn zero_capacity_holds_one() {
        let q = DropQueue::new(0);
        q.push("a").unwrap();
        assert_eq!(q.push("b").unwrap(), Some("a"));
        assert_eq!(q.capacity(), 1);
    }

    #[test]
    fn pop_times_out_when_empty() {
        let q: DropQueue<u8> = DropQueue::new(1);
        let start = Instant::now();
        assert_eq!(q.pop_timeout(Duration::from_millis(30)), Pop::Empty);
        assert!(start.elapsed() >= Duration::from_millis(25));
    }

    #[test]
    fn close_drains_then_reports_closed() {
        let q = DropQueue::new(4);
        q.push(1).unwrap();
        q.push(2).unwrap();
        q.close();
        assert_eq!(q.push(3), Err(QueueClosed));
        assert_eq!(q.pop_timeout(Duration::ZERO), Pop::Item(1));
        assert_eq!(q.pop_timeout(Duration::ZERO), Pop::Item(2));
        assert_eq!(q.pop_timeout(Duration::from_secs(5)), Pop::Closed);
    }

    #[test]
    fn close_wakes_blocked_reader() {
        let q: DropQueue<u32> = DropQueue::new(1);
        let reader = {
            let q = q.clone();
            thread::spawn(move || {
                let start = Instant::now();
                let got = q.pop_timeout(Duration::from_secs(10));
                (got, start.elapsed())
            })
        };
        thread::sleep(Duration::from_millis(20));
        q.close();
        let (got, waited) = reader.join().unwrap();
        assert_eq!(got, Pop::Closed);
        assert!(waited < Duration::from_secs(5));
    }

    #[test]
    fn push_wakes_blocked_reader() {
        let q = DropQueue::new(1);
        let reader = {
            let q = q.clone();
            thread::spawn(move || q.pop_timeout(Duration::from_secs(10)))
        };
        thread::sleep(Duration::from_millis(20));
        q.push(42u32).unwrap();
        assert_eq!(reader.join().unwrap(), Pop::Item(42));
    }
}
