use std::time::Duration;

use crossbeam_channel::{Receiver, SendTimeoutError, Sender, TrySendError};

/// Fixed-capacity FIFO shared between the audio workers and the code that
/// feeds or consumes them.
///
/// A `crossbeam_channel::bounded` channel whose two ends both live here, so
/// any holder can push, pop or evict. Every blocking operation takes a
/// timeout so a worker never waits longer than one interval before
/// re-checking its run flags.
pub struct BoundedQueue<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    /// Create a queue holding at most `capacity` items (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        Self { tx, rx, capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.tx.is_full()
    }

    /// Push, waiting up to `timeout` for room. Gives the item back on timeout.
    pub fn push_timeout(&self, item: T, timeout: Duration) -> Result<(), T> {
        self.tx
            .send_timeout(item, timeout)
            .map_err(SendTimeoutError::into_inner)
    }

    /// Push without waiting. Gives the item back if the queue is full.
    pub fn try_push(&self, item: T) -> Result<(), T> {
        self.tx.try_send(item).map_err(TrySendError::into_inner)
    }

    /// Drop-oldest push: if full, evict the single oldest item, then push,
    /// waiting up to `timeout` should other producers have refilled the gap.
    ///
    /// Returns the evicted item, if any, or gives `item` back on timeout.
    pub fn force_push(&self, item: T, timeout: Duration) -> Result<Option<T>, T> {
        let item = match self.tx.try_send(item) {
            Ok(()) => return Ok(None),
            Err(TrySendError::Full(item)) => item,
            Err(TrySendError::Disconnected(item)) => return Err(item),
        };
        let evicted = self.rx.try_recv().ok();
        self.push_timeout(item, timeout)?;
        Ok(evicted)
    }

    /// Pop the oldest item, waiting up to `timeout` for one to arrive.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        self.rx.recv_timeout(timeout).ok()
    }

    pub fn try_pop(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Discard everything currently queued without blocking. Returns how many
    /// items were dropped.
    pub fn drain(&self) -> usize {
        let mut dropped = 0;
        while self.rx.try_recv().is_ok() {
            dropped += 1;
        }
        dropped
    }
}

impl<T> std::fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedQueue")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    const SHORT: Duration = Duration::from_millis(20);

    #[test]
    fn fifo_order() {
        let q = BoundedQueue::new(3);
        q.try_push(1).unwrap();
        q.try_push(2).unwrap();
        assert_eq!(q.try_pop(), Some(1));
        assert_eq!(q.try_pop(), Some(2));
        assert_eq!(q.try_pop(), None);
    }

    #[test]
    fn push_times_out_when_full() {
        let q = BoundedQueue::new(1);
        q.try_push(1).unwrap();
        let started = Instant::now();
        assert_eq!(q.push_timeout(2, SHORT), Err(2));
        assert!(started.elapsed() >= SHORT);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn pop_times_out_when_empty() {
        let q: BoundedQueue<u8> = BoundedQueue::new(1);
        assert_eq!(q.pop_timeout(SHORT), None);
    }

    #[test]
    fn force_push_keeps_most_recent() {
        let q = BoundedQueue::new(50);
        for i in 0..120 {
            q.force_push(i, SHORT).unwrap();
            assert!(q.len() <= 50);
        }
        assert_eq!(q.len(), 50);
        let kept: Vec<_> = std::iter::from_fn(|| q.try_pop()).collect();
        assert_eq!(kept, (70..120).collect::<Vec<_>>());
    }

    #[test]
    fn force_push_reports_eviction() {
        let q = BoundedQueue::new(1);
        assert_eq!(q.force_push("a", SHORT), Ok(None));
        assert_eq!(q.force_push("b", SHORT), Ok(Some("a")));
    }

    #[test]
    fn drain_empties_and_counts() {
        let q = BoundedQueue::new(5);
        for i in 0..4 {
            q.try_push(i).unwrap();
        }
        assert_eq!(q.drain(), 4);
        assert!(q.is_empty());
        assert_eq!(q.drain(), 0);
    }

    #[test]
    fn blocked_producer_wakes_on_pop() {
        let q = Arc::new(BoundedQueue::new(1));
        q.try_push(0).unwrap();

        let producer = {
            let q = Arc::clone(&q);
            thread::spawn(move || q.push_timeout(1, Duration::from_secs(2)))
        };
        thread::sleep(SHORT);
        assert_eq!(q.pop_timeout(SHORT), Some(0));
        assert_eq!(producer.join().unwrap(), Ok(()));
        assert_eq!(q.pop_timeout(SHORT), Some(1));
    }

    #[test]
    fn drain_makes_room_for_blocked_producer() {
        let q = Arc::new(BoundedQueue::new(2));
        q.try_push(0).unwrap();
        q.try_push(1).unwrap();

        let producer = {
            let q = Arc::clone(&q);
            thread::spawn(move || q.push_timeout(2, Duration::from_secs(2)))
        };
        thread::sleep(SHORT);
        let dropped = q.drain();
        assert_eq!(producer.join().unwrap(), Ok(()));
        // The producer may slip its item in before the drain finishes.
        assert!(dropped >= 2);
        assert_eq!(dropped + q.len(), 3);
    }

    #[test]
    fn zero_capacity_is_one() {
        let q = BoundedQueue::new(0);
        assert_eq!(q.capacity(), 1);
        assert!(q.try_push(()).is_ok());
        assert!(q.is_full());
    }
}
