//! Bounded Queue
//!
//! Fixed-capacity FIFO with blocking, time-bounded `put` and `get`. Built
//! from two counting signals (free slots and filled slots) around a
//! `VecDeque`, so any number of producers and consumers may share it.
//! Items are delivered in exactly the order they were inserted.

use core::time::Duration;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::{lock_unpoisoned, signal::Signal};
use crate::errors::SyncError;

struct QueueInner<T> {
    name: String,
    capacity: usize,
    items: Mutex<VecDeque<T>>,
    free_slots: Signal,
    filled_slots: Signal,
}

/// Bounded multi-producer multi-consumer FIFO. Cloning shares the queue.
pub struct BoundedQueue<T> {
    inner: Arc<QueueInner<T>>,
}

impl<T> Clone for BoundedQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> core::fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BoundedQueue")
            .field("name", &self.inner.name)
            .field("capacity", &self.inner.capacity)
            .field("len", &self.len())
            .finish()
    }
}

impl<T> BoundedQueue<T> {
    /// Create a queue holding at most `capacity` items
    pub fn new<N: Into<String>>(name: N, capacity: usize) -> Result<Self, SyncError> {
        let name = name.into();
        if capacity == 0 {
            return Err(SyncError::creation_failed(name, "capacity must be at least 1"));
        }
        let free_slots = Signal::counting(format!("{}.free", name), capacity, capacity)?;
        let filled_slots = Signal::counting(format!("{}.filled", name), capacity, 0)?;
        Ok(Self {
            inner: Arc::new(QueueInner {
                name,
                capacity,
                items: Mutex::new(VecDeque::with_capacity(capacity)),
                free_slots,
                filled_slots,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn len(&self) -> usize {
        lock_unpoisoned(&self.inner.items).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() == self.inner.capacity
    }

    /// Insert at the tail, waiting up to `timeout` for a free slot. On a
    /// missed deadline the item is dropped and the error returned.
    pub async fn put(&self, item: T, timeout: Option<Duration>) -> Result<(), SyncError> {
        self.inner.free_slots.wait(timeout).await?;
        self.push_reserved(item);
        Ok(())
    }

    /// Insert without waiting; hands the item back when the queue is full
    pub fn try_put(&self, item: T) -> Result<(), T> {
        if !self.inner.free_slots.try_wait() {
            return Err(item);
        }
        self.push_reserved(item);
        Ok(())
    }

    /// Remove from the head, waiting up to `timeout` for an item
    pub async fn get(&self, timeout: Option<Duration>) -> Result<T, SyncError> {
        self.inner.filled_slots.wait(timeout).await?;
        self.pop_reserved()
    }

    /// Remove from the head without waiting
    pub fn try_get(&self) -> Option<T> {
        if !self.inner.filled_slots.try_wait() {
            return None;
        }
        self.pop_reserved().ok()
    }

    /// Close the queue: blocked and future `put`/`get` calls fail with
    /// `SyncError::Closed`. Items still queued are discarded.
    pub fn close(&self) {
        self.inner.free_slots.close();
        self.inner.filled_slots.close();
        lock_unpoisoned(&self.inner.items).clear();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.filled_slots.is_closed()
    }

    fn push_reserved(&self, item: T) {
        lock_unpoisoned(&self.inner.items).push_back(item);
        self.inner.filled_slots.post();
    }

    fn pop_reserved(&self) -> Result<T, SyncError> {
        // A filled-slot unit guarantees an item unless the queue was closed
        let item = lock_unpoisoned(&self.inner.items)
            .pop_front()
            .ok_or_else(|| SyncError::closed(&self.inner.name))?;
        self.inner.free_slots.post();
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_capacity_is_creation_failure() {
        let err = BoundedQueue::<u8>::new("uart", 0).unwrap_err();
        assert!(matches!(err, SyncError::CreationFailed { ref resource, .. } if resource == "uart"));
    }

    #[test]
    fn test_try_put_respects_capacity() {
        let queue = BoundedQueue::new("uart", 2).unwrap();
        assert!(queue.try_put(b'a').is_ok());
        assert!(queue.try_put(b'b').is_ok());
        assert_eq!(queue.try_put(b'c'), Err(b'c'));
        assert!(queue.is_full());
        assert_eq!(queue.try_get(), Some(b'a'));
        assert_eq!(queue.try_get(), Some(b'b'));
        assert_eq!(queue.try_get(), None);
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_times_out_when_full() {
        let queue = BoundedQueue::new("uart", 1).unwrap();
        queue.put(1u8, None).await.unwrap();
        let err = queue
            .put(2u8, Some(Duration::from_millis(10)))
            .await
            .unwrap_err();
        assert!(err.is_deadline_missed());
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_times_out_when_empty() {
        let queue = BoundedQueue::<u8>::new("uart", 4).unwrap();
        let err = queue.get(Some(Duration::from_millis(10))).await.unwrap_err();
        assert!(err.is_deadline_missed());
    }

    #[tokio::test]
    async fn test_blocked_producer_resumes_after_get() {
        let queue = BoundedQueue::new("uart", 1).unwrap();
        queue.put(b'x', None).await.unwrap();

        let producer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.put(b'y', Some(Duration::from_secs(5))).await })
        };
        tokio::task::yield_now().await;

        assert_eq!(queue.get(None).await.unwrap(), b'x');
        producer.await.unwrap().unwrap();
        assert_eq!(queue.get(None).await.unwrap(), b'y');
    }

    #[tokio::test]
    async fn test_close_fails_waiters() {
        let queue = BoundedQueue::<u8>::new("uart", 2).unwrap();
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.get(None).await })
        };
        tokio::task::yield_now().await;
        queue.close();
        assert!(matches!(
            consumer.await.unwrap(),
            Err(SyncError::Closed { .. })
        ));
        assert!(queue.is_closed());
        assert!(queue.try_put(1).is_err());
    }
}
