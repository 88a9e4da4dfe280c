//! Concurrent indexable FIFO.
//!
//! [`Queue`] is a mutex-protected FIFO that also supports index-based
//! access, search, swap and reorder operations. Consumers that find the
//! queue empty can register as a *listener* and receive the next enqueued
//! value directly, without it ever being placed in the queue.
//!
//! # Listener handoff
//!
//! A listener is the sending half of a `tokio::sync::oneshot` channel kept in
//! a bounded FIFO. [`Queue::enqueue`] pops listeners in registration order and
//! tries to `send` the value; `send` never blocks and fails only when the
//! waiter has already gone, in which case the next listener is tried and,
//! once none remain, the value is appended to the items.
//!
//! Checking for an element and registering a listener happen under the same
//! write lock that `enqueue` takes, so a waiter can never register after a
//! producer has appended without seeing that element.

use std::collections::VecDeque;
use std::fmt;

use parking_lot::RwLock;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use gazebo_core::QueueError;

/// Maximum number of consumers that may wait for the next element at once.
pub const MAX_LISTENERS: usize = 1000;

/// Convenience Result type using [`QueueError`].
pub type Result<T> = std::result::Result<T, QueueError>;

struct Inner<T> {
    items: VecDeque<T>,
    listeners: VecDeque<oneshot::Sender<T>>,
}

impl<T> Inner<T> {
    /// Send `value` to the oldest live listener. Returns it if none took it.
    fn hand_off(&mut self, mut value: T) -> Option<T> {
        while let Some(listener) = self.listeners.pop_front() {
            match listener.send(value) {
                Ok(()) => {
                    trace!("Handed value to waiting listener");
                    return None;
                }
                // The waiter gave up; try the next one.
                Err(returned) => value = returned,
            }
        }
        Some(value)
    }
}

/// Outcome of the check-then-register step of a waiting dequeue.
enum Registration<T> {
    Ready(T),
    Waiting(oneshot::Receiver<T>),
}

/// The receiving side of an async waiter.
///
/// If the waiting future is dropped after a producer already sent into the
/// channel, the value is pulled back out on drop and restored to the queue.
struct PendingListener<'a, T> {
    queue: &'a Queue<T>,
    rx: oneshot::Receiver<T>,
    finished: bool,
}

impl<T> PendingListener<'_, T> {
    async fn recv(&mut self) -> Option<T> {
        let result = (&mut self.rx).await.ok();
        self.finished = true;
        result
    }
}

impl<T> Drop for PendingListener<'_, T> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        // After close() no send can succeed, so try_recv sees every value
        // that was handed to this listener.
        self.rx.close();
        if let Ok(value) = self.rx.try_recv() {
            debug!("Restoring value handed to an abandoned listener");
            self.queue.restore(value);
        }
    }
}

/// A thread-safe FIFO with random access and reorder operations.
///
/// Values are identified by equality (`PartialEq`) for [`remove`](Queue::remove),
/// [`swap`](Queue::swap) and the `move_to_*` operations; the first matching
/// element is the one acted upon. Share a queue between threads with `Arc`.
///
/// All locks are released on unwind: a panicking predicate passed to
/// [`find`](Queue::find) leaves the queue usable.
pub struct Queue<T> {
    inner: RwLock<Inner<T>>,
    max_listeners: usize,
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Queue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("Queue")
            .field("len", &inner.items.len())
            .field("listeners", &inner.listeners.len())
            .field("max_listeners", &self.max_listeners)
            .finish()
    }
}

impl<T> Queue<T> {
    /// Create an empty queue accepting up to [`MAX_LISTENERS`] waiters.
    pub fn new() -> Self {
        Self::with_listener_capacity(MAX_LISTENERS)
    }

    /// Create an empty queue accepting up to `max_listeners` waiters.
    pub fn with_listener_capacity(max_listeners: usize) -> Self {
        Self {
            inner: RwLock::new(Inner {
                items: VecDeque::new(),
                listeners: VecDeque::new(),
            }),
            max_listeners,
        }
    }

    /// Append a value, or hand it straight to the oldest waiting listener.
    ///
    /// Never blocks on a consumer and never fails.
    pub fn enqueue(&self, value: T) {
        let mut inner = self.inner.write();
        if let Some(value) = inner.hand_off(value) {
            inner.items.push_back(value);
        }
    }

    /// Return a value taken back from an abandoned listener. It was the
    /// oldest pending value when it was handed off, so it goes to the next
    /// listener or to the front of the items.
    fn restore(&self, value: T) {
        let mut inner = self.inner.write();
        if let Some(value) = inner.hand_off(value) {
            inner.items.push_front(value);
        }
    }

    /// Remove and return the front element.
    pub fn dequeue(&self) -> Result<T> {
        self.inner
            .write()
            .items
            .pop_front()
            .ok_or(QueueError::QueueEmpty)
    }

    /// Remove and return the front element, blocking the current thread until
    /// one is enqueued if the queue is empty.
    ///
    /// Fails with [`QueueError::TooManyListeners`] without blocking when the
    /// listener FIFO is full.
    ///
    /// # Panics
    ///
    /// Panics if called from within an asynchronous execution context; use
    /// [`dequeue_or_wait_async`](Queue::dequeue_or_wait_async) there.
    pub fn dequeue_or_wait_for_next_element(&self) -> Result<T> {
        loop {
            match self.register()? {
                Registration::Ready(value) => return Ok(value),
                Registration::Waiting(rx) => {
                    if let Ok(value) = rx.blocking_recv() {
                        return Ok(value);
                    }
                }
            }
        }
    }

    /// Async twin of [`dequeue_or_wait_for_next_element`](Queue::dequeue_or_wait_for_next_element).
    ///
    /// Dropping the future abandons the listener. A value already handed to
    /// it is put back at the front of the queue, or passed to the next
    /// listener.
    pub async fn dequeue_or_wait_async(&self) -> Result<T> {
        loop {
            match self.register()? {
                Registration::Ready(value) => return Ok(value),
                Registration::Waiting(rx) => {
                    let mut pending = PendingListener {
                        queue: self,
                        rx,
                        finished: false,
                    };
                    if let Some(value) = pending.recv().await {
                        return Ok(value);
                    }
                }
            }
        }
    }

    fn register(&self) -> Result<Registration<T>> {
        let mut inner = self.inner.write();
        if let Some(value) = inner.items.pop_front() {
            return Ok(Registration::Ready(value));
        }
        inner.listeners.retain(|listener| !listener.is_closed());
        if inner.listeners.len() >= self.max_listeners {
            debug!(
                max_listeners = self.max_listeners,
                "Listener capacity reached"
            );
            return Err(QueueError::TooManyListeners);
        }
        let (tx, rx) = oneshot::channel();
        inner.listeners.push_back(tx);
        trace!(listeners = inner.listeners.len(), "Listener registered");
        Ok(Registration::Waiting(rx))
    }

    /// Indices of all elements matching `predicate`, in queue order.
    pub fn find<F>(&self, mut predicate: F) -> Vec<usize>
    where
        F: FnMut(&T) -> bool,
    {
        self.inner
            .read()
            .items
            .iter()
            .enumerate()
            .filter(|(_, item)| predicate(item))
            .map(|(i, _)| i)
            .collect()
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.inner.read().items.len()
    }

    /// Returns `true` if the queue holds no elements.
    pub fn is_empty(&self) -> bool {
        self.inner.read().items.is_empty()
    }

    /// Number of elements the queue can hold without reallocating.
    pub fn capacity(&self) -> usize {
        self.inner.read().items.capacity()
    }

    /// Number of registered listeners, including any whose waiter has gone
    /// but that no enqueue has discarded yet.
    pub fn listener_count(&self) -> usize {
        self.inner.read().listeners.len()
    }
}

impl<T: Clone> Queue<T> {
    /// The element at `index`.
    pub fn get_element(&self, index: usize) -> Result<T> {
        self.inner
            .read()
            .items
            .get(index)
            .cloned()
            .ok_or(QueueError::IndexOutOfBounds)
    }

    /// A snapshot of every element, front first.
    pub fn get_elements(&self) -> Vec<T> {
        self.inner.read().items.iter().cloned().collect()
    }

    /// Up to `limit` elements starting at `offset`.
    ///
    /// Fails with [`QueueError::IndexOutOfBounds`] if `offset` is past the end
    /// or `limit` is zero.
    pub fn get_filtered_elements(&self, offset: usize, limit: usize) -> Result<Vec<T>> {
        let inner = self.inner.read();
        if offset >= inner.items.len() || limit == 0 {
            return Err(QueueError::IndexOutOfBounds);
        }
        Ok(inner
            .items
            .iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    /// The elements at `ids`, in the order given. Out-of-range ids are skipped.
    pub fn find_by_ids(&self, ids: &[usize]) -> Vec<T> {
        let inner = self.inner.read();
        ids.iter()
            .filter_map(|&id| inner.items.get(id).cloned())
            .collect()
    }
}

impl<T: PartialEq> Queue<T> {
    /// Index of the first element equal to `target`.
    pub fn find_one(&self, target: &T) -> Option<usize> {
        position(&self.inner.read().items, target)
    }

    /// Remove the first element equal to `target`.
    pub fn remove(&self, target: &T) -> Result<()> {
        let mut inner = self.inner.write();
        let index = position(&inner.items, target).ok_or(QueueError::IdNotFound)?;
        inner.items.remove(index);
        Ok(())
    }

    /// Exchange the positions of `a` and `b`.
    pub fn swap(&self, a: &T, b: &T) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.items.is_empty() {
            return Err(QueueError::QueueEmpty);
        }
        let i = position(&inner.items, a).ok_or(QueueError::IdNotFound)?;
        let j = position(&inner.items, b).ok_or(QueueError::IdNotFound)?;
        if i == j {
            return Err(QueueError::SwapIndexesMatch);
        }
        inner.items.swap(i, j);
        Ok(())
    }

    /// Move `target` to the front, shifting the elements before it back by
    /// one. The relative order of every other element is preserved.
    pub fn move_to_front(&self, target: &T) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.items.is_empty() {
            return Err(QueueError::QueueEmpty);
        }
        let index = position(&inner.items, target).ok_or(QueueError::IdNotFound)?;
        if index == 0 {
            return Err(QueueError::MoveIndexFrontPosition);
        }
        for i in (1..=index).rev() {
            inner.items.swap(i, i - 1);
        }
        Ok(())
    }

    /// Move `target` to the back, shifting the elements after it forward by
    /// one. The relative order of every other element is preserved.
    pub fn move_to_back(&self, target: &T) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.items.is_empty() {
            return Err(QueueError::QueueEmpty);
        }
        let index = position(&inner.items, target).ok_or(QueueError::IdNotFound)?;
        let last = inner.items.len() - 1;
        if index == last {
            return Err(QueueError::MoveIndexBackPosition);
        }
        for i in index..last {
            inner.items.swap(i, i + 1);
        }
        Ok(())
    }
}

fn position<T: PartialEq>(items: &VecDeque<T>, target: &T) -> Option<usize> {
    items.iter().position(|item| item == target)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(values: &[i32]) -> Queue<i32> {
        let queue = Queue::new();
        for &v in values {
            queue.enqueue(v);
        }
        queue
    }

    #[test]
    fn test_fifo_order() {
        let queue = Queue::new();
        queue.enqueue("a");
        queue.enqueue("b");
        queue.enqueue("c");
        assert_eq!(queue.dequeue(), Ok("a"));
        assert_eq!(queue.dequeue(), Ok("b"));
        assert_eq!(queue.dequeue(), Ok("c"));
        assert_eq!(queue.dequeue(), Err(QueueError::QueueEmpty));
    }

    #[test]
    fn test_get_element() {
        let queue = filled(&[10, 20, 30]);
        assert_eq!(queue.get_element(1), Ok(20));
        assert_eq!(queue.get_element(3), Err(QueueError::IndexOutOfBounds));
        assert_eq!(queue.get_elements(), vec![10, 20, 30]);
        assert_eq!(queue.len(), 3);
        assert!(queue.capacity() >= 3);
    }

    #[test]
    fn test_get_filtered_elements() {
        let queue = filled(&[1, 2, 3, 4, 5]);
        assert_eq!(queue.get_filtered_elements(1, 2), Ok(vec![2, 3]));
        assert_eq!(queue.get_filtered_elements(3, 10), Ok(vec![4, 5]));
        assert_eq!(
            queue.get_filtered_elements(5, 1),
            Err(QueueError::IndexOutOfBounds)
        );
        assert_eq!(
            queue.get_filtered_elements(0, 0),
            Err(QueueError::IndexOutOfBounds)
        );
    }

    #[test]
    fn test_find() {
        let queue = filled(&[1, 2, 3, 4, 5, 6]);
        assert_eq!(queue.find(|v| v % 2 == 0), vec![1, 3, 5]);
        assert!(queue.find(|v| *v > 100).is_empty());
        assert_eq!(queue.find_one(&4), Some(3));
        assert_eq!(queue.find_one(&42), None);
        assert_eq!(queue.find_by_ids(&[5, 0, 9]), vec![6, 1]);
    }

    #[test]
    fn test_remove() {
        let queue = filled(&[1, 2, 3]);
        assert_eq!(queue.remove(&2), Ok(()));
        assert_eq!(queue.get_elements(), vec![1, 3]);
        assert_eq!(queue.remove(&2), Err(QueueError::IdNotFound));
    }

    #[test]
    fn test_swap() {
        let queue = filled(&[1, 2, 3, 4]);
        queue.swap(&1, &3).unwrap();
        assert_eq!(queue.get_elements(), vec![3, 2, 1, 4]);
        queue.swap(&1, &3).unwrap();
        assert_eq!(queue.get_elements(), vec![1, 2, 3, 4]);
        assert_eq!(queue.swap(&2, &2), Err(QueueError::SwapIndexesMatch));
        assert_eq!(queue.swap(&2, &9), Err(QueueError::IdNotFound));
        assert_eq!(
            Queue::<i32>::new().swap(&1, &2),
            Err(QueueError::QueueEmpty)
        );
    }

    #[test]
    fn test_move_to_front_preserves_order() {
        let queue = Queue::new();
        for v in ["a", "b", "c", "d", "e"] {
            queue.enqueue(v);
        }
        queue.move_to_front(&"d").unwrap();
        assert_eq!(queue.get_elements(), vec!["d", "a", "b", "c", "e"]);
        assert_eq!(
            queue.move_to_front(&"d"),
            Err(QueueError::MoveIndexFrontPosition)
        );
    }

    #[test]
    fn test_move_to_back_preserves_order() {
        let queue = Queue::new();
        for v in ["a", "b", "c", "d", "e"] {
            queue.enqueue(v);
        }
        queue.move_to_back(&"b").unwrap();
        assert_eq!(queue.get_elements(), vec!["a", "c", "d", "e", "b"]);
        assert_eq!(
            queue.move_to_back(&"b"),
            Err(QueueError::MoveIndexBackPosition)
        );
    }

    #[test]
    fn test_move_round_trip() {
        let queue = filled(&(1..=10).collect::<Vec<_>>());
        queue.move_to_front(&5).unwrap();
        assert_eq!(queue.get_elements(), vec![5, 1, 2, 3, 4, 6, 7, 8, 9, 10]);
        queue.move_to_back(&5).unwrap();
        assert_eq!(queue.get_elements(), vec![1, 2, 3, 4, 6, 7, 8, 9, 10, 5]);
    }

    #[test]
    fn test_move_errors() {
        let empty = Queue::<i32>::new();
        assert_eq!(empty.move_to_front(&1), Err(QueueError::QueueEmpty));
        assert_eq!(empty.move_to_back(&1), Err(QueueError::QueueEmpty));
        let queue = filled(&[1, 2]);
        assert_eq!(queue.move_to_front(&7), Err(QueueError::IdNotFound));
        assert_eq!(queue.move_to_back(&7), Err(QueueError::IdNotFound));
    }

    #[test]
    fn test_wait_returns_queued_element_immediately() {
        let queue = filled(&[7]);
        assert_eq!(queue.dequeue_or_wait_for_next_element(), Ok(7));
        assert_eq!(queue.listener_count(), 0);
    }

    #[test]
    fn test_listener_capacity_rejects_without_blocking() {
        let queue = Queue::<i32>::with_listener_capacity(0);
        assert_eq!(
            queue.dequeue_or_wait_for_next_element(),
            Err(QueueError::TooManyListeners)
        );
    }

    #[test]
    fn test_panicking_predicate_releases_lock() {
        let queue = filled(&[1, 2, 3]);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            queue.find(|_| panic!("bad predicate"))
        }));
        assert!(result.is_err());
        queue.enqueue(4);
        assert_eq!(queue.get_elements(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_debug_format() {
        let queue = filled(&[1, 2]);
        let rendered = format!("{queue:?}");
        assert!(rendered.contains("len: 2"));
    }
}
