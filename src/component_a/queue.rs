//! queue.rs
//! Fixed-capacity FIFO shared by the producer path and the transmitter.
//! Every operation is one short critical section under a single mutex;
//! nothing here is ever held across transport I/O.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::reading::Reading;

pub struct BoundedQueue {
    items: Mutex<VecDeque<Reading>>,
    capacity: usize,
}

impl BoundedQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Appends `reading` unless the queue is full. Never blocks on space.
    pub fn try_push(&self, reading: Reading) -> bool {
        let mut items = self.items.lock();
        if items.len() >= self.capacity {
            return false;
        }
        items.push_back(reading);
        true
    }

    /// Removes every queued reading in FIFO order. Empty means nothing was waiting.
    pub fn drain_all(&self) -> Vec<Reading> {
        let mut items = self.items.lock();
        items.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.lock().len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, thread};

    fn reading(value: f32) -> Reading {
        Reading::new(1, 1, value)
    }

    #[test]
    fn drain_preserves_push_order() {
        let q = BoundedQueue::new(5);
        for v in [1.0, 2.0, 3.0] {
            assert!(q.try_push(reading(v)));
        }
        let values: Vec<f32> = q.drain_all().iter().map(|r| r.value).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn second_drain_is_empty() {
        let q = BoundedQueue::new(5);
        q.try_push(reading(1.0));
        q.try_push(reading(2.0));
        assert_eq!(q.drain_all().len(), 2);
        assert!(q.drain_all().is_empty());
        assert!(q.is_empty());
    }

    #[test]
    fn full_queue_rejects_push() {
        let q = BoundedQueue::new(2);
        assert!(q.try_push(reading(1.0)));
        assert!(!q.is_full());
        assert!(q.try_push(reading(2.0)));
        assert!(q.is_full());
        assert!(!q.try_push(reading(3.0)));
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn concurrent_producers_never_exceed_capacity() {
        let q = Arc::new(BoundedQueue::new(5));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let q = Arc::clone(&q);
                thread::spawn(move || {
                    for i in 0..200 {
                        q.try_push(Reading::new(t, 1, i as f32));
                        assert!(q.len() <= q.capacity());
                        if i % 7 == 0 {
                            assert!(q.drain_all().len() <= 5);
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(q.len() <= 5);
    }
}
