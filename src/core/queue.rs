//! Thread-safe FIFO shared by the event bridge and the presentation
//! pipeline.
//!
//! One producer pushes from its own thread, one consumer pulls from the
//! loop thread or a presenting thread. The blocking pull waits on the
//! monitor in a predicate-recheck loop, so spurious wakeups never hand out
//! a phantom item. Owners must wake and join any blocked consumer (via a
//! sentinel item) before dropping the queue.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

pub struct BlockingQueue<T> {
    items: Mutex<VecDeque<T>>,
    cond: Condvar,
}

impl<T> BlockingQueue<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            cond: Condvar::new(),
        }
    }

    /// Append an item in arrival order. Signals one waiter if the queue
    /// was empty immediately before the push.
    pub fn push(&self, item: T) {
        let mut items = self.items.lock().unwrap();
        if items.is_empty() {
            self.cond.notify_one();
        }
        items.push_back(item);
    }

    /// Remove and return the oldest item.
    ///
    /// Non-blocking mode returns `None` on an empty queue. Blocking mode
    /// waits until an item is available, rechecking the predicate after
    /// every wakeup.
    pub fn pull(&self, blocking: bool) -> Option<T> {
        let mut items = self.items.lock().unwrap();
        if !blocking {
            return items.pop_front();
        }
        while items.is_empty() {
            items = self.cond.wait(items).unwrap();
        }
        items.pop_front()
    }

    /// Remove and return everything at once. Teardown only.
    pub fn drain(&self) -> Vec<T> {
        let mut items = self.items.lock().unwrap();
        items.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().unwrap().is_empty()
    }
}

impl<T> Default for BlockingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
