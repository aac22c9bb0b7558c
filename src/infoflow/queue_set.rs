// CLASSIFICATION: COMMUNITY
// Filename: queue_set.rs v1.2
// Author: Lukas Bower
// Date Modified: 2026-10-19

use log::trace;
use std::collections::{HashSet, VecDeque};
use std::fmt::Debug;
use std::hash::Hash;

// === QueueSet Struct ===
/// FIFO queue that holds each pending item at most once. An item may be
/// queued again after it has been popped.
#[derive(Debug)]
pub struct QueueSet<T> {
    buffer: VecDeque<T>,
    pending: HashSet<T>,
}

impl<T: Clone + Eq + Hash + Debug> Default for QueueSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Eq + Hash + Debug> QueueSet<T> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            buffer: VecDeque::new(),
            pending: HashSet::new(),
        }
    }

    /// Enqueue unless already pending. Returns whether it was added.
    pub fn push(&mut self, item: T) -> bool {
        if !self.pending.insert(item.clone()) {
            trace!("already queued: {:?}", item);
            return false;
        }
        self.buffer.push_back(item);
        true
    }

    pub fn pop(&mut self) -> Option<T> {
        let item = self.buffer.pop_front()?;
        self.pending.remove(&item);
        Some(item)
    }

    pub fn contains(&self, item: &T) -> bool {
        self.pending.contains(item)
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_are_ignored_until_popped() {
        let mut q = QueueSet::new();
        assert!(q.push(1));
        assert!(q.push(2));
        assert!(!q.push(1));
        assert_eq!(q.len(), 2);
        assert_eq!(q.pop(), Some(1));
        assert!(q.push(1));
        assert_eq!(q.pop(), Some(2));
        assert_eq!(q.pop(), Some(1));
        assert!(q.is_empty());
    }
}
