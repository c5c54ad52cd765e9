use std::collections::vec_deque::{self, VecDeque};

/// Fixed-capacity FIFO; pushing onto a full history drops the oldest item.
#[derive(Debug, Clone)]
pub struct BoundedHistory<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedHistory<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity.min(4096)),
            capacity,
        }
    }

    pub fn push(&mut self, item: T) {
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn iter(&self) -> vec_deque::Iter<'_, T> {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T: Clone> BoundedHistory<T> {
    /// The newest `n` items, oldest first.
    pub fn last_n(&self, n: usize) -> Vec<T> {
        let skip = self.items.len().saturating_sub(n);
        self.items.iter().skip(skip).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_exceeds_capacity() {
        let mut history = BoundedHistory::new(3);
        for i in 0..10 {
            history.push(i);
            assert!(history.len() <= 3);
        }

        assert_eq!(history.last_n(10), vec![7, 8, 9]);
        assert_eq!(history.latest(), Some(&9));
    }

    #[test]
    fn test_last_n() {
        let mut history = BoundedHistory::new(100);
        for i in 0..5 {
            history.push(i);
        }

        assert_eq!(history.last_n(2), vec![3, 4]);
        assert_eq!(history.last_n(0), Vec::<i32>::new());
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut history = BoundedHistory::new(0);
        history.push("a");
        history.push("b");
        assert_eq!(history.capacity(), 1);
        assert_eq!(history.last_n(5), vec!["b"]);
    }
}
