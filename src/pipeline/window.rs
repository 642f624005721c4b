use {
    crate::domain::Interval,
    std::collections::{HashMap, VecDeque},
};

/// Per-interval stride-1 sliding windows of a fixed length.
///
/// Each interval owns one FIFO. When a push fills it, the full contents are
/// emitted and the oldest element is dropped, so a record appears in up to
/// `capacity` consecutive windows and no window is ever short.
#[derive(Debug)]
pub struct WindowAccumulator<T> {
    queues: HashMap<Interval, VecDeque<T>>,
    capacity: usize,
}

impl<T: Clone> WindowAccumulator<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            queues: HashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn push(&mut self, interval: Interval, record: T) -> Option<Vec<T>> {
        let capacity = self.capacity;
        let queue = self
            .queues
            .entry(interval)
            .or_insert_with(|| VecDeque::with_capacity(capacity));
        queue.push_back(record);

        if queue.len() < capacity {
            return None;
        }
        let window: Vec<T> = queue.iter().cloned().collect();
        queue.pop_front();
        Some(window)
    }

    /// Discards whatever is partially accumulated for `interval`.
    pub fn reset(&mut self, interval: Interval) {
        if let Some(queue) = self.queues.get_mut(&interval) {
            queue.clear();
        }
    }

    pub fn pending(&self, interval: Interval) -> usize {
        self.queues.get(&interval).map_or(0, VecDeque::len)
    }
}
