//! Bounded per-tag value history.

use std::collections::VecDeque;

use smol_str::SmolStr;

/// Default number of samples retained per tag.
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// One recorded value with the wall-clock timestamp it carried.
#[derive(Debug, Clone, PartialEq)]
pub struct HistorySample {
    /// Recorded value.
    pub value: f64,
    /// Timestamp the value carried when it was recorded (`HH:MM:SS`).
    pub timestamp: SmolStr,
}

/// Bounded FIFO trail of past values for one tag.
///
/// Capacity is fixed at construction. Appending beyond capacity evicts
/// the oldest sample; insertion order is preserved (oldest first).
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    samples: VecDeque<HistorySample>,
    capacity: usize,
}

impl HistoryBuffer {
    /// Create a buffer with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    /// Create a buffer holding at most `capacity` samples (minimum 1).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest if the buffer is full.
    pub fn append(&mut self, value: f64, timestamp: impl Into<SmolStr>) {
        self.samples.push_back(HistorySample {
            value,
            timestamp: timestamp.into(),
        });
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    /// Remove all samples; capacity is unchanged.
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Number of retained samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the buffer holds no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Maximum number of samples this buffer retains.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate samples oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &HistorySample> {
        self.samples.iter()
    }

    /// Recorded values oldest first.
    #[must_use]
    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().map(|sample| sample.value).collect()
    }

    /// Most recently appended sample, if any.
    #[must_use]
    pub fn latest(&self) -> Option<&HistorySample> {
        self.samples.back()
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_within_capacity_preserves_order() {
        let mut buffer = HistoryBuffer::with_capacity(3);
        buffer.append(1.0, "10:00:00");
        buffer.append(2.0, "10:00:01");
        assert_eq!(buffer.values(), vec![1.0, 2.0]);
        assert_eq!(buffer.latest().map(|s| s.value), Some(2.0));
    }

    #[test]
    fn append_beyond_capacity_evicts_oldest() {
        let mut buffer = HistoryBuffer::with_capacity(50);
        for i in 0..57 {
            buffer.append(f64::from(i), "12:00:00");
        }
        assert_eq!(buffer.len(), 50);
        let expected: Vec<f64> = (7..57).map(f64::from).collect();
        assert_eq!(buffer.values(), expected);
    }

    #[test]
    fn zero_capacity_is_clamped_to_one() {
        let mut buffer = HistoryBuffer::with_capacity(0);
        buffer.append(1.0, "00:00:00");
        buffer.append(2.0, "00:00:01");
        assert_eq!(buffer.values(), vec![2.0]);
    }

    #[test]
    fn clear_empties_samples_but_keeps_capacity() {
        let mut buffer = HistoryBuffer::with_capacity(4);
        buffer.append(1.0, "09:00:00");
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.capacity(), 4);
    }
}
