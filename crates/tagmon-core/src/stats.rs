//! Registry statistics derived from activation state.

use serde::Serialize;

/// Counts of registry records by lifecycle state.
///
/// `active + deleted == total` holds by construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TagStatistics {
    /// All records ever created, including soft-deleted ones.
    pub total: usize,
    /// Records still active.
    pub active: usize,
    /// Records retained after soft deletion.
    pub deleted: usize,
}

impl TagStatistics {
    /// Derive counts from a sequence of activation flags, one per record.
    pub fn aggregate(states: impl IntoIterator<Item = bool>) -> Self {
        let mut stats = Self::default();
        for active in states {
            stats.total += 1;
            if active {
                stats.active += 1;
            } else {
                stats.deleted += 1;
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_partitions_records() {
        let stats = TagStatistics::aggregate([true, false, true, true]);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.active, 3);
        assert_eq!(stats.deleted, 1);
        assert_eq!(stats.active + stats.deleted, stats.total);
    }

    #[test]
    fn aggregate_of_nothing_is_zero() {
        assert_eq!(TagStatistics::aggregate([]), TagStatistics::default());
    }
}
