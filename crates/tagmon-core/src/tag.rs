//! Store-side tag records.

use std::fmt;

use smol_str::SmolStr;
use time::{OffsetDateTime, UtcOffset};

/// Sample quality reported with a store record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quality {
    /// The value is trusted.
    #[default]
    Good,
}

impl Quality {
    /// Wire/display spelling of the quality code.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Good => "GOOD",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Live value entity held by the store.
///
/// `value`, `timestamp`, and `overridden` change over the record's
/// lifetime; the identifying fields are fixed at registration.
#[derive(Debug, Clone, PartialEq)]
pub struct TagRecord {
    /// Tag name, unique within the store.
    pub name: SmolStr,
    /// Server-side node address this record mirrors (e.g. `ns=2;i=2`).
    pub external_id: SmolStr,
    /// Current value.
    pub value: f64,
    /// Engineering unit.
    pub unit: SmolStr,
    /// Wall-clock time of the last value change (`HH:MM:SS`).
    pub timestamp: SmolStr,
    /// Quality of the current value.
    pub quality: Quality,
    /// Manually pinned: the automatic updater must not touch the value.
    pub overridden: bool,
}

impl TagRecord {
    /// Register a record starting at zero in AUTO mode.
    #[must_use]
    pub fn new(
        name: impl Into<SmolStr>,
        external_id: impl Into<SmolStr>,
        unit: impl Into<SmolStr>,
    ) -> Self {
        Self {
            name: name.into(),
            external_id: external_id.into(),
            value: 0.0,
            unit: unit.into(),
            timestamp: wall_clock_hms(),
            quality: Quality::Good,
            overridden: false,
        }
    }

    /// Apply a new value, refreshing the timestamp.
    pub(crate) fn apply(&mut self, value: f64, overridden: bool) {
        self.value = value;
        self.overridden = overridden;
        self.timestamp = wall_clock_hms();
    }

    /// Display status: `WRITTEN` while pinned, `AUTO` otherwise.
    #[must_use]
    pub fn status(&self) -> &'static str {
        if self.overridden {
            "WRITTEN"
        } else {
            "AUTO"
        }
    }
}

/// Current wall-clock time as `HH:MM:SS`, local offset when known.
pub(crate) fn wall_clock_hms() -> SmolStr {
    let now = OffsetDateTime::now_utc();
    let now = match UtcOffset::current_local_offset() {
        Ok(offset) => now.to_offset(offset),
        Err(_) => now,
    };
    SmolStr::new(format!(
        "{:02}:{:02}:{:02}",
        now.hour(),
        now.minute(),
        now.second()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_starts_in_auto_mode() {
        let record = TagRecord::new("Voltage", "ns=2;i=2", "V");
        assert_eq!(record.value, 0.0);
        assert_eq!(record.quality, Quality::Good);
        assert!(!record.overridden);
        assert_eq!(record.status(), "AUTO");
    }

    #[test]
    fn apply_pins_and_stamps() {
        let mut record = TagRecord::new("Voltage", "ns=2;i=2", "V");
        record.apply(231.5, true);
        assert_eq!(record.value, 231.5);
        assert_eq!(record.status(), "WRITTEN");
        assert_eq!(record.timestamp.len(), 8);
    }
}
