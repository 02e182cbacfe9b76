//! Telemetry value store with per-tag history trails.
//!
//! The store keeps two lock regions: the tag collection and the history
//! map. Standing lock order: tag lock before history lock, never the
//! reverse. `tick` and `write` take the tag lock, collect the samples
//! to record, release it, then take the history lock to append; readers
//! of either region take only the lock they need.

use std::sync::{Mutex, MutexGuard};

use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use tracing::{debug, info};

use crate::config::MonitorConfig;
use crate::error::TagError;
use crate::history::{HistoryBuffer, DEFAULT_HISTORY_CAPACITY};
use crate::sim::{SimProfile, UniformGenerator, ValueGenerator, ValueRange};
use crate::tag::TagRecord;

struct StoreInner {
    records: Vec<TagRecord>,
    generator: Box<dyn ValueGenerator>,
    profile: SimProfile,
    endpoint: Option<SmolStr>,
    connected: bool,
}

/// Monitor-side state: live tag records, per-tag history, and the
/// simulated session toward the telemetry source.
pub struct TagStore {
    inner: Mutex<StoreInner>,
    histories: Mutex<FxHashMap<SmolStr, HistoryBuffer>>,
    history_capacity: usize,
}

impl TagStore {
    /// Empty store with OS-seeded randomness and the stock profile.
    #[must_use]
    pub fn new() -> Self {
        Self::with_generator(
            Box::new(UniformGenerator::new()),
            SimProfile::default(),
            DEFAULT_HISTORY_CAPACITY,
        )
    }

    /// Store with explicit randomness, draw profile, and history depth.
    #[must_use]
    pub fn with_generator(
        generator: Box<dyn ValueGenerator>,
        profile: SimProfile,
        history_capacity: usize,
    ) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                records: Vec::new(),
                generator,
                profile,
                endpoint: None,
                connected: false,
            }),
            histories: Mutex::new(FxHashMap::default()),
            history_capacity: history_capacity.max(1),
        }
    }

    /// Store pre-registered with the stock electrical tags.
    #[must_use]
    pub fn with_defaults() -> Self {
        let store = Self::new();
        for (name, external_id, unit) in [
            ("Voltage", "ns=2;i=2", "V"),
            ("Current", "ns=2;i=3", "A"),
            ("Power", "ns=2;i=4", "W"),
        ] {
            // Fresh store, stock names cannot collide.
            let _ = store.add_tag(name, external_id, unit, None);
        }
        store
    }

    /// Store built from a validated configuration.
    pub fn from_config(config: &MonitorConfig) -> Result<Self, TagError> {
        let store = Self::with_generator(
            Box::new(UniformGenerator::new()),
            config.sim_profile(),
            config.history_capacity,
        );
        for tag in &config.tags {
            store.add_tag(
                tag.name.clone(),
                tag.external_id.clone(),
                tag.unit.clone(),
                tag.range,
            )?;
        }
        if let Some(endpoint) = &config.endpoint {
            store.connect(endpoint);
        }
        Ok(store)
    }

    /// Register a tag starting at zero in AUTO mode. `range`, when
    /// given, becomes the tag's draw range for [`Self::tick`].
    pub fn add_tag(
        &self,
        name: impl Into<SmolStr>,
        external_id: impl Into<SmolStr>,
        unit: impl Into<SmolStr>,
        range: Option<ValueRange>,
    ) -> Result<(), TagError> {
        let name = name.into();
        if name.is_empty() {
            return Err(TagError::EmptyName);
        }
        if range.is_some_and(|range| !range.is_valid()) {
            return Err(TagError::InvalidRange(name));
        }
        let mut inner = self.lock_tags();
        if inner.records.iter().any(|record| record.name == name) {
            return Err(TagError::DuplicateName(name));
        }
        if let Some(range) = range {
            inner.profile.set(name.clone(), range);
        }
        debug!(%name, "registered store tag");
        inner.records.push(TagRecord::new(name, external_id, unit));
        Ok(())
    }

    /// One simulation step: every non-overridden tag gets a fresh draw
    /// from its range. The value each tag held before the step is
    /// recorded to its history, so the newest history sample trails the
    /// live value by one step.
    pub fn tick(&self) {
        let recorded: Vec<(SmolStr, f64, SmolStr)> = {
            let mut inner = self.lock_tags();
            let StoreInner {
                records,
                generator,
                profile,
                ..
            } = &mut *inner;
            records
                .iter_mut()
                .filter(|record| !record.overridden)
                .map(|record| {
                    let previous = (record.name.clone(), record.value, record.timestamp.clone());
                    let next = generator.sample(profile.range_for(&record.name));
                    record.apply(next, false);
                    previous
                })
                .collect()
        };
        let mut histories = self.lock_histories();
        for (name, value, timestamp) in recorded {
            histories
                .entry(name)
                .or_insert_with(|| HistoryBuffer::with_capacity(self.history_capacity))
                .append(value, timestamp);
        }
    }

    /// Manually write a tag, pinning it against further automatic
    /// updates. `key` matches the tag name or its external id. The
    /// pre-write value is recorded to history.
    pub fn write(&self, key: &str, value: f64) -> Result<(), TagError> {
        let previous = {
            let mut inner = self.lock_tags();
            let record = inner
                .records
                .iter_mut()
                .find(|record| record.name == key || record.external_id == key)
                .ok_or_else(|| TagError::NotFound(SmolStr::new(key)))?;
            let previous = (record.name.clone(), record.value, record.timestamp.clone());
            record.apply(value, true);
            previous
        };
        let (name, old_value, timestamp) = previous;
        info!(%name, value, "manual write pinned tag");
        self.lock_histories()
            .entry(name)
            .or_insert_with(|| HistoryBuffer::with_capacity(self.history_capacity))
            .append(old_value, timestamp);
        Ok(())
    }

    /// Release a pinned tag back to automatic updates. The value is
    /// left as written until the next tick.
    pub fn reset_to_auto(&self, name: &str) -> Result<(), TagError> {
        let mut inner = self.lock_tags();
        let record = inner
            .records
            .iter_mut()
            .find(|record| record.name == name)
            .ok_or_else(|| TagError::NotFound(SmolStr::new(name)))?;
        if !record.overridden {
            return Err(TagError::NotOverridden(SmolStr::new(name)));
        }
        record.overridden = false;
        debug!(%name, "tag released to auto");
        Ok(())
    }

    /// Release every pinned tag; returns how many were released.
    pub fn reset_all_to_auto(&self) -> usize {
        let mut inner = self.lock_tags();
        let mut released = 0;
        for record in &mut inner.records {
            if record.overridden {
                record.overridden = false;
                released += 1;
            }
        }
        if released > 0 {
            info!(released, "released all tags to auto");
        }
        released
    }

    /// Owned copies of every record, in registration order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<TagRecord> {
        self.lock_tags().records.clone()
    }

    /// Advance one step and return the resulting records.
    #[must_use]
    pub fn read_all(&self) -> Vec<TagRecord> {
        self.tick();
        self.snapshot()
    }

    /// Owned copy of one record by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<TagRecord> {
        self.lock_tags()
            .records
            .iter()
            .find(|record| record.name == name)
            .cloned()
    }

    /// Run a closure against one record under the tag lock.
    pub fn with_tag<R>(
        &self,
        name: &str,
        f: impl FnOnce(&mut TagRecord) -> R,
    ) -> Result<R, TagError> {
        let mut inner = self.lock_tags();
        let record = inner
            .records
            .iter_mut()
            .find(|record| record.name == name)
            .ok_or_else(|| TagError::NotFound(SmolStr::new(name)))?;
        Ok(f(record))
    }

    /// History trail for a registered tag, oldest sample first. A tag
    /// that has never been ticked or written has an empty trail.
    pub fn get_history(&self, name: &str) -> Result<HistoryBuffer, TagError> {
        {
            let inner = self.lock_tags();
            if !inner.records.iter().any(|record| record.name == name) {
                return Err(TagError::NotFound(SmolStr::new(name)));
            }
        }
        Ok(self
            .lock_histories()
            .get(name)
            .cloned()
            .unwrap_or_else(|| HistoryBuffer::with_capacity(self.history_capacity)))
    }

    /// Drop the recorded history of one tag.
    pub fn clear_history(&self, name: &str) -> Result<(), TagError> {
        {
            let inner = self.lock_tags();
            if !inner.records.iter().any(|record| record.name == name) {
                return Err(TagError::NotFound(SmolStr::new(name)));
            }
        }
        if let Some(buffer) = self.lock_histories().get_mut(name) {
            buffer.clear();
        }
        Ok(())
    }

    /// Drop the recorded history of every tag.
    pub fn clear_all_history(&self) {
        self.lock_histories().clear();
    }

    /// Number of tags currently pinned by a manual write.
    #[must_use]
    pub fn written_count(&self) -> usize {
        self.lock_tags()
            .records
            .iter()
            .filter(|record| record.overridden)
            .count()
    }

    /// Number of registered tags.
    #[must_use]
    pub fn tag_count(&self) -> usize {
        self.lock_tags().records.len()
    }

    /// Open a simulated session. Accepts endpoints that look local
    /// (`localhost` or port `4840` in the URL); anything else fails and
    /// leaves the store disconnected.
    pub fn connect(&self, endpoint: &str) -> bool {
        let reachable = endpoint.contains("localhost") || endpoint.contains("4840");
        let mut inner = self.lock_tags();
        inner.connected = reachable;
        inner.endpoint = reachable.then(|| SmolStr::new(endpoint));
        if reachable {
            info!(%endpoint, "connected");
        } else {
            info!(%endpoint, "endpoint unreachable");
        }
        reachable
    }

    /// Close the simulated session. Tag records are kept.
    pub fn disconnect(&self) {
        let mut inner = self.lock_tags();
        if inner.connected {
            inner.connected = false;
            inner.endpoint = None;
            info!("disconnected");
        }
    }

    /// Whether a simulated session is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.lock_tags().connected
    }

    /// Endpoint of the open session, if any.
    #[must_use]
    pub fn endpoint(&self) -> Option<SmolStr> {
        self.lock_tags().endpoint.clone()
    }

    fn lock_tags(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().expect("tag store lock poisoned")
    }

    fn lock_histories(&self) -> MutexGuard<'_, FxHashMap<SmolStr, HistoryBuffer>> {
        self.histories.lock().expect("history map lock poisoned")
    }
}

impl Default for TagStore {
    fn default() -> Self {
        Self::new()
    }
}
