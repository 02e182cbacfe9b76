//! Tag lifecycle and identity management against an external node tree.
//!
//! The registry validates preconditions under its lock, releases it for
//! the external call, and re-locks to commit the confirmed result, so
//! the lock is never held across a potentially slow or faulting backend
//! call. A create that loses a duplicate-name race at commit time rolls
//! the freshly created node back (best effort) and reports the
//! duplicate.

use std::fmt;
use std::sync::{Mutex, MutexGuard};

use indexmap::IndexMap;
use smol_str::SmolStr;
use tracing::{debug, info, warn};

use crate::backend::{NodeBackend, NodeSpec};
use crate::error::TagError;
use crate::sim::{DriftProfile, UniformGenerator, ValueGenerator};
use crate::stats::TagStatistics;

/// Description a record gets when the caller supplies none.
const DEFAULT_DESCRIPTION: &str = "Dynamically created tag";

/// Stable internal tag identifier. Allocated from a monotonic counter;
/// never reassigned to a different tag, even after deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagId(u32);

impl TagId {
    /// Raw numeric value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Registry-side tag entity. Deletion is a soft transition: the record
/// is retained with `active == false` for audit and statistics.
#[derive(Debug, Clone)]
pub struct Tag<R> {
    /// Internal id, stable for the life of the registry.
    pub id: TagId,
    /// Opaque handle to the backing external node.
    pub node: R,
    /// Name, unique among active records.
    pub name: SmolStr,
    /// Local mirror of the last confirmed external value.
    pub value: f64,
    /// Lifecycle state.
    pub active: bool,
    /// Engineering unit.
    pub unit: SmolStr,
    /// Human-readable description.
    pub description: SmolStr,
}

/// Input for [`TagRegistry::create_tag`] and [`TagRegistry::create_many`].
#[derive(Debug, Clone)]
pub struct TagInit {
    /// Tag name; must be non-empty and unique among active tags.
    pub name: SmolStr,
    /// Initial value.
    pub value: f64,
    /// Engineering unit (may be empty).
    pub unit: SmolStr,
    /// Description; defaults when empty.
    pub description: SmolStr,
}

impl TagInit {
    /// Init with empty unit and description.
    pub fn new(name: impl Into<SmolStr>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            unit: SmolStr::default(),
            description: SmolStr::default(),
        }
    }

    /// Set the engineering unit.
    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<SmolStr>) -> Self {
        self.unit = unit.into();
        self
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<SmolStr>) -> Self {
        self.description = description.into();
        self
    }
}

/// Per-item outcome of a best-effort bulk create.
#[derive(Debug, Default)]
pub struct CreateReport {
    /// Ids of the tags that were created.
    pub created: Vec<TagId>,
    /// Names that failed, with the reason; earlier successes stand.
    pub failures: Vec<(SmolStr, TagError)>,
}

impl CreateReport {
    /// Whether every item succeeded.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Per-item outcome of a best-effort bulk delete.
#[derive(Debug, Default)]
pub struct DeleteReport {
    /// Ids that transitioned to inactive.
    pub deleted: Vec<TagId>,
    /// Ids that failed, with the reason; earlier successes stand.
    pub failures: Vec<(TagId, TagError)>,
}

impl DeleteReport {
    /// Whether every item succeeded.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

struct RegistryInner<R> {
    tags: IndexMap<TagId, Tag<R>>,
    next_id: u32,
    generator: Box<dyn ValueGenerator>,
    drift: DriftProfile,
}

/// Concurrent-safe collection mapping internal ids to tags, driving
/// create/delete/write against the external resource.
pub struct TagRegistry<B: NodeBackend> {
    backend: B,
    parent: B::NodeRef,
    inner: Mutex<RegistryInner<B::NodeRef>>,
}

impl<B: NodeBackend> TagRegistry<B> {
    /// Registry creating nodes under `parent` on the given backend.
    pub fn new(backend: B, parent: B::NodeRef) -> Self {
        Self {
            backend,
            parent,
            inner: Mutex::new(RegistryInner {
                tags: IndexMap::new(),
                next_id: 0,
                generator: Box::new(UniformGenerator::new()),
                drift: DriftProfile::default(),
            }),
        }
    }

    /// Replace the randomness source used by [`Self::simulate_step`].
    pub fn set_generator(&self, generator: Box<dyn ValueGenerator>) {
        self.lock().generator = generator;
    }

    /// Replace the random-walk policy used by [`Self::simulate_step`].
    pub fn set_drift_profile(&self, drift: DriftProfile) {
        self.lock().drift = drift;
    }

    /// The backend this registry drives.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Create a tag: allocate the external node first, then commit the
    /// record with a fresh id. Fails without side effects on an empty
    /// name, an active duplicate, or a backend error.
    pub fn create_tag(&self, init: TagInit) -> Result<TagId, TagError> {
        if init.name.is_empty() {
            return Err(TagError::EmptyName);
        }
        let name = init.name.clone();
        {
            let inner = self.lock();
            if find_active(&inner.tags, &name).is_some() {
                return Err(TagError::DuplicateName(name));
            }
        }

        let description = if init.description.is_empty() {
            SmolStr::new(DEFAULT_DESCRIPTION)
        } else {
            init.description.clone()
        };
        let spec = NodeSpec {
            name: name.clone(),
            initial_value: init.value,
            unit: init.unit.clone(),
            description: description.clone(),
        };
        let node = self.backend.create_node(&self.parent, &spec)?;

        let mut inner = self.lock();
        if find_active(&inner.tags, &name).is_some() {
            drop(inner);
            if let Err(err) = self.backend.delete_node(&node) {
                warn!(%name, %err, "rollback of raced node failed");
            }
            return Err(TagError::DuplicateName(name));
        }
        let id = TagId(inner.next_id);
        inner.next_id += 1;
        inner.tags.insert(
            id,
            Tag {
                id,
                node,
                name: name.clone(),
                value: init.value,
                active: true,
                unit: init.unit,
                description,
            },
        );
        debug!(%name, %id, "created tag");
        Ok(id)
    }

    /// Soft-delete a tag: the external node is removed, the record is
    /// retained with `active == false`, and the name becomes available
    /// for a new tag.
    pub fn delete_tag(&self, id: TagId) -> Result<(), TagError> {
        let node = {
            let inner = self.lock();
            let tag = inner.tags.get(&id).ok_or(TagError::UnknownId(id))?;
            if !tag.active {
                return Err(TagError::AlreadyDeleted(id));
            }
            tag.node.clone()
        };
        self.backend.delete_node(&node)?;
        let mut inner = self.lock();
        if let Some(tag) = inner.tags.get_mut(&id) {
            tag.active = false;
            debug!(name = %tag.name, %id, "deleted tag");
        }
        Ok(())
    }

    /// Push a value to the external node; the local mirror is updated
    /// only after the external write succeeds.
    pub fn update_value(&self, id: TagId, value: f64) -> Result<(), TagError> {
        let node = {
            let inner = self.lock();
            let tag = inner.tags.get(&id).ok_or(TagError::UnknownId(id))?;
            if !tag.active {
                return Err(TagError::Inactive(id));
            }
            tag.node.clone()
        };
        self.backend.write_node(&node, value)?;
        let mut inner = self.lock();
        match inner.tags.get_mut(&id) {
            Some(tag) if tag.active => {
                tag.value = value;
                Ok(())
            }
            // Deleted between the external write and the commit.
            Some(_) => Err(TagError::Inactive(id)),
            None => Err(TagError::UnknownId(id)),
        }
    }

    /// First active tag with this exact name, in insertion order.
    /// Linear scan; fine at the expected scale of tens of tags.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<TagId> {
        let inner = self.lock();
        find_active(&inner.tags, name)
    }

    /// Owned snapshot of one record, active or not.
    #[must_use]
    pub fn tag(&self, id: TagId) -> Option<Tag<B::NodeRef>> {
        self.lock().tags.get(&id).cloned()
    }

    /// Ids in insertion order; `active_only` filters soft-deleted records.
    #[must_use]
    pub fn list_ids(&self, active_only: bool) -> Vec<TagId> {
        self.lock()
            .tags
            .values()
            .filter(|tag| !active_only || tag.active)
            .map(|tag| tag.id)
            .collect()
    }

    /// Names in insertion order; `active_only` filters soft-deleted records.
    #[must_use]
    pub fn list_names(&self, active_only: bool) -> Vec<SmolStr> {
        self.lock()
            .tags
            .values()
            .filter(|tag| !active_only || tag.active)
            .map(|tag| tag.name.clone())
            .collect()
    }

    /// Lifecycle counts over every record ever created.
    #[must_use]
    pub fn statistics(&self) -> TagStatistics {
        TagStatistics::aggregate(self.lock().tags.values().map(|tag| tag.active))
    }

    /// Total record count, including soft-deleted tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().tags.len()
    }

    /// Whether no record was ever created.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().tags.is_empty()
    }

    /// Create tags one by one; each failure is independent and earlier
    /// successes are not rolled back.
    pub fn create_many(&self, inits: Vec<TagInit>) -> CreateReport {
        let mut report = CreateReport::default();
        for init in inits {
            let name = init.name.clone();
            match self.create_tag(init) {
                Ok(id) => report.created.push(id),
                Err(err) => report.failures.push((name, err)),
            }
        }
        report
    }

    /// Delete tags one by one; each failure is independent.
    pub fn delete_many(&self, ids: &[TagId]) -> DeleteReport {
        let mut report = DeleteReport::default();
        for &id in ids {
            match self.delete_tag(id) {
                Ok(()) => report.deleted.push(id),
                Err(err) => report.failures.push((id, err)),
            }
        }
        report
    }

    /// Delete every currently active tag (shutdown sweep). Idempotent;
    /// returns the number of tags deleted.
    pub fn clear(&self) -> usize {
        let ids = self.list_ids(true);
        if ids.is_empty() {
            return 0;
        }
        info!(count = ids.len(), "clearing active tags");
        let report = self.delete_many(&ids);
        for (id, err) in &report.failures {
            warn!(%id, %err, "failed to delete tag during clear");
        }
        report.deleted.len()
    }

    /// Advance every active tag one random-walk step and push the new
    /// values to the backend. Per-tag failures are logged, not
    /// propagated; returns the number of values applied.
    pub fn simulate_step(&self) -> usize {
        let updates: Vec<(TagId, f64)> = {
            let mut inner = self.lock();
            let RegistryInner {
                tags,
                generator,
                drift,
                ..
            } = &mut *inner;
            tags.values()
                .filter(|tag| tag.active)
                .map(|tag| (tag.id, drift.next(generator.as_mut(), &tag.name, tag.value)))
                .collect()
        };
        let mut applied = 0;
        for (id, value) in updates {
            match self.update_value(id, value) {
                Ok(()) => applied += 1,
                Err(err) => warn!(%id, %err, "simulated update failed"),
            }
        }
        applied
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner<B::NodeRef>> {
        self.inner.lock().expect("tag registry lock poisoned")
    }
}

fn find_active<R>(tags: &IndexMap<TagId, Tag<R>>, name: &str) -> Option<TagId> {
    tags.values()
        .find(|tag| tag.active && tag.name == name)
        .map(|tag| tag.id)
}
