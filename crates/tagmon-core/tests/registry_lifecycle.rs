use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use smol_str::SmolStr;
use tagmon_core::{
    MidpointGenerator, NodeBackend, NodeError, NodeSpec, SimulatedNodeBackend, TagError, TagInit,
    TagRegistry, UniformGenerator, OBJECTS_FOLDER,
};

fn registry() -> TagRegistry<SimulatedNodeBackend> {
    TagRegistry::new(SimulatedNodeBackend::new(2), OBJECTS_FOLDER)
}

fn assert_stats_invariant(registry: &TagRegistry<SimulatedNodeBackend>) {
    let stats = registry.statistics();
    assert_eq!(stats.active + stats.deleted, stats.total);
    assert_eq!(stats.total, registry.len());
}

#[test]
fn create_rejects_empty_and_duplicate_names() {
    let registry = registry();
    assert_eq!(
        registry.create_tag(TagInit::new("", 0.0)),
        Err(TagError::EmptyName)
    );
    registry
        .create_tag(TagInit::new("Temperature", 21.0).with_unit("C"))
        .expect("create");
    assert_eq!(
        registry.create_tag(TagInit::new("Temperature", 22.0)),
        Err(TagError::DuplicateName(SmolStr::new("Temperature")))
    );
    let stats = registry.statistics();
    assert_eq!(stats.total, 1);
    assert_eq!(registry.backend().node_count(), 1);
}

#[test]
fn delete_frees_name_but_never_reuses_ids() {
    let registry = registry();
    let first = registry
        .create_tag(TagInit::new("Pressure", 1013.0))
        .expect("create");
    registry.delete_tag(first).expect("delete");
    assert_stats_invariant(&registry);

    // The name is free again; the id and the node index are fresh.
    let second = registry
        .create_tag(TagInit::new("Pressure", 1000.0))
        .expect("recreate");
    assert!(second > first);
    let old = registry.tag(first).expect("record retained");
    let new = registry.tag(second).expect("record");
    assert!(!old.active);
    assert!(new.active);
    assert!(new.node.index > old.node.index);

    let stats = registry.statistics();
    assert_eq!((stats.total, stats.active, stats.deleted), (2, 1, 1));
}

#[test]
fn delete_twice_fails_and_leaves_stats_untouched() {
    let registry = registry();
    let id = registry
        .create_tag(TagInit::new("Humidity", 55.0))
        .expect("create");
    registry.delete_tag(id).expect("delete");
    let before = registry.statistics();
    assert_eq!(registry.delete_tag(id), Err(TagError::AlreadyDeleted(id)));
    assert_eq!(registry.statistics(), before);
}

#[test]
fn ids_increase_across_mixed_operations() {
    let registry = registry();
    let mut last = None;
    for i in 0..10 {
        let id = registry
            .create_tag(TagInit::new(format!("Tag{i}"), f64::from(i)))
            .expect("create");
        if let Some(prev) = last {
            assert!(id > prev);
        }
        last = Some(id);
        if i % 2 == 0 {
            registry.delete_tag(id).expect("delete");
        }
        assert_stats_invariant(&registry);
    }
    let stats = registry.statistics();
    assert_eq!((stats.total, stats.active, stats.deleted), (10, 5, 5));
}

#[test]
fn update_value_reaches_the_backend() {
    let registry = registry();
    let id = registry
        .create_tag(TagInit::new("Voltage", 230.0).with_unit("V"))
        .expect("create");
    registry.update_value(id, 234.5).expect("update");
    let tag = registry.tag(id).expect("record");
    assert_eq!(tag.value, 234.5);
    assert_eq!(registry.backend().value_of(&tag.node), Some(234.5));

    registry.delete_tag(id).expect("delete");
    assert_eq!(registry.update_value(id, 1.0), Err(TagError::Inactive(id)));
}

#[test]
fn find_by_name_sees_only_active_tags() {
    let registry = registry();
    let id = registry
        .create_tag(TagInit::new("Flow", 3.2))
        .expect("create");
    assert_eq!(registry.find_by_name("Flow"), Some(id));
    registry.delete_tag(id).expect("delete");
    assert_eq!(registry.find_by_name("Flow"), None);

    let replacement = registry
        .create_tag(TagInit::new("Flow", 0.0))
        .expect("recreate");
    assert_eq!(registry.find_by_name("Flow"), Some(replacement));
    assert_eq!(registry.list_names(true), vec![SmolStr::new("Flow")]);
    assert_eq!(registry.list_names(false).len(), 2);
}

#[test]
fn bulk_create_and_delete_report_per_item_outcomes() {
    let registry = registry();
    let report = registry.create_many(vec![
        TagInit::new("A", 1.0),
        TagInit::new("", 2.0),
        TagInit::new("A", 3.0),
        TagInit::new("B", 4.0),
    ]);
    assert_eq!(report.created.len(), 2);
    assert_eq!(report.failures.len(), 2);
    assert!(!report.all_succeeded());
    assert_eq!(report.failures[0].1, TagError::EmptyName);
    assert!(matches!(report.failures[1].1, TagError::DuplicateName(_)));

    let mut ids = report.created.clone();
    registry.delete_tag(ids[0]).expect("delete");
    ids.push(ids[0]); // second delete of the same id must fail
    let deleted = registry.delete_many(&ids);
    assert_eq!(deleted.deleted.len(), 1);
    assert_eq!(deleted.failures.len(), 2);
}

#[test]
fn clear_deletes_everything_and_is_idempotent() {
    let registry = registry();
    for name in ["X", "Y", "Z"] {
        registry.create_tag(TagInit::new(name, 0.0)).expect("create");
    }
    assert_eq!(registry.clear(), 3);
    assert_eq!(registry.backend().node_count(), 0);
    let stats = registry.statistics();
    assert_eq!((stats.total, stats.active, stats.deleted), (3, 0, 3));
    assert_eq!(registry.clear(), 0);
}

#[test]
fn simulate_step_respects_class_bounds() {
    let registry = registry();
    registry.set_generator(Box::new(UniformGenerator::seeded(7)));
    let temp = registry
        .create_tag(TagInit::new("Temperature", 25.0))
        .expect("create");
    let volt = registry
        .create_tag(TagInit::new("Voltage", 230.0))
        .expect("create");
    for _ in 0..200 {
        assert_eq!(registry.simulate_step(), 2);
        let t = registry.tag(temp).expect("record").value;
        let v = registry.tag(volt).expect("record").value;
        assert!((15.0..=35.0).contains(&t), "temperature {t} out of bounds");
        assert!((210.0..=250.0).contains(&v), "voltage {v} out of bounds");
    }
}

#[test]
fn simulate_step_skips_deleted_tags() {
    let registry = registry();
    registry.set_generator(Box::new(MidpointGenerator));
    let keep = registry
        .create_tag(TagInit::new("Power", 1200.0))
        .expect("create");
    let gone = registry
        .create_tag(TagInit::new("Current", 5.0))
        .expect("create");
    registry.delete_tag(gone).expect("delete");
    assert_eq!(registry.simulate_step(), 1);
    assert_eq!(registry.tag(gone).expect("record").value, 5.0);
    // Midpoint of the step range is zero, so the kept tag stands still.
    assert_eq!(registry.tag(keep).expect("record").value, 1200.0);
}

/// Backend whose failure modes can be toggled per operation, with a
/// plain counter as the node handle.
#[derive(Default)]
struct FlakyBackend {
    fail_create: AtomicBool,
    fail_delete: AtomicBool,
    fail_write: AtomicBool,
    next: AtomicU64,
}

impl NodeBackend for FlakyBackend {
    type NodeRef = u64;

    fn create_node(&self, _parent: &u64, _spec: &NodeSpec) -> Result<u64, NodeError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(NodeError::new("create refused"));
        }
        Ok(self.next.fetch_add(1, Ordering::SeqCst))
    }

    fn delete_node(&self, _node: &u64) -> Result<(), NodeError> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(NodeError::new("delete refused"));
        }
        Ok(())
    }

    fn write_node(&self, _node: &u64, _value: f64) -> Result<(), NodeError> {
        if self.fail_write.load(Ordering::SeqCst) {
            return Err(NodeError::new("write refused"));
        }
        Ok(())
    }
}

#[test]
fn backend_failures_leave_registry_state_untouched() {
    let registry = TagRegistry::new(FlakyBackend::default(), 0);

    registry
        .backend()
        .fail_create
        .store(true, Ordering::SeqCst);
    assert!(matches!(
        registry.create_tag(TagInit::new("Temp", 20.0)),
        Err(TagError::External(_))
    ));
    assert!(registry.is_empty());
    registry
        .backend()
        .fail_create
        .store(false, Ordering::SeqCst);

    let id = registry
        .create_tag(TagInit::new("Temp", 20.0))
        .expect("create");

    registry.backend().fail_write.store(true, Ordering::SeqCst);
    assert!(matches!(
        registry.update_value(id, 25.0),
        Err(TagError::External(_))
    ));
    assert_eq!(registry.tag(id).expect("record").value, 20.0);
    registry.backend().fail_write.store(false, Ordering::SeqCst);

    registry.backend().fail_delete.store(true, Ordering::SeqCst);
    assert!(matches!(
        registry.delete_tag(id),
        Err(TagError::External(_))
    ));
    let tag = registry.tag(id).expect("record");
    assert!(tag.active, "failed delete must keep the tag active");
    let stats = registry.statistics();
    assert_eq!((stats.active, stats.deleted), (1, 0));
}

#[test]
fn default_description_applies_when_empty() {
    let registry = registry();
    let id = registry
        .create_tag(TagInit::new("Valve", 0.0))
        .expect("create");
    let tag = registry.tag(id).expect("record");
    assert_eq!(tag.description, SmolStr::new("Dynamically created tag"));
    // The default also reaches the backing node.
    assert_eq!(
        registry.backend().description_of(&tag.node),
        Some(SmolStr::new("Dynamically created tag"))
    );
    let described = registry
        .create_tag(TagInit::new("Pump", 0.0).with_description("Feed pump speed"))
        .expect("create");
    assert_eq!(
        registry.tag(described).expect("record").description,
        SmolStr::new("Feed pump speed")
    );
}
