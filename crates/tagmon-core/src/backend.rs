//! External node lifecycle interface and the in-memory stand-in.

use std::fmt;
use std::sync::Mutex;

use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use thiserror::Error;
use tracing::debug;

/// Failure reported by the external resource. The cause is opaque to
/// the registry; it is carried verbatim for the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct NodeError(pub SmolStr);

impl NodeError {
    /// Wrap an opaque cause.
    pub fn new(message: impl Into<SmolStr>) -> Self {
        Self(message.into())
    }
}

/// Attributes of a node to create under a parent.
#[derive(Debug, Clone)]
pub struct NodeSpec {
    /// Browse name of the node.
    pub name: SmolStr,
    /// Value the node starts with.
    pub initial_value: f64,
    /// Display unit, appended to the display name when non-empty.
    pub unit: SmolStr,
    /// Human-readable description.
    pub description: SmolStr,
}

/// Lifecycle interface to the server-side node tree.
///
/// The registry treats `NodeRef` as opaque: it clones it, compares it
/// for equality, and passes it back unchanged. Implementations must be
/// callable from multiple threads; the registry never holds an internal
/// lock across these calls.
pub trait NodeBackend: Send + Sync {
    /// Opaque handle to a server-side node.
    type NodeRef: Clone + PartialEq + fmt::Debug + Send + Sync;

    /// Allocate a node under `parent` and return its handle.
    fn create_node(
        &self,
        parent: &Self::NodeRef,
        spec: &NodeSpec,
    ) -> Result<Self::NodeRef, NodeError>;

    /// Remove a node from the tree.
    fn delete_node(&self, node: &Self::NodeRef) -> Result<(), NodeError>;

    /// Push a value to a node.
    fn write_node(&self, node: &Self::NodeRef, value: f64) -> Result<(), NodeError>;
}

/// Numeric node address within a namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    /// Namespace index.
    pub namespace: u16,
    /// Numeric identifier within the namespace.
    pub index: u32,
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ns={};i={}", self.namespace, self.index)
    }
}

/// Objects folder of the simulated address space.
pub const OBJECTS_FOLDER: NodeId = NodeId {
    namespace: 0,
    index: 85,
};

/// First numeric id handed out for dynamically created nodes.
const FIRST_DYNAMIC_INDEX: u32 = 1000;

#[derive(Debug)]
struct SimNode {
    display_name: SmolStr,
    description: SmolStr,
    value: f64,
}

#[derive(Debug)]
struct SimState {
    nodes: FxHashMap<NodeId, SimNode>,
    next_index: u32,
}

/// In-memory node tree standing in for a live server. Node ids are
/// allocated monotonically so a deleted id is never handed out again.
#[derive(Debug)]
pub struct SimulatedNodeBackend {
    namespace: u16,
    state: Mutex<SimState>,
}

impl SimulatedNodeBackend {
    /// Backend allocating nodes in the given namespace.
    #[must_use]
    pub fn new(namespace: u16) -> Self {
        Self {
            namespace,
            state: Mutex::new(SimState {
                nodes: FxHashMap::default(),
                next_index: FIRST_DYNAMIC_INDEX,
            }),
        }
    }

    /// Namespace index this backend allocates in.
    #[must_use]
    pub fn namespace(&self) -> u16 {
        self.namespace
    }

    /// Number of live nodes in the tree.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.lock().nodes.len()
    }

    /// Whether the node is present in the tree.
    #[must_use]
    pub fn contains(&self, node: &NodeId) -> bool {
        self.lock().nodes.contains_key(node)
    }

    /// Current value of a node, if it exists.
    #[must_use]
    pub fn value_of(&self, node: &NodeId) -> Option<f64> {
        self.lock().nodes.get(node).map(|n| n.value)
    }

    /// Display name of a node, if it exists.
    #[must_use]
    pub fn display_name_of(&self, node: &NodeId) -> Option<SmolStr> {
        self.lock().nodes.get(node).map(|n| n.display_name.clone())
    }

    /// Description of a node, if it exists.
    #[must_use]
    pub fn description_of(&self, node: &NodeId) -> Option<SmolStr> {
        self.lock().nodes.get(node).map(|n| n.description.clone())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        self.state.lock().expect("simulated node tree lock poisoned")
    }
}

impl NodeBackend for SimulatedNodeBackend {
    type NodeRef = NodeId;

    fn create_node(
        &self,
        _parent: &Self::NodeRef,
        spec: &NodeSpec,
    ) -> Result<Self::NodeRef, NodeError> {
        let display_name = if spec.unit.is_empty() {
            spec.name.clone()
        } else {
            SmolStr::new(format!("{} [{}]", spec.name, spec.unit))
        };
        let mut state = self.lock();
        let node = NodeId {
            namespace: self.namespace,
            index: state.next_index,
        };
        state.next_index += 1;
        state.nodes.insert(
            node,
            SimNode {
                display_name,
                description: spec.description.clone(),
                value: spec.initial_value,
            },
        );
        debug!(name = %spec.name, %node, "created simulated node");
        Ok(node)
    }

    fn delete_node(&self, node: &Self::NodeRef) -> Result<(), NodeError> {
        let mut state = self.lock();
        if state.nodes.remove(node).is_none() {
            return Err(NodeError::new(format!("node {node} not found")));
        }
        debug!(%node, "deleted simulated node");
        Ok(())
    }

    fn write_node(&self, node: &Self::NodeRef, value: f64) -> Result<(), NodeError> {
        let mut state = self.lock();
        let entry = state
            .nodes
            .get_mut(node)
            .ok_or_else(|| NodeError::new(format!("node {node} not found")))?;
        entry.value = value;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_ids_are_monotonic_and_display_names_carry_units() {
        let backend = SimulatedNodeBackend::new(2);
        let spec = NodeSpec {
            name: SmolStr::new("Voltage"),
            initial_value: 230.0,
            unit: SmolStr::new("V"),
            description: SmolStr::new("Mains voltage"),
        };
        let first = backend.create_node(&OBJECTS_FOLDER, &spec).expect("create");
        let second = backend.create_node(&OBJECTS_FOLDER, &spec).expect("create");
        assert_eq!(first, NodeId { namespace: 2, index: 1000 });
        assert_eq!(second.index, 1001);
        assert_eq!(
            backend.display_name_of(&first),
            Some(SmolStr::new("Voltage [V]"))
        );
        assert_eq!(
            backend.description_of(&first),
            Some(SmolStr::new("Mains voltage"))
        );
        assert_eq!(backend.value_of(&first), Some(230.0));
    }

    #[test]
    fn deleted_index_is_not_reused() {
        let backend = SimulatedNodeBackend::new(2);
        let spec = NodeSpec {
            name: SmolStr::new("Flow"),
            initial_value: 0.0,
            unit: SmolStr::new(""),
            description: SmolStr::new(""),
        };
        let node = backend.create_node(&OBJECTS_FOLDER, &spec).expect("create");
        backend.delete_node(&node).expect("delete");
        assert!(backend.delete_node(&node).is_err());
        let next = backend.create_node(&OBJECTS_FOLDER, &spec).expect("create");
        assert!(next.index > node.index);
    }

    #[test]
    fn write_to_missing_node_fails() {
        let backend = SimulatedNodeBackend::new(2);
        let ghost = NodeId { namespace: 2, index: 4242 };
        assert!(backend.write_node(&ghost, 1.0).is_err());
    }
}
