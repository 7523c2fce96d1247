// SPDX-License-Identifier: MIT OR Apache-2.0
//! The authoritative graph store.
//!
//! Every mutating operation is all-or-nothing: preconditions are checked
//! first (via [`crate::validate`]) and the graph is only touched once the
//! whole mutation is known to succeed. Each committed mutation bumps the
//! monotonic revision counter that the sync layer uses for delta ordering.

use crate::connection::{Connection, PortRef};
use crate::node::{KindRegistry, Node, NodeUid};
use crate::port::{Port, PortDirection, PortValue};
use crate::validate;
use crate::TypeRegistry;
use indexmap::IndexMap;

/// Error raised by a rejected graph mutation.
///
/// All variants are local and recoverable: the graph is left exactly as it
/// was, and the error names the offending entity.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    /// No node with this uid
    #[error("unknown node {0}")]
    UnknownNode(NodeUid),

    /// A port reference did not resolve
    #[error("unknown port {0}")]
    UnknownPort(PortRef),

    /// No connection between these endpoints
    #[error("no connection from {source} to {target}")]
    UnknownConnection {
        /// Claimed source endpoint
        source: PortRef,
        /// Claimed target endpoint
        target: PortRef,
    },

    /// An explicitly supplied node uid is already in use
    #[error("duplicate node uid {0}")]
    DuplicateUid(NodeUid),

    /// A connection endpoint has the wrong direction
    #[error("port {port} has the wrong direction, expected {expected:?}")]
    DirectionMismatch {
        /// The offending port
        port: PortRef,
        /// Direction the operation required
        expected: PortDirection,
    },

    /// Incompatible datatypes or an inconsistent literal
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// What the target side required
        expected: String,
        /// What was actually supplied
        found: String,
    },

    /// The target input already has an incoming connection
    #[error("input {target} already has an incoming connection")]
    FanInViolation {
        /// The occupied input port
        target: PortRef,
    },

    /// The proposed edge would close a directed cycle
    #[error("connecting {source} into {target} would create a cycle")]
    CycleDetected {
        /// Source node of the proposed edge
        source: NodeUid,
        /// Target node of the proposed edge
        target: NodeUid,
    },

    /// A datatype id is not in the registry
    #[error("unknown datatype '{0}'")]
    UnknownDatatype(String),

    /// Cannot set a literal while the input is connected
    #[error("input {target} has an incoming connection; disconnect it first")]
    HasIncomingConnection {
        /// The connected input port
        target: PortRef,
    },

    /// Only input ports hold literals
    #[error("port {port} is not an input")]
    NotAnInput {
        /// The offending port
        port: PortRef,
    },

    /// A node kind id is not in the catalog
    #[error("unknown node kind '{0}'")]
    UnknownKind(String),

    /// A kind definition repeats a port name
    #[error("node kind '{kind}' declares port '{port}' twice")]
    DuplicatePortName {
        /// Offending kind
        kind: String,
        /// Repeated port name
        port: String,
    },
}

/// The authoritative node graph.
///
/// Nodes are keyed by uid; connections are keyed by their *target* port,
/// which makes the fan-in = 1 invariant structural rather than checked.
#[derive(Debug, Clone)]
pub struct Graph {
    /// Graph name
    pub name: String,
    nodes: IndexMap<NodeUid, Node>,
    connections: IndexMap<PortRef, Connection>,
    revision: u64,
}

impl Graph {
    /// Create a new empty graph at revision 0
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: IndexMap::new(),
            connections: IndexMap::new(),
            revision: 0,
        }
    }

    /// Revision after the last committed mutation
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub(crate) fn reset_revision(&mut self) {
        self.revision = 0;
    }

    /// Get a node by uid
    pub fn node(&self, uid: NodeUid) -> Option<&Node> {
        self.nodes.get(&uid)
    }

    /// All nodes, in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// All node uids
    pub fn node_ids(&self) -> impl Iterator<Item = NodeUid> + '_ {
        self.nodes.keys().copied()
    }

    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// All connections
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Number of connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// The connection into an input port, if any
    pub fn incoming(&self, target: &PortRef) -> Option<&Connection> {
        self.connections.get(target)
    }

    /// All connections leaving an output port
    pub fn outgoing<'a>(&'a self, source: &'a PortRef) -> impl Iterator<Item = &'a Connection> {
        self.connections.values().filter(move |c| c.source == *source)
    }

    /// All connections touching a node
    pub fn connections_for_node(&self, uid: NodeUid) -> impl Iterator<Item = &Connection> {
        self.connections.values().filter(move |c| c.involves_node(uid))
    }

    /// Resolve a port reference
    pub fn port_at(&self, port: &PortRef) -> Result<&Port, GraphError> {
        self.nodes
            .get(&port.node)
            .and_then(|n| n.port(&port.port))
            .ok_or_else(|| GraphError::UnknownPort(port.clone()))
    }

    /// Instantiate a node of the given kind and insert it.
    ///
    /// If `uid` is supplied it must be unused; otherwise a fresh uid is
    /// minted. No connections are created.
    pub fn add_node(
        &mut self,
        kinds: &KindRegistry,
        kind: &str,
        uid: Option<NodeUid>,
    ) -> Result<NodeUid, GraphError> {
        validate::check_add_node(self, kinds, kind, uid)?;
        let uid = uid.unwrap_or_default();
        let node = kinds.instantiate(kind, uid)?;
        self.nodes.insert(uid, node);
        self.revision += 1;
        Ok(uid)
    }

    /// Remove a node, cascading removal of every connection touching it.
    ///
    /// Returns the removed node and connections.
    pub fn remove_node(&mut self, uid: NodeUid) -> Result<(Node, Vec<Connection>), GraphError> {
        validate::check_remove_node(self, uid)?;
        let removed: Vec<Connection> = self
            .connections_for_node(uid)
            .cloned()
            .collect();
        self.connections.retain(|_, c| !c.involves_node(uid));
        // Checked above, so the node is present.
        let node = self
            .nodes
            .swap_remove(&uid)
            .ok_or(GraphError::UnknownNode(uid))?;
        self.revision += 1;
        Ok((node, removed))
    }

    /// Change a node's display name. Returns the old name.
    pub fn rename_node(
        &mut self,
        uid: NodeUid,
        name: impl Into<String>,
    ) -> Result<String, GraphError> {
        let node = self.nodes.get_mut(&uid).ok_or(GraphError::UnknownNode(uid))?;
        let old = std::mem::replace(&mut node.name, name.into());
        self.revision += 1;
        Ok(old)
    }

    /// Move a node on the canvas. Returns the old position.
    pub fn move_node(&mut self, uid: NodeUid, position: [f32; 2]) -> Result<[f32; 2], GraphError> {
        let node = self.nodes.get_mut(&uid).ok_or(GraphError::UnknownNode(uid))?;
        let old = std::mem::replace(&mut node.position, position);
        self.revision += 1;
        Ok(old)
    }

    /// Connect an output port into an input port.
    ///
    /// On success any literal held by the target port is cleared (the
    /// connection supersedes it); the cleared literal is returned alongside
    /// the new connection so callers can roll back an optimistic render.
    pub fn connect(
        &mut self,
        types: &TypeRegistry,
        source: PortRef,
        target: PortRef,
    ) -> Result<(Connection, Option<PortValue>), GraphError> {
        validate::check_connect(self, types, &source, &target)?;
        let cleared = self
            .nodes
            .get_mut(&target.node)
            .and_then(|n| n.port_mut(&target.port))
            .and_then(|p| p.value.take());
        let connection = Connection::new(source, target.clone());
        self.connections.insert(target, connection.clone());
        self.revision += 1;
        Ok((connection, cleared))
    }

    /// Remove the connection between the given endpoints.
    ///
    /// The target input reverts to its kind-defined default literal, which
    /// is returned alongside the removed connection.
    pub fn disconnect(
        &mut self,
        source: &PortRef,
        target: &PortRef,
    ) -> Result<(Connection, Option<PortValue>), GraphError> {
        validate::check_disconnect(self, source, target)?;
        let connection = self
            .connections
            .swap_remove(target)
            .ok_or_else(|| GraphError::UnknownConnection {
                source: source.clone(),
                target: target.clone(),
            })?;
        let restored = self
            .nodes
            .get_mut(&target.node)
            .and_then(|n| n.port_mut(&target.port))
            .and_then(|p| {
                p.reset_value();
                p.value.clone()
            });
        self.revision += 1;
        Ok((connection, restored))
    }

    /// Set the inline literal of an unconnected input port.
    ///
    /// Returns the previous literal for rollback.
    pub fn set_port_value(
        &mut self,
        port: &PortRef,
        value: PortValue,
    ) -> Result<Option<PortValue>, GraphError> {
        validate::check_set_port_value(self, port, &value)?;
        let old = self
            .nodes
            .get_mut(&port.node)
            .and_then(|n| n.port_mut(&port.port))
            .and_then(|p| p.value.replace(value));
        self.revision += 1;
        Ok(old)
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use crate::port::Control;

    fn setup() -> (TypeRegistry, KindRegistry, Graph) {
        let mut types = TypeRegistry::new();
        catalog::register_cytometry_types(&mut types);
        let mut kinds = KindRegistry::new();
        catalog::register_cytometry_kinds(&types, &mut kinds).unwrap();
        (types, kinds, Graph::new("test"))
    }

    #[test]
    fn test_connect_compatible_ports() {
        // Scenario: a gate feeding a view.
        let (types, kinds, mut graph) = setup();
        let n1 = graph.add_node(&kinds, "threshold-gate", None).unwrap();
        let n2 = graph.add_node(&kinds, "scatter-view", None).unwrap();
        assert_eq!(graph.revision(), 2);

        let (connection, cleared) = graph
            .connect(
                &types,
                PortRef::new(n1, "out"),
                PortRef::new(n2, "events"),
            )
            .unwrap();
        assert_eq!(graph.revision(), 3);
        assert_eq!(connection.source, PortRef::new(n1, "out"));
        assert!(cleared.is_none());
        assert_eq!(graph.connection_count(), 1);
    }

    #[test]
    fn test_connect_rejects_reversed_direction() {
        let (types, kinds, mut graph) = setup();
        let n1 = graph.add_node(&kinds, "threshold-gate", None).unwrap();
        let n2 = graph.add_node(&kinds, "scatter-view", None).unwrap();
        let before = graph.revision();

        // Input used as source, output as target.
        let err = graph
            .connect(
                &types,
                PortRef::new(n2, "events"),
                PortRef::new(n1, "out"),
            )
            .unwrap_err();
        assert!(matches!(err, GraphError::DirectionMismatch { expected, .. }
            if expected == PortDirection::Output));
        assert_eq!(graph.revision(), before);
        assert_eq!(graph.connection_count(), 0);
    }

    #[test]
    fn test_connect_rejects_cycle_in_chain() {
        let (types, kinds, mut graph) = setup();
        let n1 = graph.add_node(&kinds, "threshold-gate", None).unwrap();
        let n2 = graph.add_node(&kinds, "threshold-gate", None).unwrap();
        let n3 = graph.add_node(&kinds, "threshold-gate", None).unwrap();
        graph
            .connect(&types, PortRef::new(n1, "out"), PortRef::new(n2, "events"))
            .unwrap();
        graph
            .connect(&types, PortRef::new(n2, "out"), PortRef::new(n3, "events"))
            .unwrap();

        let err = graph
            .connect(&types, PortRef::new(n3, "out"), PortRef::new(n1, "events"))
            .unwrap_err();
        assert!(matches!(err, GraphError::CycleDetected { source, target }
            if source == n3 && target == n1));
    }

    #[test]
    fn test_connect_rejects_self_loop() {
        let (types, kinds, mut graph) = setup();
        let n1 = graph.add_node(&kinds, "threshold-gate", None).unwrap();
        let err = graph
            .connect(&types, PortRef::new(n1, "out"), PortRef::new(n1, "events"))
            .unwrap_err();
        assert!(matches!(err, GraphError::CycleDetected { .. }));
    }

    #[test]
    fn test_connect_rejects_type_mismatch() {
        let (types, kinds, mut graph) = setup();
        let n1 = graph.add_node(&kinds, "constant", None).unwrap();
        let n2 = graph.add_node(&kinds, "scatter-view", None).unwrap();
        // float output into an fcs-channel input
        let err = graph
            .connect(&types, PortRef::new(n1, "out"), PortRef::new(n2, "events"))
            .unwrap_err();
        assert!(matches!(err, GraphError::TypeMismatch { .. }));
    }

    #[test]
    fn test_connect_enforces_fan_in() {
        let (types, kinds, mut graph) = setup();
        let a = graph.add_node(&kinds, "fcs-source", None).unwrap();
        let b = graph.add_node(&kinds, "fcs-source", None).unwrap();
        let view = graph.add_node(&kinds, "scatter-view", None).unwrap();
        graph
            .connect(&types, PortRef::new(a, "events"), PortRef::new(view, "events"))
            .unwrap();
        let err = graph
            .connect(&types, PortRef::new(b, "events"), PortRef::new(view, "events"))
            .unwrap_err();
        assert!(matches!(err, GraphError::FanInViolation { .. }));

        // Fan-out from one output stays legal.
        let view2 = graph.add_node(&kinds, "scatter-view", None).unwrap();
        graph
            .connect(&types, PortRef::new(a, "events"), PortRef::new(view2, "events"))
            .unwrap();
    }

    #[test]
    fn test_value_cleared_on_connect_and_default_on_disconnect() {
        let (types, kinds, mut graph) = setup();
        let gate = graph.add_node(&kinds, "threshold-gate", None).unwrap();
        let constant = graph.add_node(&kinds, "constant", None).unwrap();
        let threshold = PortRef::new(gate, "threshold");

        graph
            .set_port_value(&threshold, PortValue::Float(0.5))
            .unwrap();
        assert_eq!(
            graph.port_at(&threshold).unwrap().value,
            Some(PortValue::Float(0.5))
        );

        let (_, cleared) = graph
            .connect(&types, PortRef::new(constant, "out"), threshold.clone())
            .unwrap();
        assert_eq!(cleared, Some(PortValue::Float(0.5)));
        assert_eq!(graph.port_at(&threshold).unwrap().value, None);

        let (_, restored) = graph
            .disconnect(&PortRef::new(constant, "out"), &threshold)
            .unwrap();
        // Back to the kind-defined default, not the old literal.
        assert_eq!(restored, Some(PortValue::Float(0.0)));
        assert_eq!(
            graph.port_at(&threshold).unwrap().value,
            Some(PortValue::Float(0.0))
        );
    }

    #[test]
    fn test_set_port_value_rejections() {
        let (types, kinds, mut graph) = setup();
        let gate = graph.add_node(&kinds, "threshold-gate", None).unwrap();
        let source = graph.add_node(&kinds, "fcs-source", None).unwrap();

        // Output ports hold no literals.
        assert!(matches!(
            graph.set_port_value(&PortRef::new(gate, "out"), PortValue::Float(1.0)),
            Err(GraphError::NotAnInput { .. })
        ));

        // Wrong literal variant for the control.
        assert!(matches!(
            graph.set_port_value(&PortRef::new(gate, "threshold"), PortValue::Str("hi".into())),
            Err(GraphError::TypeMismatch { .. })
        ));

        // Connected inputs must be disconnected first.
        graph
            .connect(
                &types,
                PortRef::new(source, "events"),
                PortRef::new(gate, "events"),
            )
            .unwrap();
        assert!(matches!(
            graph.set_port_value(&PortRef::new(gate, "events"), PortValue::Bool(true)),
            Err(GraphError::HasIncomingConnection { .. })
        ));

        assert!(matches!(
            graph.set_port_value(&PortRef::new(gate, "missing"), PortValue::Float(1.0)),
            Err(GraphError::UnknownPort(_))
        ));
    }

    #[test]
    fn test_select_values_restricted_to_options() {
        let (_, kinds, mut graph) = setup();
        let view = graph.add_node(&kinds, "scatter-view", None).unwrap();
        let scale = PortRef::new(view, "scale");
        assert!(matches!(
            graph.port_at(&scale).unwrap().control,
            Control::Select { .. }
        ));

        graph
            .set_port_value(&scale, PortValue::Str("log".into()))
            .unwrap();
        assert!(matches!(
            graph.set_port_value(&scale, PortValue::Str("quadratic".into())),
            Err(GraphError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_remove_node_cascades_exactly_incident_connections() {
        let (types, kinds, mut graph) = setup();
        let src = graph.add_node(&kinds, "fcs-source", None).unwrap();
        let gate = graph.add_node(&kinds, "threshold-gate", None).unwrap();
        let view = graph.add_node(&kinds, "scatter-view", None).unwrap();
        let hist = graph.add_node(&kinds, "histogram-view", None).unwrap();
        graph
            .connect(&types, PortRef::new(src, "events"), PortRef::new(gate, "events"))
            .unwrap();
        graph
            .connect(&types, PortRef::new(gate, "out"), PortRef::new(view, "events"))
            .unwrap();
        graph
            .connect(&types, PortRef::new(src, "events"), PortRef::new(hist, "events"))
            .unwrap();

        let (_, removed) = graph.remove_node(gate).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(removed.iter().all(|c| c.involves_node(gate)));
        assert_eq!(graph.connection_count(), 1);
        assert!(graph
            .incoming(&PortRef::new(hist, "events"))
            .is_some());
        assert!(graph.node(gate).is_none());
    }

    #[test]
    fn test_duplicate_uid_rejected() {
        let (_, kinds, mut graph) = setup();
        let uid = graph.add_node(&kinds, "fcs-source", None).unwrap();
        let before = graph.revision();
        assert!(matches!(
            graph.add_node(&kinds, "scatter-view", Some(uid)),
            Err(GraphError::DuplicateUid(u)) if u == uid
        ));
        assert_eq!(graph.revision(), before);
    }

    #[test]
    fn test_disconnect_requires_exact_endpoints() {
        let (types, kinds, mut graph) = setup();
        let a = graph.add_node(&kinds, "fcs-source", None).unwrap();
        let b = graph.add_node(&kinds, "fcs-source", None).unwrap();
        let view = graph.add_node(&kinds, "scatter-view", None).unwrap();
        graph
            .connect(&types, PortRef::new(a, "events"), PortRef::new(view, "events"))
            .unwrap();

        // Right target, wrong claimed source.
        assert!(matches!(
            graph.disconnect(&PortRef::new(b, "events"), &PortRef::new(view, "events")),
            Err(GraphError::UnknownConnection { .. })
        ));
    }

    #[test]
    fn test_rename_and_move() {
        let (_, kinds, mut graph) = setup();
        let uid = graph.add_node(&kinds, "scatter-view", None).unwrap();
        let old = graph.rename_node(uid, "Lymphocytes").unwrap();
        assert_eq!(old, "Scatter View");
        assert_eq!(graph.node(uid).unwrap().name, "Lymphocytes");

        let old_pos = graph.move_node(uid, [120.0, -40.0]).unwrap();
        assert_eq!(old_pos, [0.0, 0.0]);
        assert_eq!(graph.revision(), 3);

        assert!(matches!(
            graph.rename_node(NodeUid::new(), "x"),
            Err(GraphError::UnknownNode(_))
        ));
    }
}
