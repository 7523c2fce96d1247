// SPDX-License-Identifier: MIT OR Apache-2.0
//! Versioned persistence for graphs.
//!
//! The saved form stores each node as `{uid, kind, overrides}` rather than
//! its full port list: loading re-derives ports from the current kind
//! catalog, so a catalog upgrade can add ports to nodes saved before the
//! upgrade. Every restored entity is re-validated through the normal graph
//! operations; entities that no longer validate are skipped and reported
//! instead of aborting the load.

use crate::connection::{Connection, PortRef};
use crate::graph::{Graph, GraphError};
use crate::node::{KindRegistry, NodeUid};
use crate::port::PortValue;
use crate::TypeRegistry;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Error from snapshot encoding/decoding
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// Malformed JSON
    #[error("snapshot parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Snapshot written by an incompatible format version
    #[error("unsupported snapshot version {found} (supported: {SNAPSHOT_VERSION})")]
    UnsupportedVersion {
        /// Version found in the file
        found: u32,
    },
}

/// A node as persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedNode {
    /// Node uid
    pub uid: NodeUid,
    /// Kind id, resolved against the catalog on load
    pub kind: String,
    /// Display name
    pub name: String,
    /// Canvas position
    pub position: [f32; 2],
    /// Input literals that differ from the kind-defined default
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub overrides: IndexMap<String, PortValue>,
}

/// A connection as persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedConnection {
    /// Source node uid
    pub source_node: NodeUid,
    /// Source port name
    pub source_port: String,
    /// Target node uid
    pub target_node: NodeUid,
    /// Target port name
    pub target_port: String,
}

impl SavedConnection {
    fn source(&self) -> PortRef {
        PortRef::new(self.source_node, self.source_port.clone())
    }

    fn target(&self) -> PortRef {
        PortRef::new(self.target_node, self.target_port.clone())
    }
}

impl From<&Connection> for SavedConnection {
    fn from(connection: &Connection) -> Self {
        Self {
            source_node: connection.source.node,
            source_port: connection.source.port.clone(),
            target_node: connection.target.node,
            target_port: connection.target.port.clone(),
        }
    }
}

/// Entities discarded while restoring a snapshot, with the reason each one
/// no longer validates
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Nodes that could not be restored (their connections are dropped too)
    pub skipped_nodes: Vec<(NodeUid, GraphError)>,
    /// Literal overrides that no longer fit their port
    pub skipped_values: Vec<(PortRef, GraphError)>,
    /// Connections that no longer validate
    pub skipped_connections: Vec<(SavedConnection, GraphError)>,
}

impl LoadReport {
    /// Whether every persisted entity was restored
    pub fn is_clean(&self) -> bool {
        self.skipped_nodes.is_empty()
            && self.skipped_values.is_empty()
            && self.skipped_connections.is_empty()
    }
}

/// The stable external representation of a graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedGraph {
    /// Format version
    pub version: u32,
    /// Graph name
    pub name: String,
    /// Persisted nodes
    pub nodes: Vec<SavedNode>,
    /// Persisted connections
    pub connections: Vec<SavedConnection>,
}

impl SavedGraph {
    /// Capture a graph into its persisted form
    pub fn capture(graph: &Graph) -> Self {
        let nodes = graph
            .nodes()
            .map(|node| {
                let overrides = node
                    .inputs()
                    .filter_map(|p| match &p.value {
                        Some(v) if p.value != p.default_value => {
                            Some((p.name.clone(), v.clone()))
                        }
                        _ => None,
                    })
                    .collect();
                SavedNode {
                    uid: node.uid,
                    kind: node.kind.clone(),
                    name: node.name.clone(),
                    position: node.position,
                    overrides,
                }
            })
            .collect();
        let connections = graph.connections().map(SavedConnection::from).collect();
        Self {
            version: SNAPSHOT_VERSION,
            name: graph.name.clone(),
            nodes,
            connections,
        }
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse from JSON, checking the format version
    pub fn from_json(text: &str) -> Result<Self, SnapshotError> {
        let saved: Self = serde_json::from_str(text)?;
        if saved.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: saved.version,
            });
        }
        Ok(saved)
    }

    /// Rebuild a graph against the current registries.
    ///
    /// Entities that no longer validate are skipped, logged, and reported
    /// in the [`LoadReport`]; the load itself never fails. The restored
    /// graph starts at revision 0.
    pub fn restore(&self, types: &TypeRegistry, kinds: &KindRegistry) -> (Graph, LoadReport) {
        let mut graph = Graph::new(self.name.clone());
        let mut report = LoadReport::default();

        for saved in &self.nodes {
            match graph.add_node(kinds, &saved.kind, Some(saved.uid)) {
                Ok(uid) => {
                    // Display state is not validated; replay it directly.
                    let _ = graph.rename_node(uid, saved.name.clone());
                    let _ = graph.move_node(uid, saved.position);
                    for (port, value) in &saved.overrides {
                        let port_ref = PortRef::new(uid, port.clone());
                        if let Err(e) = graph.set_port_value(&port_ref, value.clone()) {
                            tracing::warn!(port = %port_ref, error = %e, "dropping saved port value");
                            report.skipped_values.push((port_ref, e));
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(uid = %saved.uid, kind = %saved.kind, error = %e, "dropping saved node");
                    report.skipped_nodes.push((saved.uid, e));
                }
            }
        }

        for saved in &self.connections {
            if let Err(e) = graph.connect(types, saved.source(), saved.target()) {
                tracing::warn!(
                    source = %saved.source(),
                    target = %saved.target(),
                    error = %e,
                    "dropping saved connection"
                );
                report.skipped_connections.push((saved.clone(), e));
            }
        }

        graph.reset_revision();
        (graph, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use crate::node::NodeKind;
    use crate::port::{Control, Port};

    fn setup() -> (TypeRegistry, KindRegistry) {
        let mut types = TypeRegistry::new();
        catalog::register_cytometry_types(&mut types);
        let mut kinds = KindRegistry::new();
        catalog::register_cytometry_kinds(&types, &mut kinds).unwrap();
        (types, kinds)
    }

    fn sample_graph(types: &TypeRegistry, kinds: &KindRegistry) -> Graph {
        let mut graph = Graph::new("panel");
        let src = graph.add_node(kinds, "fcs-source", None).unwrap();
        let gate = graph.add_node(kinds, "threshold-gate", None).unwrap();
        let view = graph.add_node(kinds, "scatter-view", None).unwrap();
        graph.rename_node(gate, "CD4+").unwrap();
        graph.move_node(view, [320.0, 80.0]).unwrap();
        graph
            .set_port_value(&PortRef::new(gate, "threshold"), PortValue::Float(0.42))
            .unwrap();
        graph
            .connect(types, PortRef::new(src, "events"), PortRef::new(gate, "events"))
            .unwrap();
        graph
            .connect(types, PortRef::new(gate, "out"), PortRef::new(view, "events"))
            .unwrap();
        graph
    }

    #[test]
    fn test_roundtrip_preserves_structure() {
        let (types, kinds) = setup();
        let graph = sample_graph(&types, &kinds);

        let saved = SavedGraph::capture(&graph);
        let json = saved.to_json().unwrap();
        let parsed = SavedGraph::from_json(&json).unwrap();
        assert_eq!(parsed, saved);

        let (restored, report) = parsed.restore(&types, &kinds);
        assert!(report.is_clean());
        assert_eq!(restored.revision(), 0);
        // Canonical form of the restored graph matches the original's.
        assert_eq!(SavedGraph::capture(&restored), saved);
    }

    #[test]
    fn test_overrides_store_only_non_defaults() {
        let (types, kinds) = setup();
        let graph = sample_graph(&types, &kinds);
        let saved = SavedGraph::capture(&graph);

        let gate = saved.nodes.iter().find(|n| n.kind == "threshold-gate").unwrap();
        assert_eq!(
            gate.overrides.get("threshold"),
            Some(&PortValue::Float(0.42))
        );
        // Connected input holds no literal, so nothing is saved for it.
        assert!(!gate.overrides.contains_key("events"));

        let view = saved.nodes.iter().find(|n| n.kind == "scatter-view").unwrap();
        assert!(view.overrides.is_empty());
    }

    #[test]
    fn test_unknown_kind_skips_node_and_its_connections() {
        let (types, kinds) = setup();
        let graph = sample_graph(&types, &kinds);
        let saved = SavedGraph::capture(&graph);

        // A catalog that lost the threshold-gate kind.
        let mut trimmed = KindRegistry::new();
        for kind in kinds.kinds().filter(|k| k.id != "threshold-gate") {
            trimmed.register(&types, kind.clone()).unwrap();
        }

        let (restored, report) = saved.restore(&types, &trimmed);
        assert_eq!(report.skipped_nodes.len(), 1);
        assert!(matches!(
            report.skipped_nodes[0].1,
            GraphError::UnknownKind(_)
        ));
        // Both connections touched the gate and were dropped with it.
        assert_eq!(report.skipped_connections.len(), 2);
        assert_eq!(restored.node_count(), 2);
        assert_eq!(restored.connection_count(), 0);
    }

    #[test]
    fn test_stale_override_is_skipped_not_fatal() {
        let (types, kinds) = setup();
        let mut graph = Graph::new("panel");
        let view = graph.add_node(&kinds, "scatter-view", None).unwrap();
        graph
            .set_port_value(&PortRef::new(view, "scale"), PortValue::Str("logicle".into()))
            .unwrap();
        let saved = SavedGraph::capture(&graph);

        // The select options changed; "logicle" is no longer allowed.
        let mut narrowed = KindRegistry::new();
        for kind in kinds.kinds() {
            let mut kind = kind.clone();
            if kind.id == "scatter-view" {
                kind.ports = kind
                    .ports
                    .into_iter()
                    .map(|mut p| {
                        if p.name == "scale" {
                            p.control = Control::Select {
                                options: vec!["linear".into(), "log".into()],
                            };
                        }
                        p
                    })
                    .collect();
            }
            narrowed.register(&types, kind).unwrap();
        }

        let (restored, report) = saved.restore(&types, &narrowed);
        assert_eq!(report.skipped_values.len(), 1);
        assert_eq!(restored.node_count(), 1);
        // The port falls back to its kind default.
        let scale = restored
            .port_at(&PortRef::new(saved.nodes[0].uid, "scale"))
            .unwrap();
        assert_eq!(scale.value, Some(PortValue::Str("linear".into())));
    }

    #[test]
    fn test_catalog_upgrade_adds_ports_to_saved_nodes() {
        let (types, kinds) = setup();
        let mut graph = Graph::new("panel");
        graph.add_node(&kinds, "histogram-view", None).unwrap();
        let saved = SavedGraph::capture(&graph);

        // Upgraded catalog: histogram-view gained a "normalize" toggle.
        let mut upgraded = KindRegistry::new();
        for kind in kinds.kinds() {
            let mut kind = kind.clone();
            if kind.id == "histogram-view" {
                kind.ports.push(
                    Port::input("normalize", "boolean", Control::Boolean)
                        .with_default(PortValue::Bool(false)),
                );
            }
            upgraded.register(&types, kind).unwrap();
        }

        let (restored, report) = saved.restore(&types, &upgraded);
        assert!(report.is_clean());
        let node = restored.nodes().next().unwrap();
        assert!(node.port("normalize").is_some());
    }

    #[test]
    fn test_version_mismatch_is_rejected() {
        let (types, kinds) = setup();
        let graph = sample_graph(&types, &kinds);
        let mut saved = SavedGraph::capture(&graph);
        saved.version = 2;
        let json = serde_json::to_string(&saved).unwrap();
        assert!(matches!(
            SavedGraph::from_json(&json),
            Err(SnapshotError::UnsupportedVersion { found: 2 })
        ));
    }

    #[test]
    fn test_kind_registration_order_does_not_matter_for_nodekind_clone() {
        // NodeKind templates survive a clone-and-reregister cycle intact.
        let (types, kinds) = setup();
        let mut copy = KindRegistry::new();
        for kind in kinds.kinds() {
            copy.register(&types, kind.clone()).unwrap();
        }
        assert_eq!(copy.kinds().count(), kinds.kinds().count());
        assert_eq!(
            copy.get("threshold-gate").map(NodeKind::clone),
            kinds.get("threshold-gate").cloned()
        );
    }
}
