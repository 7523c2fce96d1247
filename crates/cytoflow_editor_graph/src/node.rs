// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions and the node-kind catalog.

use crate::datatype::TypeRegistry;
use crate::graph::GraphError;
use crate::port::{Port, PortDirection};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Globally unique, immutable identifier for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeUid(pub Uuid);

impl NodeUid {
    /// Mint a fresh random uid
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeUid {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for NodeUid {}

/// Node kind definition: the fixed, ordered port list a node is
/// instantiated with. Port order is display order, nothing more.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeKind {
    /// Stable kind identifier, e.g. `"threshold-gate"`
    pub id: String,
    /// Default display name for new nodes
    pub name: String,
    /// Short description for the node palette
    pub description: String,
    /// Ports, in display order
    pub ports: Vec<Port>,
}

impl NodeKind {
    /// Create a new kind definition
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        ports: Vec<Port>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            ports,
        }
    }
}

/// A node instance in the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique instance uid
    pub uid: NodeUid,
    /// Kind this node was instantiated from
    pub kind: String,
    /// Display name (mutable, not unique)
    pub name: String,
    /// Position on the editor canvas
    pub position: [f32; 2],
    /// Ports, in display order. The set is fixed by the kind definition.
    pub ports: Vec<Port>,
}

impl Node {
    /// Instantiate a node from a kind definition
    pub fn from_kind(kind: &NodeKind, uid: NodeUid) -> Self {
        Self {
            uid,
            kind: kind.id.clone(),
            name: kind.name.clone(),
            position: [0.0, 0.0],
            ports: kind.ports.clone(),
        }
    }

    /// Get a port by name
    pub fn port(&self, name: &str) -> Option<&Port> {
        self.ports.iter().find(|p| p.name == name)
    }

    /// Get a mutable port by name
    pub fn port_mut(&mut self, name: &str) -> Option<&mut Port> {
        self.ports.iter_mut().find(|p| p.name == name)
    }

    /// Input ports, in display order
    pub fn inputs(&self) -> impl Iterator<Item = &Port> {
        self.ports.iter().filter(|p| p.is_input())
    }

    /// Output ports, in display order
    pub fn outputs(&self) -> impl Iterator<Item = &Port> {
        self.ports.iter().filter(|p| !p.is_input())
    }
}

/// Registry of available node kinds.
///
/// Like the [`TypeRegistry`], this is supplied at bootstrap and not
/// mutated by the editing session. Registration validates each kind
/// against the type registry so a bad catalog fails at startup rather
/// than at `add_node` time.
#[derive(Debug, Clone, Default)]
pub struct KindRegistry {
    kinds: IndexMap<String, NodeKind>,
}

impl KindRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node kind, checking it against the type registry.
    ///
    /// Fails with [`GraphError::UnknownDatatype`] for an unregistered port
    /// datatype, [`GraphError::DuplicatePortName`] for a repeated port
    /// name, or [`GraphError::TypeMismatch`] when a default literal does
    /// not fit its port's control.
    pub fn register(&mut self, types: &TypeRegistry, kind: NodeKind) -> Result<(), GraphError> {
        for (i, port) in kind.ports.iter().enumerate() {
            if !types.contains(&port.datatype) {
                return Err(GraphError::UnknownDatatype(port.datatype.clone()));
            }
            if kind.ports[..i].iter().any(|p| p.name == port.name) {
                return Err(GraphError::DuplicatePortName {
                    kind: kind.id.clone(),
                    port: port.name.clone(),
                });
            }
            let literal_ok = match &port.default_value {
                Some(value) => {
                    port.direction == PortDirection::Input && port.control.accepts(value)
                }
                None => true,
            };
            if !literal_ok {
                return Err(GraphError::TypeMismatch {
                    expected: format!("default matching control of port '{}'", port.name),
                    found: "inconsistent kind definition".to_owned(),
                });
            }
        }
        self.kinds.insert(kind.id.clone(), kind);
        Ok(())
    }

    /// Get a kind by id
    pub fn get(&self, id: &str) -> Option<&NodeKind> {
        self.kinds.get(id)
    }

    /// All registered kinds, in registration order
    pub fn kinds(&self) -> impl Iterator<Item = &NodeKind> {
        self.kinds.values()
    }

    /// Instantiate a node of the given kind
    pub fn instantiate(&self, kind_id: &str, uid: NodeUid) -> Result<Node, GraphError> {
        let kind = self
            .kinds
            .get(kind_id)
            .ok_or_else(|| GraphError::UnknownKind(kind_id.to_owned()))?;
        Ok(Node::from_kind(kind, uid))
    }
}
