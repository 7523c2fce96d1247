// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection (edge) definitions for the graph.

use crate::node::NodeUid;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A stable reference to one port: owning node uid plus port name.
///
/// Ports are always addressed this way rather than by object reference, so
/// connections survive serialization and catalog upgrades.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortRef {
    /// Owning node
    pub node: NodeUid,
    /// Port name, unique within the node
    pub port: String,
}

impl PortRef {
    /// Create a new port reference
    pub fn new(node: NodeUid, port: impl Into<String>) -> Self {
        Self {
            node,
            port: port.into(),
        }
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node, self.port)
    }
}

impl std::error::Error for PortRef {}

/// A directed edge from an output port to an input port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// Source (output) port
    pub source: PortRef,
    /// Target (input) port
    pub target: PortRef,
}

impl Connection {
    /// Create a new connection
    pub fn new(source: PortRef, target: PortRef) -> Self {
        Self { source, target }
    }

    /// Check if this connection touches a specific node
    pub fn involves_node(&self, uid: NodeUid) -> bool {
        self.source.node == uid || self.target.node == uid
    }
}
