// SPDX-License-Identifier: MIT OR Apache-2.0
//! Client-originated edit intents.

use cytoflow_editor_graph::{NodeUid, PortRef, PortValue};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier for one client editing session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Mint a fresh random session id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A request to mutate the graph, validated before commit.
///
/// Intents carry stable identifiers only, never references into any
/// client's local render state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum EditIntent {
    /// Instantiate a node of a catalog kind
    AddNode {
        /// Kind id
        kind: String,
        /// Explicit uid (used when re-applying a delta); fresh if absent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        uid: Option<NodeUid>,
    },
    /// Remove a node and every connection touching it
    RemoveNode {
        /// Node to remove
        uid: NodeUid,
    },
    /// Change a node's display name
    RenameNode {
        /// Node to rename
        uid: NodeUid,
        /// New display name
        name: String,
    },
    /// Move a node on the canvas
    MoveNode {
        /// Node to move
        uid: NodeUid,
        /// New position
        position: [f32; 2],
    },
    /// Connect an output port into an input port
    Connect {
        /// Source (output) port
        source: PortRef,
        /// Target (input) port
        target: PortRef,
    },
    /// Remove the connection between two ports
    Disconnect {
        /// Source (output) port
        source: PortRef,
        /// Target (input) port
        target: PortRef,
    },
    /// Set the inline literal of an unconnected input
    SetPortValue {
        /// The input port
        port: PortRef,
        /// New literal
        value: PortValue,
    },
}

impl EditIntent {
    /// Short operation name, for logging
    pub fn op_name(&self) -> &'static str {
        match self {
            Self::AddNode { .. } => "add-node",
            Self::RemoveNode { .. } => "remove-node",
            Self::RenameNode { .. } => "rename-node",
            Self::MoveNode { .. } => "move-node",
            Self::Connect { .. } => "connect",
            Self::Disconnect { .. } => "disconnect",
            Self::SetPortValue { .. } => "set-port-value",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_wire_format() {
        let uid = NodeUid::new();
        let intent = EditIntent::Connect {
            source: PortRef::new(uid, "out"),
            target: PortRef::new(uid, "events"),
        };
        let json = serde_json::to_string(&intent).unwrap();
        assert!(json.contains("\"op\":\"connect\""));
        let parsed: EditIntent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, intent);
    }

    #[test]
    fn test_add_node_uid_is_optional() {
        let parsed: EditIntent =
            serde_json::from_str(r#"{"op":"add-node","kind":"threshold-gate"}"#).unwrap();
        assert_eq!(
            parsed,
            EditIntent::AddNode {
                kind: "threshold-gate".into(),
                uid: None,
            }
        );
    }
}
