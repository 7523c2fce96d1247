// SPDX-License-Identifier: MIT OR Apache-2.0
//! Committed-change deltas broadcast to every session.

use cytoflow_editor_graph::{Connection, Node, NodeUid, PortRef, PortValue};
use serde::{Deserialize, Serialize};

/// One committed mutation.
///
/// Every change carries the displaced old state (removed connections, the
/// cleared or replaced literal, the previous name/position) so a client
/// can roll an optimistic render back or replay the delta forward without
/// refetching a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "kebab-case")]
pub enum GraphChange {
    /// A node was instantiated
    NodeAdded {
        /// The new node, with its kind-defined ports
        node: Node,
    },
    /// A node was removed, cascading its connections
    NodeRemoved {
        /// Removed node uid
        uid: NodeUid,
        /// Connections removed in the same transaction
        connections: Vec<Connection>,
    },
    /// A node's display name changed
    NodeRenamed {
        /// Affected node
        uid: NodeUid,
        /// Name before the change
        old_name: String,
        /// Name after the change
        new_name: String,
    },
    /// A node moved on the canvas
    NodeMoved {
        /// Affected node
        uid: NodeUid,
        /// Position before the change
        old_position: [f32; 2],
        /// Position after the change
        new_position: [f32; 2],
    },
    /// A connection was created
    Connected {
        /// The new connection
        connection: Connection,
        /// Literal the target port held before, now cleared
        cleared_value: Option<PortValue>,
    },
    /// A connection was removed
    Disconnected {
        /// The removed connection
        connection: Connection,
        /// Kind-defined default the target port reverted to
        restored_value: Option<PortValue>,
    },
    /// An input literal was set
    ValueSet {
        /// The input port
        port: PortRef,
        /// Literal before the change
        old_value: Option<PortValue>,
        /// Literal after the change
        new_value: PortValue,
    },
}

/// A committed mutation tagged with the revision it produced.
///
/// A client at revision `N` may apply exactly the delta tagged `N + 1`;
/// anything else means it missed history and must refetch a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDelta {
    /// Revision the graph reached with this change
    pub revision: u64,
    /// What changed
    pub change: GraphChange,
}
