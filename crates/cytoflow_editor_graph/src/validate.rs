// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pure validation functions mirroring each graph precondition.
//!
//! The graph calls these before committing a mutation, and the sync layer
//! reuses them (via a scratch copy of the graph) to pre-flight whole
//! intent batches without committing anything. For compound edits the
//! caller must validate against the post-cascade state, never a stale
//! pre-image; applying the batch to a private clone step by step gives
//! exactly that.

use crate::connection::PortRef;
use crate::graph::{Graph, GraphError};
use crate::node::{KindRegistry, NodeUid};
use crate::port::{PortDirection, PortValue};
use crate::TypeRegistry;
use std::collections::{HashMap, HashSet};

/// Check the preconditions of [`Graph::add_node`]
pub fn check_add_node(
    graph: &Graph,
    kinds: &KindRegistry,
    kind: &str,
    uid: Option<NodeUid>,
) -> Result<(), GraphError> {
    if kinds.get(kind).is_none() {
        return Err(GraphError::UnknownKind(kind.to_owned()));
    }
    if let Some(uid) = uid {
        if graph.node(uid).is_some() {
            return Err(GraphError::DuplicateUid(uid));
        }
    }
    Ok(())
}

/// Check the preconditions of [`Graph::remove_node`]
pub fn check_remove_node(graph: &Graph, uid: NodeUid) -> Result<(), GraphError> {
    if graph.node(uid).is_none() {
        return Err(GraphError::UnknownNode(uid));
    }
    Ok(())
}

/// Check the preconditions of [`Graph::connect`]
pub fn check_connect(
    graph: &Graph,
    types: &TypeRegistry,
    source: &PortRef,
    target: &PortRef,
) -> Result<(), GraphError> {
    let source_port = graph.port_at(source)?;
    let target_port = graph.port_at(target)?;

    if source_port.direction != PortDirection::Output {
        return Err(GraphError::DirectionMismatch {
            port: source.clone(),
            expected: PortDirection::Output,
        });
    }
    if target_port.direction != PortDirection::Input {
        return Err(GraphError::DirectionMismatch {
            port: target.clone(),
            expected: PortDirection::Input,
        });
    }

    if !types.is_compatible(&source_port.datatype, &target_port.datatype)? {
        return Err(GraphError::TypeMismatch {
            expected: target_port.datatype.clone(),
            found: source_port.datatype.clone(),
        });
    }

    if graph.incoming(target).is_some() {
        return Err(GraphError::FanInViolation {
            target: target.clone(),
        });
    }

    if creates_cycle(graph, source.node, target.node) {
        return Err(GraphError::CycleDetected {
            source: source.node,
            target: target.node,
        });
    }

    Ok(())
}

/// Check the preconditions of [`Graph::disconnect`]
pub fn check_disconnect(
    graph: &Graph,
    source: &PortRef,
    target: &PortRef,
) -> Result<(), GraphError> {
    match graph.incoming(target) {
        Some(connection) if connection.source == *source => Ok(()),
        _ => Err(GraphError::UnknownConnection {
            source: source.clone(),
            target: target.clone(),
        }),
    }
}

/// Check the preconditions of [`Graph::set_port_value`]
pub fn check_set_port_value(
    graph: &Graph,
    port: &PortRef,
    value: &PortValue,
) -> Result<(), GraphError> {
    let resolved = graph.port_at(port)?;
    if resolved.direction != PortDirection::Input {
        return Err(GraphError::NotAnInput { port: port.clone() });
    }
    if graph.incoming(port).is_some() {
        return Err(GraphError::HasIncomingConnection {
            target: port.clone(),
        });
    }
    if !resolved.control.accepts(value) {
        return Err(GraphError::TypeMismatch {
            expected: format!("literal for {:?} control", resolved.control),
            found: value.kind_name().to_owned(),
        });
    }
    Ok(())
}

/// Would adding an edge `source -> target` (over nodes) close a directed
/// cycle in the current graph?
///
/// Reachability walk from `target`: if `source` is already reachable from
/// `target`, the new edge completes a cycle. A self-loop is the length-one
/// case of the same check. Cost is linear in the edges reachable from the
/// target.
pub fn creates_cycle(graph: &Graph, source: NodeUid, target: NodeUid) -> bool {
    if source == target {
        return true;
    }
    let adjacency = adjacency_map(graph);
    let mut visited: HashSet<NodeUid> = HashSet::new();
    let mut stack = vec![target];
    while let Some(node) = stack.pop() {
        if !visited.insert(node) {
            continue;
        }
        for &next in adjacency.get(&node).map_or(&[][..], Vec::as_slice) {
            if next == source {
                return true;
            }
            stack.push(next);
        }
    }
    false
}

/// Successor nodes per node, built once per walk so traversal does not
/// rescan the whole connection list at every step
fn adjacency_map(graph: &Graph) -> HashMap<NodeUid, Vec<NodeUid>> {
    let mut adjacency: HashMap<NodeUid, Vec<NodeUid>> = HashMap::new();
    for connection in graph.connections() {
        adjacency
            .entry(connection.source.node)
            .or_default()
            .push(connection.target.node);
    }
    adjacency
}

/// Find one back edge of a directed cycle, if the graph has any.
///
/// Iterative DFS with an explicit on-path set; used by [`audit`] only, the
/// mutation path prevents cycles from ever being committed.
fn find_cycle(graph: &Graph) -> Option<(NodeUid, NodeUid)> {
    let adjacency = adjacency_map(graph);
    let successors =
        |n: NodeUid| -> Vec<NodeUid> { adjacency.get(&n).cloned().unwrap_or_default() };
    let mut done: HashSet<NodeUid> = HashSet::new();

    for start in graph.node_ids() {
        if done.contains(&start) {
            continue;
        }
        let mut on_path: HashSet<NodeUid> = HashSet::new();
        let mut path: Vec<(NodeUid, Vec<NodeUid>)> = Vec::new();
        on_path.insert(start);
        path.push((start, successors(start)));

        while let Some(frame) = path.last_mut() {
            let node = frame.0;
            let next = frame.1.pop();
            match next {
                Some(next) if on_path.contains(&next) => return Some((node, next)),
                Some(next) if !done.contains(&next) => {
                    on_path.insert(next);
                    let succ = successors(next);
                    path.push((next, succ));
                }
                Some(_) => {}
                None => {
                    on_path.remove(&node);
                    done.insert(node);
                    path.pop();
                }
            }
        }
    }
    None
}

/// Post-hoc audit of every graph invariant.
///
/// Returns one error per violation found; an empty result means the graph
/// is consistent with the given type registry. Useful after loading a
/// snapshot against upgraded registries and in tests.
pub fn audit(graph: &Graph, types: &TypeRegistry) -> Vec<GraphError> {
    let mut violations = Vec::new();

    for node in graph.nodes() {
        for port in &node.ports {
            if !types.contains(&port.datatype) {
                violations.push(GraphError::UnknownDatatype(port.datatype.clone()));
                continue;
            }
            let port_ref = PortRef::new(node.uid, port.name.clone());
            if let Some(value) = &port.value {
                if port.direction != PortDirection::Input {
                    violations.push(GraphError::NotAnInput { port: port_ref });
                } else if graph.incoming(&port_ref).is_some() {
                    // Literal and connection are mutually exclusive.
                    violations.push(GraphError::HasIncomingConnection { target: port_ref });
                } else if !port.control.accepts(value) {
                    violations.push(GraphError::TypeMismatch {
                        expected: format!("literal for {:?} control", port.control),
                        found: value.kind_name().to_owned(),
                    });
                }
            }
        }
    }

    for connection in graph.connections() {
        let resolved = graph
            .port_at(&connection.source)
            .and_then(|s| graph.port_at(&connection.target).map(|t| (s, t)));
        match resolved {
            Err(e) => violations.push(e),
            Ok((source, target)) => {
                if source.direction != PortDirection::Output {
                    violations.push(GraphError::DirectionMismatch {
                        port: connection.source.clone(),
                        expected: PortDirection::Output,
                    });
                }
                if target.direction != PortDirection::Input {
                    violations.push(GraphError::DirectionMismatch {
                        port: connection.target.clone(),
                        expected: PortDirection::Input,
                    });
                }
                match types.is_compatible(&source.datatype, &target.datatype) {
                    Ok(true) => {}
                    Ok(false) => violations.push(GraphError::TypeMismatch {
                        expected: target.datatype.clone(),
                        found: source.datatype.clone(),
                    }),
                    Err(e) => violations.push(e),
                }
            }
        }
    }

    if let Some((source, target)) = find_cycle(graph) {
        violations.push(GraphError::CycleDetected { source, target });
    }

    violations
}
