// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node graph core for the cytoflow editor.
//!
//! This crate owns the authoritative pipeline graph: nodes instantiated
//! from a fixed kind catalog, typed ports, and directed connections. Every
//! mutation is validated before it is committed, so a consumer never
//! observes a graph that violates an invariant:
//! - port datatypes must be compatible per the [`TypeRegistry`]
//! - each input port accepts at most one incoming connection
//! - the connection set stays acyclic
//! - a connected input holds no inline literal value
//!
//! ## Architecture
//!
//! - [`datatype`] - the closed registry of port datatypes and their
//!   compatibility relation
//! - [`node`] / [`port`] / [`connection`] - the data model
//! - [`graph`] - the transactional store with a monotonic revision counter
//! - [`validate`] - pure pre-flight checks mirroring each precondition
//! - [`snapshot`] - versioned persistence with per-entity load recovery
//! - [`catalog`] - the built-in cytometry datatypes and node kinds

pub mod catalog;
pub mod connection;
pub mod datatype;
pub mod graph;
pub mod node;
pub mod port;
pub mod snapshot;
pub mod validate;

pub use connection::{Connection, PortRef};
pub use datatype::{Datatype, TypeRegistry};
pub use graph::{Graph, GraphError};
pub use node::{KindRegistry, Node, NodeKind, NodeUid};
pub use port::{Control, Port, PortDirection, PortValue};
pub use snapshot::{LoadReport, SavedGraph, SnapshotError};
