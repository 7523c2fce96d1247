// SPDX-License-Identifier: MIT OR Apache-2.0
//! Edit synchronization for the cytoflow editor.
//!
//! One or more client views edit the same pipeline graph optimistically;
//! this crate serializes their intents into a single total order, applies
//! each one atomically through the validated graph operations, and
//! broadcasts a `(revision, change)` delta for every commit. A rejected
//! intent leaves the graph untouched and tells the originating session
//! exactly what was rejected and why, with enough old-state information
//! for a clean rollback of the optimistic render.
//!
//! ## Protocol
//!
//! A session observes revision `N` and submits an intent tagged `N`. The
//! reconciler accepts it (new revision `N+1`, delta broadcast to every
//! subscriber) or rejects it (graph unchanged). Deltas never skip
//! revisions; a client that missed one falls back to a full snapshot
//! fetch instead of guessing.

pub mod delta;
pub mod intent;
pub mod reconciler;
pub mod session;

pub use delta::{GraphChange, GraphDelta};
pub use intent::{EditIntent, SessionId};
pub use reconciler::{Reconciler, RejectReason, Rejection};
pub use session::{Session, SessionState};
