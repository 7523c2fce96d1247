// SPDX-License-Identifier: MIT OR Apache-2.0
//! The single-writer reconciler.
//!
//! All mutations are serialized through one writer lock: an intent is
//! validated and applied against a private copy of the graph, and only a
//! fully committed copy is swapped in for readers. `snapshot()` is a
//! pointer clone, so readers never observe a partially applied mutation
//! and never wait on a writer beyond the pointer swap itself.

use crate::delta::{GraphChange, GraphDelta};
use crate::intent::{EditIntent, SessionId};
use crate::session::Session;
use cytoflow_editor_graph::{Graph, GraphError, KindRegistry, TypeRegistry};
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Capacity of the delta broadcast channel. A client that lags further
/// than this must resynchronize from a full snapshot anyway.
const DELTA_CHANNEL_CAPACITY: usize = 256;

/// Why an intent was rejected
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RejectReason {
    /// The graph refused the mutation
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// The intent was submitted against an outdated revision; the client
    /// must refresh before retrying
    #[error("stale revision: submitted against {submitted}, current is {current}")]
    StaleRevision {
        /// Revision the client observed
        submitted: u64,
        /// Authoritative revision
        current: u64,
    },

    /// No such session
    #[error("unknown session {0}")]
    UnknownSession(SessionId),

    /// The session already ended
    #[error("session {0} is disconnected")]
    Disconnected(SessionId),
}

/// A rejected intent: the graph is unchanged and `revision` tells the
/// client where the authoritative state stands.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("intent rejected at revision {revision}: {reason}")]
pub struct Rejection {
    /// Current authoritative revision
    pub revision: u64,
    /// Specific rejection cause
    pub reason: RejectReason,
}

/// Serializes edit intents from every session into one total order over
/// the authoritative graph.
pub struct Reconciler {
    types: TypeRegistry,
    kinds: KindRegistry,
    /// Current committed graph; swapped wholesale on commit
    current: RwLock<Arc<Graph>>,
    /// Serializes the validate-then-commit region
    writer: Mutex<()>,
    sessions: Mutex<IndexMap<SessionId, Session>>,
    deltas: broadcast::Sender<GraphDelta>,
}

impl Reconciler {
    /// Create a reconciler over the given graph and registries
    pub fn new(types: TypeRegistry, kinds: KindRegistry, graph: Graph) -> Self {
        let (deltas, _) = broadcast::channel(DELTA_CHANNEL_CAPACITY);
        Self {
            types,
            kinds,
            current: RwLock::new(Arc::new(graph)),
            writer: Mutex::new(()),
            sessions: Mutex::new(IndexMap::new()),
            deltas,
        }
    }

    /// The type registry this reconciler validates against
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// The node-kind catalog this reconciler instantiates from
    pub fn kinds(&self) -> &KindRegistry {
        &self.kinds
    }

    /// Current authoritative revision
    pub fn revision(&self) -> u64 {
        self.current.read().revision()
    }

    /// Consistent snapshot of the committed graph. Wait-free with respect
    /// to mutation work; only the pointer swap is contended.
    pub fn snapshot(&self) -> Arc<Graph> {
        self.current.read().clone()
    }

    /// Subscribe to the committed-delta broadcast
    pub fn subscribe(&self) -> broadcast::Receiver<GraphDelta> {
        self.deltas.subscribe()
    }

    /// Open a new session synchronized at the current revision.
    ///
    /// Returns the session id and the snapshot the client should render.
    pub fn open_session(&self) -> (SessionId, Arc<Graph>) {
        let snapshot = self.snapshot();
        let id = SessionId::new();
        self.sessions
            .lock()
            .insert(id, Session::new(id, snapshot.revision()));
        tracing::debug!(session = %id, revision = snapshot.revision(), "session opened");
        (id, snapshot)
    }

    /// The transport reported the session gone; drop its pending state.
    /// A resuming client opens a fresh session and refetches a snapshot.
    pub fn close_session(&self, id: SessionId) {
        if let Some(session) = self.sessions.lock().get_mut(&id) {
            session.disconnect();
            tracing::debug!(session = %id, "session closed");
        }
    }

    /// A client reported that it applied broadcast deltas up to `revision`
    pub fn acknowledge(&self, id: SessionId, revision: u64) {
        if let Some(session) = self.sessions.lock().get_mut(&id) {
            session.observe(revision);
        }
    }

    /// Resynchronize a lagging session: marks it synchronized at the
    /// current revision and returns the snapshot it must render.
    pub fn resync(&self, id: SessionId) -> Result<Arc<Graph>, Rejection> {
        let snapshot = self.snapshot();
        let mut sessions = self.sessions.lock();
        let session = sessions.get_mut(&id).ok_or_else(|| Rejection {
            revision: snapshot.revision(),
            reason: RejectReason::UnknownSession(id),
        })?;
        if !session.is_active() {
            return Err(Rejection {
                revision: snapshot.revision(),
                reason: RejectReason::Disconnected(id),
            });
        }
        session.observe(snapshot.revision());
        Ok(snapshot)
    }

    /// Submit one intent observed at `revision`.
    ///
    /// On success the returned delta has already been broadcast to every
    /// subscriber, this session included.
    pub fn submit(
        &self,
        session: SessionId,
        revision: u64,
        intent: EditIntent,
    ) -> Result<GraphDelta, Rejection> {
        let mut deltas = self.submit_batch(session, revision, std::slice::from_ref(&intent))?;
        // One intent yields exactly one delta.
        deltas.pop().ok_or(Rejection {
            revision,
            reason: RejectReason::UnknownSession(session),
        })
    }

    /// Submit a compound edit: either every intent commits, in order, or
    /// none does.
    ///
    /// Each step is validated against the state left by the previous one
    /// (the post-cascade state, for edits like replace-node), never
    /// against a stale pre-image. Deltas carry consecutive revisions.
    pub fn submit_batch(
        &self,
        session_id: SessionId,
        revision: u64,
        intents: &[EditIntent],
    ) -> Result<Vec<GraphDelta>, Rejection> {
        let _writer = self.writer.lock();
        let current = self.current.read().clone();
        let current_revision = current.revision();

        self.begin_session_intent(session_id, current_revision)?;

        if revision != current_revision {
            self.reject_session_intent(session_id);
            let rejection = Rejection {
                revision: current_revision,
                reason: RejectReason::StaleRevision {
                    submitted: revision,
                    current: current_revision,
                },
            };
            tracing::warn!(session = %session_id, %rejection, "intent rejected");
            return Err(rejection);
        }

        // Validate-and-apply against a private copy; readers keep seeing
        // the committed graph until the swap below.
        let mut scratch = (*current).clone();
        let mut deltas = Vec::with_capacity(intents.len());
        for intent in intents {
            match apply(&mut scratch, &self.types, &self.kinds, intent) {
                Ok(change) => deltas.push(GraphDelta {
                    revision: scratch.revision(),
                    change,
                }),
                Err(e) => {
                    self.reject_session_intent(session_id);
                    let rejection = Rejection {
                        revision: current_revision,
                        reason: e.into(),
                    };
                    tracing::warn!(
                        session = %session_id,
                        op = intent.op_name(),
                        %rejection,
                        "intent rejected"
                    );
                    return Err(rejection);
                }
            }
        }

        let new_revision = scratch.revision();
        *self.current.write() = Arc::new(scratch);
        if let Some(session) = self.sessions.lock().get_mut(&session_id) {
            session.accept(new_revision);
        }

        for delta in &deltas {
            tracing::debug!(
                session = %session_id,
                revision = delta.revision,
                "committed"
            );
            // No subscribers is fine.
            let _ = self.deltas.send(delta.clone());
        }
        Ok(deltas)
    }

    fn begin_session_intent(
        &self,
        id: SessionId,
        current_revision: u64,
    ) -> Result<(), Rejection> {
        let mut sessions = self.sessions.lock();
        let session = sessions.get_mut(&id).ok_or_else(|| Rejection {
            revision: current_revision,
            reason: RejectReason::UnknownSession(id),
        })?;
        if !session.is_active() {
            return Err(Rejection {
                revision: current_revision,
                reason: RejectReason::Disconnected(id),
            });
        }
        // Submissions hold the writer lock, so a session can never still
        // be pending here; begin only fails for inactive sessions.
        session.begin().map(|_| ()).ok_or(Rejection {
            revision: current_revision,
            reason: RejectReason::Disconnected(id),
        })
    }

    fn reject_session_intent(&self, id: SessionId) {
        if let Some(session) = self.sessions.lock().get_mut(&id) {
            session.reject();
        }
    }
}

/// Apply one intent to a graph, producing the broadcastable change
fn apply(
    graph: &mut Graph,
    types: &TypeRegistry,
    kinds: &KindRegistry,
    intent: &EditIntent,
) -> Result<GraphChange, GraphError> {
    match intent {
        EditIntent::AddNode { kind, uid } => {
            let uid = graph.add_node(kinds, kind, *uid)?;
            let node = graph
                .node(uid)
                .cloned()
                .ok_or(GraphError::UnknownNode(uid))?;
            Ok(GraphChange::NodeAdded { node })
        }
        EditIntent::RemoveNode { uid } => {
            let (node, connections) = graph.remove_node(*uid)?;
            Ok(GraphChange::NodeRemoved {
                uid: node.uid,
                connections,
            })
        }
        EditIntent::RenameNode { uid, name } => {
            let old_name = graph.rename_node(*uid, name.clone())?;
            Ok(GraphChange::NodeRenamed {
                uid: *uid,
                old_name,
                new_name: name.clone(),
            })
        }
        EditIntent::MoveNode { uid, position } => {
            let old_position = graph.move_node(*uid, *position)?;
            Ok(GraphChange::NodeMoved {
                uid: *uid,
                old_position,
                new_position: *position,
            })
        }
        EditIntent::Connect { source, target } => {
            let (connection, cleared_value) = graph.connect(types, source.clone(), target.clone())?;
            Ok(GraphChange::Connected {
                connection,
                cleared_value,
            })
        }
        EditIntent::Disconnect { source, target } => {
            let (connection, restored_value) = graph.disconnect(source, target)?;
            Ok(GraphChange::Disconnected {
                connection,
                restored_value,
            })
        }
        EditIntent::SetPortValue { port, value } => {
            let old_value = graph.set_port_value(port, value.clone())?;
            Ok(GraphChange::ValueSet {
                port: port.clone(),
                old_value,
                new_value: value.clone(),
            })
        }
    }
}
