// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-session synchronization state machine.

use crate::intent::SessionId;
use serde::{Deserialize, Serialize};

/// Where a client session stands relative to the authoritative graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// The session's view matches the given revision
    Synchronized {
        /// Last revision the session acknowledged
        revision: u64,
    },
    /// An intent from this session is being reconciled
    Pending {
        /// Revision the intent was submitted against
        revision: u64,
    },
    /// Terminal: the transport reported the session gone. On resume the
    /// client starts a fresh session and fetches a full snapshot rather
    /// than replaying history.
    Disconnected,
}

/// One client editing session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Session id
    pub id: SessionId,
    /// Current protocol state
    pub state: SessionState,
}

impl Session {
    /// Open a session synchronized at the given revision
    pub fn new(id: SessionId, revision: u64) -> Self {
        Self {
            id,
            state: SessionState::Synchronized { revision },
        }
    }

    /// Whether the session can submit intents
    pub fn is_active(&self) -> bool {
        self.state != SessionState::Disconnected
    }

    /// Enter `Pending` for a submitted intent. Returns the revision the
    /// session last acknowledged, or `None` if it cannot submit (already
    /// pending, or disconnected).
    pub(crate) fn begin(&mut self) -> Option<u64> {
        match self.state {
            SessionState::Synchronized { revision } => {
                self.state = SessionState::Pending { revision };
                Some(revision)
            }
            _ => None,
        }
    }

    /// The pending intent committed; the session is synchronized at the
    /// new revision. The transport may have closed the session while the
    /// intent was in flight, in which case `Disconnected` stays terminal.
    pub(crate) fn accept(&mut self, revision: u64) {
        if let SessionState::Pending { .. } = self.state {
            self.state = SessionState::Synchronized { revision };
        }
    }

    /// The pending intent was rejected; the graph is unchanged, so the
    /// session returns to the revision it had.
    pub(crate) fn reject(&mut self) {
        if let SessionState::Pending { revision } = self.state {
            self.state = SessionState::Synchronized { revision };
        }
    }

    /// A broadcast delta advanced the session's acknowledged revision
    pub(crate) fn observe(&mut self, revision: u64) {
        if let SessionState::Synchronized { .. } = self.state {
            self.state = SessionState::Synchronized { revision };
        }
    }

    /// Terminal transition; drops any pending-intent state
    pub fn disconnect(&mut self) {
        self.state = SessionState::Disconnected;
    }
}
