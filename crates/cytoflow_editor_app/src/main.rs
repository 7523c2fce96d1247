// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cytoflow editor host process.
//!
//! Bootstraps the built-in cytometry catalog, wires a [`Reconciler`] to a
//! single local session, and speaks newline-delimited JSON on
//! stdin/stdout: each input line is either a host command (`snapshot`,
//! `save`, `load`, `resync`) or an edit intent, and each output line is
//! the acceptance (with deltas), rejection, or snapshot it produced. A
//! rendering surface talks to the same reconciler API; this binary is the
//! headless equivalent.

use cytoflow_editor_graph::{catalog, Graph, KindRegistry, SavedGraph, TypeRegistry};
use cytoflow_editor_sync::{EditIntent, GraphDelta, Reconciler, Rejection, SessionId};
use serde::{Deserialize, Serialize};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

/// Host-level commands that are not graph edits
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
enum HostCommand {
    /// Print the current graph in its persisted form
    Snapshot,
    /// Write the current graph to a file
    Save {
        /// Destination path
        path: PathBuf,
    },
    /// Replace the current graph with a saved one
    Load {
        /// Source path
        path: PathBuf,
    },
    /// Re-synchronize the local session at the current revision
    Resync,
}

/// One output line
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
enum Response {
    /// The intent committed
    Accepted {
        /// Deltas produced, in order
        deltas: Vec<GraphDelta>,
    },
    /// The intent was rejected; the graph is unchanged
    Rejected {
        /// Authoritative revision
        revision: u64,
        /// Why
        reason: String,
    },
    /// Snapshot of the current graph
    Snapshot {
        /// Current revision
        revision: u64,
        /// The graph in persisted form
        graph: SavedGraph,
    },
    /// The graph was written to disk
    Saved {
        /// Destination path
        path: PathBuf,
    },
    /// A saved graph was loaded
    Loaded {
        /// Entities that no longer validated and were dropped
        skipped: usize,
    },
    /// The input line could not be handled
    Error {
        /// What went wrong
        message: String,
    },
}

/// The single-session editor host
struct Editor {
    types: TypeRegistry,
    kinds: KindRegistry,
    reconciler: Reconciler,
    session: SessionId,
    /// Last revision this session acknowledged
    revision: u64,
}

impl Editor {
    fn new() -> Self {
        let mut types = TypeRegistry::new();
        catalog::register_cytometry_types(&mut types);
        types.validate().expect("built-in catalog is consistent");
        let mut kinds = KindRegistry::new();
        catalog::register_cytometry_kinds(&types, &mut kinds)
            .expect("built-in catalog is consistent");

        let reconciler =
            Reconciler::new(types.clone(), kinds.clone(), Graph::new("Untitled"));
        let (session, snapshot) = reconciler.open_session();
        Self {
            types,
            kinds,
            reconciler,
            session,
            revision: snapshot.revision(),
        }
    }

    fn submit(&mut self, intent: EditIntent) -> Response {
        match self
            .reconciler
            .submit(self.session, self.revision, intent)
        {
            Ok(delta) => {
                self.revision = delta.revision;
                Response::Accepted {
                    deltas: vec![delta],
                }
            }
            Err(Rejection { revision, reason }) => Response::Rejected {
                revision,
                reason: reason.to_string(),
            },
        }
    }

    fn handle(&mut self, command: HostCommand) -> Response {
        match command {
            HostCommand::Snapshot => {
                let snapshot = self.reconciler.snapshot();
                Response::Snapshot {
                    revision: snapshot.revision(),
                    graph: SavedGraph::capture(&snapshot),
                }
            }
            HostCommand::Save { path } => {
                let saved = SavedGraph::capture(&self.reconciler.snapshot());
                let result = saved
                    .to_json()
                    .map_err(|e| e.to_string())
                    .and_then(|json| std::fs::write(&path, json).map_err(|e| e.to_string()));
                match result {
                    Ok(()) => Response::Saved { path },
                    Err(message) => Response::Error { message },
                }
            }
            HostCommand::Load { path } => match self.load(&path) {
                Ok(skipped) => Response::Loaded { skipped },
                Err(message) => Response::Error { message },
            },
            HostCommand::Resync => match self.reconciler.resync(self.session) {
                Ok(snapshot) => {
                    self.revision = snapshot.revision();
                    Response::Snapshot {
                        revision: snapshot.revision(),
                        graph: SavedGraph::capture(&snapshot),
                    }
                }
                Err(rejection) => Response::Error {
                    message: rejection.to_string(),
                },
            },
        }
    }

    /// Load a saved graph, replacing the reconciler and session
    fn load(&mut self, path: &std::path::Path) -> Result<usize, String> {
        let text = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
        let saved = SavedGraph::from_json(&text).map_err(|e| e.to_string())?;
        let (graph, report) = saved.restore(&self.types, &self.kinds);
        let skipped = report.skipped_nodes.len()
            + report.skipped_values.len()
            + report.skipped_connections.len();

        self.reconciler =
            Reconciler::new(self.types.clone(), self.kinds.clone(), graph);
        let (session, snapshot) = self.reconciler.open_session();
        self.session = session;
        self.revision = snapshot.revision();
        Ok(skipped)
    }
}

fn handle_line(editor: &mut Editor, line: &str) -> Response {
    // Host commands first; anything else must be an edit intent.
    if let Ok(command) = serde_json::from_str::<HostCommand>(line) {
        return editor.handle(command);
    }
    match serde_json::from_str::<EditIntent>(line) {
        Ok(intent) => editor.submit(intent),
        Err(e) => Response::Error {
            message: format!("unrecognized input: {e}"),
        },
    }
}

fn main() {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env();
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .init();

    tracing::info!("Starting cytoflow editor v{}", env!("CARGO_PKG_VERSION"));

    let mut editor = Editor::new();
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::error!("stdin closed: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let response = handle_line(&mut editor, &line);
        match serde_json::to_string(&response) {
            Ok(json) => {
                if writeln!(stdout, "{json}").is_err() {
                    break;
                }
            }
            Err(e) => tracing::error!("response serialization failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_lines_drive_the_graph() {
        let mut editor = Editor::new();
        let response = handle_line(
            &mut editor,
            r#"{"op":"add-node","kind":"threshold-gate"}"#,
        );
        assert!(matches!(response, Response::Accepted { .. }));
        assert_eq!(editor.revision, 1);

        let response = handle_line(&mut editor, r#"{"op":"snapshot"}"#);
        match response {
            Response::Snapshot { revision, graph } => {
                assert_eq!(revision, 1);
                assert_eq!(graph.nodes.len(), 1);
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn test_bad_lines_are_reported_not_fatal() {
        let mut editor = Editor::new();
        let response = handle_line(&mut editor, "not json at all");
        assert!(matches!(response, Response::Error { .. }));

        let response = handle_line(&mut editor, r#"{"op":"add-node","kind":"nope"}"#);
        match response {
            Response::Rejected { revision, reason } => {
                assert_eq!(revision, 0);
                assert!(reason.contains("nope"));
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }
}
