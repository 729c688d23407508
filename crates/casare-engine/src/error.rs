use casare_node::ErrorKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The terminal status of a workflow execution (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TerminalStatus {
  Success,
  Error,
  Cancelled,
  TimedOut,
}

/// The error record attached to a non-success terminal status. Carries the
/// same closed `ErrorKind` vocabulary used in job rows and WS frames (§7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
  pub kind: ErrorKind,
  pub message: String,
  pub node_id: Option<String>,
}

impl ErrorRecord {
  pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
    Self {
      kind,
      message: message.into(),
      node_id: None,
    }
  }

  pub fn at_node(mut self, node_id: impl Into<String>) -> Self {
    self.node_id = Some(node_id.into());
    self
  }
}

/// Failures that can abort a run before it reaches a terminal status —
/// distinct from `ErrorRecord`, which is the *expected* shape of a
/// workflow-terminal ERROR. These are programmer/data errors: a malformed
/// graph, or a node type the registry doesn't know.
#[derive(Debug, Error)]
pub enum EngineError {
  #[error("node '{0}' references unknown node type and no registry entry exists")]
  UnknownNodeType(String),

  #[error("node '{0}' disappeared from the workflow mid-run")]
  MissingNode(String),

  #[error(transparent)]
  Graph(#[from] casare_workflow::GraphError),
}
