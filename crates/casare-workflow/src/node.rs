use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The default per-node execution timeout when a node does not override it
/// (§4.1 step 6).
pub const DEFAULT_NODE_TIMEOUT_SECS: u64 = 120;

/// The closed set of node kinds the engine gives special exec-flow treatment
/// to. Everything else is `Component` — an opaque plugin satisfying the
/// `NodeInstance` contract (§9 Design Notes).
///
/// `Start` must appear exactly once per workflow (I3). `Try`, `Retry`,
/// `Loop`, and `ForEach` are the only nodes allowed to be the target of a
/// back-edge (I4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
  Start,
  Component,
  Try,
  Retry,
  RetrySuccess,
  RetryFail,
  Loop,
  ForEach,
}

impl NodeKind {
  /// Resolve a node's `node_type` key to a `NodeKind`. Reserved keys are
  /// recognized by exact name; anything else is a `Component` resolved
  /// against the node registry.
  pub fn from_node_type(node_type: &str) -> Self {
    match node_type {
      "start" => NodeKind::Start,
      "try" => NodeKind::Try,
      "retry" => NodeKind::Retry,
      "retry_success" => NodeKind::RetrySuccess,
      "retry_fail" => NodeKind::RetryFail,
      "loop" => NodeKind::Loop,
      "for_each" => NodeKind::ForEach,
      _ => NodeKind::Component,
    }
  }

  /// Whether this kind is a permitted back-edge target (I4).
  pub fn is_loop_node(&self) -> bool {
    matches!(self, NodeKind::Loop | NodeKind::Retry | NodeKind::ForEach)
  }
}

/// A node in a locked workflow, ready for execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
  pub node_id: String,
  pub node_type: String,
  pub kind: NodeKind,
  pub config: HashMap<String, serde_json::Value>,
  pub input_port_bindings: HashMap<String, serde_json::Value>,
  pub timeout_seconds: u64,
}

impl Node {
  pub fn is_disabled(&self) -> bool {
    self
      .config
      .get("_disabled")
      .and_then(|v| v.as_bool())
      .unwrap_or(false)
  }

  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_seconds)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn reserved_keys_resolve_to_control_kinds() {
    assert_eq!(NodeKind::from_node_type("start"), NodeKind::Start);
    assert_eq!(NodeKind::from_node_type("retry"), NodeKind::Retry);
    assert_eq!(NodeKind::from_node_type("loop"), NodeKind::Loop);
    assert_eq!(
      NodeKind::from_node_type("my-org/http-request"),
      NodeKind::Component
    );
  }

  #[test]
  fn only_loop_retry_for_each_are_loop_nodes() {
    assert!(NodeKind::Loop.is_loop_node());
    assert!(NodeKind::Retry.is_loop_node());
    assert!(NodeKind::ForEach.is_loop_node());
    assert!(!NodeKind::Try.is_loop_node());
    assert!(!NodeKind::Component.is_loop_node());
  }

  #[test]
  fn disabled_flag_reads_from_config() {
    let mut node = Node {
      node_id: "n1".into(),
      node_type: "http".into(),
      kind: NodeKind::Component,
      config: HashMap::new(),
      input_port_bindings: HashMap::new(),
      timeout_seconds: DEFAULT_NODE_TIMEOUT_SECS,
    };
    assert!(!node.is_disabled());
    node.config.insert("_disabled".into(), serde_json::json!(true));
    assert!(node.is_disabled());
    assert_eq!(node.timeout(), Duration::from_secs(120));
  }
}
