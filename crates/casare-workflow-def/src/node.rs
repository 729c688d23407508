use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// GUI canvas position. Opaque to the core — carried through so round-tripping
/// the workflow JSON doesn't lose it, never inspected by the engine.
pub type Position = [f64; 2];

/// A node as it appears in the persisted workflow JSON (§3 Nodes, §6).
///
/// `node_type` is the plugin key (e.g. `"start"`, `"set_variable"`,
/// `"try"`, `"my-org/http-request"`) resolved against a `NodeRegistry` at
/// load time — unknown types are rejected at dispatch time, not load time
/// (§6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDef {
  pub node_id: String,
  pub node_type: String,
  #[serde(default)]
  pub name: Option<String>,
  #[serde(default)]
  pub position: Option<Position>,
  /// Static parameters for the node, keyed by name.
  #[serde(default)]
  pub config: HashMap<String, serde_json::Value>,
  /// Literal default for each input port, used when the port has no
  /// incoming data edge (§4.1 step 4).
  #[serde(default)]
  pub input_port_bindings: HashMap<String, serde_json::Value>,
  /// Per-node override of the default node timeout (§4.1 step 6).
  #[serde(default)]
  pub timeout_seconds: Option<u64>,
}

impl NodeDef {
  /// `_disabled` config flag that triggers bypass (§4.1 step 5, GLOSSARY).
  pub fn is_disabled(&self) -> bool {
    self
      .config
      .get("_disabled")
      .and_then(|v| v.as_bool())
      .unwrap_or(false)
  }
}
