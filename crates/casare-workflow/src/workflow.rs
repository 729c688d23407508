use std::collections::HashMap;

use casare_workflow_def::{Connection, WorkflowSettings};
use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::graph::Graph;
use crate::node::Node;

/// A workflow that has passed `casare-workflow-loader`'s invariant checks
/// (I1-I5) and is ready to hand to the engine. Unlike `WorkflowDef`, every
/// node's `node_type` has been resolved to a `NodeKind`, and the graph
/// indices used by the stepper are precomputed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
  pub workflow_id: String,
  pub name: String,
  pub start_node: String,
  pub nodes: HashMap<String, Node>,
  pub connections: Vec<Connection>,
  pub variables: HashMap<String, serde_json::Value>,
  pub settings: WorkflowSettings,
  #[serde(skip)]
  graph: Option<Graph>,
}

impl Workflow {
  /// Assemble a locked workflow from its already-validated parts. Callers
  /// outside `casare-workflow-loader` should not normally construct this
  /// directly — use the loader, which enforces I1-I5 before calling this.
  pub fn new(
    workflow_id: String,
    name: String,
    start_node: String,
    nodes: HashMap<String, Node>,
    connections: Vec<Connection>,
    variables: HashMap<String, serde_json::Value>,
    settings: WorkflowSettings,
  ) -> Result<Self, GraphError> {
    let graph = Graph::new(&nodes, &connections)?;
    Ok(Self {
      workflow_id,
      name,
      start_node,
      nodes,
      connections,
      variables,
      settings,
      graph: Some(graph),
    })
  }

  pub fn graph(&self) -> &Graph {
    self
      .graph
      .as_ref()
      .expect("Workflow::graph is always populated by Workflow::new")
  }

  pub fn node(&self, node_id: &str) -> Option<&Node> {
    self.nodes.get(node_id)
  }

  /// Every node reachable from the start node, for the progress metric
  /// denominator (§4.1 Node lifecycle).
  pub fn reachable_node_count(&self) -> usize {
    self.graph().reachable_from(&self.start_node).len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::node::NodeKind;

  fn node(id: &str, kind: NodeKind) -> Node {
    Node {
      node_id: id.into(),
      node_type: id.into(),
      kind,
      config: HashMap::new(),
      input_port_bindings: HashMap::new(),
      timeout_seconds: crate::node::DEFAULT_NODE_TIMEOUT_SECS,
    }
  }

  #[test]
  fn reachable_node_count_excludes_disconnected_nodes() {
    let mut nodes = HashMap::new();
    nodes.insert("start".to_string(), node("start", NodeKind::Start));
    nodes.insert("a".to_string(), node("a", NodeKind::Component));
    nodes.insert("orphan".to_string(), node("orphan", NodeKind::Component));

    let connections = vec![Connection {
      source_node: "start".into(),
      source_port: "exec_out".into(),
      target_node: "a".into(),
      target_port: "exec_in".into(),
    }];

    let workflow = Workflow::new(
      "wf-1".into(),
      "demo".into(),
      "start".into(),
      nodes,
      connections,
      HashMap::new(),
      WorkflowSettings::default(),
    )
    .unwrap();

    assert_eq!(workflow.reachable_node_count(), 2);
  }
}
