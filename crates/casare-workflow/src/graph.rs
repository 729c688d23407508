use std::collections::{HashMap, HashSet};

use casare_workflow_def::Connection;

use crate::error::GraphError;
use crate::node::Node;

/// The exec-flow and data-flow indices over a locked workflow's connections
/// (§4.1). Built once at load time; the engine never mutates it, only walks
/// it.
///
/// Exec edges and data edges are indexed separately because the engine
/// consumes them differently: exec edges drive traversal (which node runs
/// next), data edges are looked up on demand while resolving a node's inputs
/// (§4.1 step 4).
#[derive(Debug, Clone)]
pub struct Graph {
  /// (source_node, source_exec_port) -> ordered list of (target_node, target_exec_port).
  /// Order matches connection declaration order (step 8: "enqueue exec-out
  /// targets in declaration order").
  exec_out: HashMap<(String, String), Vec<(String, String)>>,
  /// (target_node, target_port) -> (source_node, source_port). Each input
  /// port has at most one incoming data edge (I2); this map enforces that by
  /// construction.
  data_in: HashMap<(String, String), (String, String)>,
}

impl Graph {
  pub fn new(nodes: &HashMap<String, Node>, connections: &[Connection]) -> Result<Self, GraphError> {
    let mut exec_out: HashMap<(String, String), Vec<(String, String)>> = HashMap::new();
    let mut data_in: HashMap<(String, String), (String, String)> = HashMap::new();

    for conn in connections {
      if !nodes.contains_key(&conn.source_node) {
        return Err(GraphError::UnknownNode(conn.source_node.clone()));
      }
      if !nodes.contains_key(&conn.target_node) {
        return Err(GraphError::UnknownNode(conn.target_node.clone()));
      }

      if conn.is_exec_edge() {
        exec_out
          .entry((conn.source_node.clone(), conn.source_port.clone()))
          .or_default()
          .push((conn.target_node.clone(), conn.target_port.clone()));
      } else {
        let key = (conn.target_node.clone(), conn.target_port.clone());
        if data_in.contains_key(&key) {
          return Err(GraphError::DuplicateDataBinding {
            target_node: conn.target_node.clone(),
            target_port: conn.target_port.clone(),
          });
        }
        data_in.insert(
          key,
          (conn.source_node.clone(), conn.source_port.clone()),
        );
      }
    }

    Ok(Self { exec_out, data_in })
  }

  /// The exec-out targets a node signaling `port` should run next, in
  /// declaration order.
  pub fn exec_successors(&self, node_id: &str, port: &str) -> &[(String, String)] {
    self
      .exec_out
      .get(&(node_id.to_string(), port.to_string()))
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// The upstream (node, port) feeding a node's input port, if bound by a
  /// data edge rather than an `input_port_bindings` literal.
  pub fn data_source(&self, target_node: &str, target_port: &str) -> Option<&(String, String)> {
    self
      .data_in
      .get(&(target_node.to_string(), target_port.to_string()))
  }

  /// Every node reachable from `start_node` by following exec edges,
  /// regardless of which exec-out port is taken. Used once to compute the
  /// denominator of the progress metric (§4.1 Node lifecycle).
  pub fn reachable_from(&self, start_node: &str) -> HashSet<String> {
    let mut seen = HashSet::new();
    let mut stack = vec![start_node.to_string()];
    seen.insert(start_node.to_string());

    while let Some(node_id) = stack.pop() {
      for ((src, _port), targets) in &self.exec_out {
        if src != &node_id {
          continue;
        }
        for (target_node, _) in targets {
          if seen.insert(target_node.clone()) {
            stack.push(target_node.clone());
          }
        }
      }
    }

    seen
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::node::NodeKind;
  use std::collections::HashMap as Map;

  fn node(id: &str, kind: NodeKind) -> Node {
    Node {
      node_id: id.into(),
      node_type: id.into(),
      kind,
      config: Map::new(),
      input_port_bindings: Map::new(),
      timeout_seconds: crate::node::DEFAULT_NODE_TIMEOUT_SECS,
    }
  }

  fn conn(sn: &str, sp: &str, tn: &str, tp: &str) -> Connection {
    Connection {
      source_node: sn.into(),
      source_port: sp.into(),
      target_node: tn.into(),
      target_port: tp.into(),
    }
  }

  #[test]
  fn exec_successors_preserve_declaration_order() {
    let mut nodes = Map::new();
    nodes.insert("start".to_string(), node("start", NodeKind::Start));
    nodes.insert("a".to_string(), node("a", NodeKind::Component));
    nodes.insert("b".to_string(), node("b", NodeKind::Component));

    let connections = vec![
      conn("start", "exec_out", "a", "exec_in"),
      conn("start", "exec_out", "b", "exec_in"),
    ];
    let graph = Graph::new(&nodes, &connections).unwrap();
    let succ = graph.exec_successors("start", "exec_out");
    assert_eq!(
      succ,
      &[("a".to_string(), "exec_in".to_string()), ("b".to_string(), "exec_in".to_string())]
    );
  }

  #[test]
  fn data_edges_are_separate_from_exec_edges() {
    let mut nodes = Map::new();
    nodes.insert("a".to_string(), node("a", NodeKind::Component));
    nodes.insert("b".to_string(), node("b", NodeKind::Component));

    let connections = vec![conn("a", "value_out", "b", "value_in")];
    let graph = Graph::new(&nodes, &connections).unwrap();
    assert_eq!(
      graph.data_source("b", "value_in"),
      Some(&("a".to_string(), "value_out".to_string()))
    );
    assert!(graph.exec_successors("a", "value_out").is_empty());
  }

  #[test]
  fn rejects_duplicate_data_bindings_on_same_input() {
    let mut nodes = Map::new();
    nodes.insert("a".to_string(), node("a", NodeKind::Component));
    nodes.insert("b".to_string(), node("b", NodeKind::Component));
    nodes.insert("c".to_string(), node("c", NodeKind::Component));

    let connections = vec![
      conn("a", "value_out", "c", "value_in"),
      conn("b", "value_out", "c", "value_in"),
    ];
    let err = Graph::new(&nodes, &connections).unwrap_err();
    assert!(matches!(err, GraphError::DuplicateDataBinding { .. }));
  }

  #[test]
  fn reachability_follows_exec_edges_only() {
    let mut nodes = Map::new();
    nodes.insert("start".to_string(), node("start", NodeKind::Start));
    nodes.insert("a".to_string(), node("a", NodeKind::Component));
    nodes.insert("orphan".to_string(), node("orphan", NodeKind::Component));

    let connections = vec![conn("start", "exec_out", "a", "exec_in")];
    let graph = Graph::new(&nodes, &connections).unwrap();
    let reachable = graph.reachable_from("start");
    assert!(reachable.contains("start"));
    assert!(reachable.contains("a"));
    assert!(!reachable.contains("orphan"));
  }
}
