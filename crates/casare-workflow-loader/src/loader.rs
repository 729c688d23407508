use std::collections::{HashMap, HashSet};

use casare_workflow::{Node, NodeKind, Workflow};
use casare_workflow_def::WorkflowDef;

use crate::error::LoadError;

/// Validate a `WorkflowDef` against I3-I5 and lock it into an execution-ready
/// `Workflow`.
///
/// I1 (exec-edge target port exists) and I2 (data-edge type compatibility)
/// are not checked here — both require knowledge of a node's port schema,
/// which only the node registry has, and unknown node types are rejected at
/// dispatch time rather than load time (§6). This loader only ever sees
/// `node_type` as an opaque string.
pub fn load(def: WorkflowDef) -> Result<Workflow, LoadError> {
  let nodes: HashMap<String, Node> = def
    .nodes
    .into_iter()
    .map(|(id, node_def)| {
      let kind = NodeKind::from_node_type(&node_def.node_type);
      let node = Node {
        node_id: node_def.node_id,
        node_type: node_def.node_type,
        kind,
        config: node_def.config,
        input_port_bindings: node_def.input_port_bindings,
        timeout_seconds: node_def
          .timeout_seconds
          .unwrap_or(casare_workflow::DEFAULT_NODE_TIMEOUT_SECS),
      };
      (id, node)
    })
    .collect();

  let start_node = find_start_node(&nodes)?;
  check_back_edges(&nodes, &def.connections)?;

  Workflow::new(
    format!("wf-{start_node}"),
    def.metadata.name.clone(),
    start_node,
    nodes,
    def.connections,
    def.variables,
    def.settings,
  )
  .map_err(LoadError::from)
}

fn find_start_node(nodes: &HashMap<String, Node>) -> Result<String, LoadError> {
  let starts: Vec<&String> = nodes
    .iter()
    .filter(|(_, n)| n.kind == NodeKind::Start)
    .map(|(id, _)| id)
    .collect();

  match starts.len() {
    0 => Err(LoadError::NoStartNode),
    1 => Ok(starts[0].clone()),
    n => Err(LoadError::MultipleStartNodes(n)),
  }
}

/// Reject any exec-edge back-edge whose target is not a designated loop node
/// (I4). DFS with three-coloring: white (unvisited), gray (on the current
/// path), black (finished). A gray target is a back-edge.
fn check_back_edges(
  nodes: &HashMap<String, Node>,
  connections: &[casare_workflow_def::Connection],
) -> Result<(), LoadError> {
  let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
  for id in nodes.keys() {
    adjacency.insert(id.as_str(), Vec::new());
  }
  for conn in connections {
    if conn.is_exec_edge() {
      if let Some(targets) = adjacency.get_mut(conn.source_node.as_str()) {
        targets.push(conn.target_node.as_str());
      }
    }
  }

  #[derive(Clone, Copy, PartialEq)]
  enum Color {
    White,
    Gray,
    Black,
  }

  let mut color: HashMap<&str, Color> = nodes.keys().map(|id| (id.as_str(), Color::White)).collect();
  let mut seen_roots = HashSet::new();

  fn visit<'a>(
    node: &'a str,
    adjacency: &HashMap<&'a str, Vec<&'a str>>,
    nodes: &HashMap<String, Node>,
    color: &mut HashMap<&'a str, Color>,
  ) -> Result<(), LoadError> {
    color.insert(node, Color::Gray);

    if let Some(neighbors) = adjacency.get(node) {
      for &next in neighbors {
        match color.get(next) {
          Some(Color::Gray) => {
            let target_kind = nodes.get(next).map(|n| n.kind);
            let is_loop_target = target_kind.is_some_and(|k| k.is_loop_node());
            if !is_loop_target {
              return Err(LoadError::InvalidBackEdge {
                from: node.to_string(),
                to: next.to_string(),
              });
            }
          }
          Some(Color::White) => visit(next, adjacency, nodes, color)?,
          _ => {}
        }
      }
    }

    color.insert(node, Color::Black);
    Ok(())
  }

  for id in nodes.keys() {
    if !seen_roots.insert(id.as_str()) {
      continue;
    }
    if color.get(id.as_str()) == Some(&Color::White) {
      visit(id.as_str(), &adjacency, nodes, &mut color)?;
    }
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use casare_workflow_def::{Connection, NodeDef, WorkflowDef, WorkflowMetadata, WorkflowSettings};
  use std::collections::HashMap as Map;

  fn def_node(id: &str, node_type: &str) -> NodeDef {
    NodeDef {
      node_id: id.into(),
      node_type: node_type.into(),
      name: None,
      position: None,
      config: Map::new(),
      input_port_bindings: Map::new(),
      timeout_seconds: None,
    }
  }

  fn sample(nodes: Vec<NodeDef>, connections: Vec<Connection>) -> WorkflowDef {
    WorkflowDef {
      metadata: WorkflowMetadata {
        name: "demo".into(),
        version: String::new(),
        author: None,
        description: None,
        created_at: chrono::Utc::now(),
        updated_at: None,
        schema_version: 1,
        tags: Default::default(),
      },
      nodes: nodes.into_iter().map(|n| (n.node_id.clone(), n)).collect(),
      connections,
      variables: Map::new(),
      settings: WorkflowSettings::default(),
    }
  }

  #[test]
  fn loads_a_linear_workflow() {
    let def = sample(
      vec![def_node("start", "start"), def_node("a", "my/component")],
      vec![Connection {
        source_node: "start".into(),
        source_port: "exec_out".into(),
        target_node: "a".into(),
        target_port: "exec_in".into(),
      }],
    );
    let workflow = load(def).unwrap();
    assert_eq!(workflow.start_node, "start");
    assert_eq!(workflow.nodes.len(), 2);
  }

  #[test]
  fn rejects_missing_start_node() {
    let def = sample(vec![def_node("a", "my/component")], vec![]);
    assert!(matches!(load(def), Err(LoadError::NoStartNode)));
  }

  #[test]
  fn rejects_multiple_start_nodes() {
    let def = sample(
      vec![def_node("start1", "start"), def_node("start2", "start")],
      vec![],
    );
    assert!(matches!(load(def), Err(LoadError::MultipleStartNodes(2))));
  }

  #[test]
  fn rejects_back_edge_into_non_loop_node() {
    let def = sample(
      vec![def_node("start", "start"), def_node("a", "my/component")],
      vec![
        Connection {
          source_node: "start".into(),
          source_port: "exec_out".into(),
          target_node: "a".into(),
          target_port: "exec_in".into(),
        },
        Connection {
          source_node: "a".into(),
          source_port: "exec_out".into(),
          target_node: "start".into(),
          target_port: "exec_in".into(),
        },
      ],
    );
    assert!(matches!(load(def), Err(LoadError::InvalidBackEdge { .. })));
  }

  #[test]
  fn permits_back_edge_into_loop_node() {
    let def = sample(
      vec![
        def_node("start", "start"),
        def_node("loop", "loop"),
        def_node("body", "my/component"),
      ],
      vec![
        Connection {
          source_node: "start".into(),
          source_port: "exec_out".into(),
          target_node: "loop".into(),
          target_port: "exec_in".into(),
        },
        Connection {
          source_node: "loop".into(),
          source_port: "exec_loop_body".into(),
          target_node: "body".into(),
          target_port: "exec_in".into(),
        },
        Connection {
          source_node: "body".into(),
          source_port: "exec_out".into(),
          target_node: "loop".into(),
          target_port: "exec_in".into(),
        },
      ],
    );
    assert!(load(def).is_ok());
  }

  #[test]
  fn rejects_connection_to_unknown_node() {
    let def = sample(
      vec![def_node("start", "start")],
      vec![Connection {
        source_node: "start".into(),
        source_port: "exec_out".into(),
        target_node: "ghost".into(),
        target_port: "exec_in".into(),
      }],
    );
    assert!(matches!(load(def), Err(LoadError::Graph(_))));
  }
}
