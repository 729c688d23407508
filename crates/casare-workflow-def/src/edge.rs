use serde::{Deserialize, Serialize};

/// A connection between two node ports (§3 Connections, GLOSSARY).
///
/// Whether this is an exec edge or a data edge is determined entirely by the
/// port name convention: a port whose name starts with `exec_` carries
/// control flow, everything else carries a typed value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
  pub source_node: String,
  pub source_port: String,
  pub target_node: String,
  pub target_port: String,
}

impl Connection {
  /// Port prefix that marks a port (and therefore the edges touching it) as
  /// exec-flow rather than data-flow.
  pub const EXEC_PORT_PREFIX: &'static str = "exec_";

  pub fn is_exec_port(port: &str) -> bool {
    port.starts_with(Self::EXEC_PORT_PREFIX)
  }

  /// An edge is an exec edge iff either endpoint uses the `exec_` convention.
  /// Both endpoints are expected to agree; mismatches are caught by the
  /// loader (I1).
  pub fn is_exec_edge(&self) -> bool {
    Self::is_exec_port(&self.source_port) || Self::is_exec_port(&self.target_port)
  }

  pub fn is_data_edge(&self) -> bool {
    !self.is_exec_edge()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn classifies_exec_and_data_ports() {
    assert!(Connection::is_exec_port("exec_out"));
    assert!(Connection::is_exec_port("exec_true"));
    assert!(!Connection::is_exec_port("value_out"));
  }

  #[test]
  fn classifies_edges_by_port_name() {
    let exec = Connection {
      source_node: "a".into(),
      source_port: "exec_out".into(),
      target_node: "b".into(),
      target_port: "exec_in".into(),
    };
    assert!(exec.is_exec_edge());
    assert!(!exec.is_data_edge());

    let data = Connection {
      source_node: "a".into(),
      source_port: "value".into(),
      target_node: "b".into(),
      target_port: "input".into(),
    };
    assert!(data.is_data_edge());
  }
}
