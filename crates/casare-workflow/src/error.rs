use thiserror::Error;

/// Errors raised while querying a locked workflow's graph.
#[derive(Debug, Error)]
pub enum GraphError {
  #[error("connection references unknown node '{0}'")]
  UnknownNode(String),

  #[error("input port '{target_port}' on node '{target_node}' has more than one incoming data edge")]
  DuplicateDataBinding {
    target_node: String,
    target_port: String,
  },
}
