use thiserror::Error;

use casare_workflow::GraphError;

/// Errors that reject a `WorkflowDef` during loading (I1-I5). Unknown node
/// types are deliberately not one of these — those are rejected at dispatch
/// time against the live node registry, not here (§6).
#[derive(Debug, Error)]
pub enum LoadError {
  #[error("workflow has no Start node")]
  NoStartNode,

  #[error("workflow has {0} Start nodes, expected exactly one")]
  MultipleStartNodes(usize),

  #[error(
    "back-edge from '{from}' to '{to}' is not permitted: '{to}' is not a loop, retry, or for_each node"
  )]
  InvalidBackEdge { from: String, to: String },

  #[error(transparent)]
  Graph(#[from] GraphError),
}
