//! CasareRPA Locked Workflow
//!
//! The execution-ready representation of a workflow, produced by
//! `casare-workflow-loader` from a `casare_workflow_def::WorkflowDef`. By the
//! time a `Workflow` exists, graph invariants (I1-I5) have already been
//! checked and every node's `node_type` has been classified into a
//! `NodeKind` (§4.1).

mod error;
mod graph;
mod node;
mod workflow;

pub use casare_workflow_def::Connection;
pub use error::GraphError;
pub use graph::Graph;
pub use node::{Node, NodeKind, DEFAULT_NODE_TIMEOUT_SECS};
pub use workflow::Workflow;
