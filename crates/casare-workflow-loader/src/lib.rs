//! CasareRPA Workflow Loader
//!
//! Turns a `casare_workflow_def::WorkflowDef` into a locked
//! `casare_workflow::Workflow`, enforcing the graph invariants that must
//! hold before the engine can traverse it: exactly one Start node, no
//! exec-edge cycles outside designated loop nodes, and no connection
//! endpoints referencing a node that doesn't exist.

mod error;
mod loader;

pub use error::LoadError;
pub use loader::load;
