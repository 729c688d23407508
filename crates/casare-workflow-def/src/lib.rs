//! CasareRPA Workflow Definition
//!
//! Serializable workflow types: the format a workflow is stored and
//! transmitted in, before it is validated and locked into a runtime
//! `casare_workflow::Workflow` by `casare-workflow-loader`.
//!
//! Key differences from `casare-workflow`:
//! - Node types are plugin keys (strings), not resolved `NodeInstance`s
//! - Graph structure is unvalidated — cycles, dangling edges, etc. are
//!   possible here and rejected during loading
//! - This is the shape workflow JSON round-trips through (§6)

mod edge;
mod error;
mod metadata;
mod node;
mod settings;
mod workflow;

pub use edge::Connection;
pub use error::SchemaError;
pub use metadata::WorkflowMetadata;
pub use node::{NodeDef, Position};
pub use settings::WorkflowSettings;
pub use workflow::WorkflowDef;
