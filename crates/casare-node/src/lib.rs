//! CasareRPA Node Plugin Contract
//!
//! Defines the seam between the engine and the ~250 business-logic node
//! types the full system ships (browser/desktop/LLM/file/database — out of
//! scope here, §1): the `NodeInstance` trait, the `NodeContext` SPI a
//! plugin sees of its `ExecutionContext`, and a registry mapping
//! `node_type` keys to factories.
//!
//! Also carries the built-in control/utility nodes every workflow can use
//! without registering anything: `end`, `set_variable`, `increment`,
//! `throw_error`, and the scenario node `conditionally_failing` (§8).

mod builtins;
mod context;
mod error;
mod instance;
mod port;
mod registry;

pub use context::{CredentialRequest, NodeContext};
pub use error::{ErrorKind, NodeError};
pub use instance::{NodeInstance, NodeOutcome};
pub use port::{PortDef, PortSchema};
pub use registry::{NodeFactory, NodeRegistry};
