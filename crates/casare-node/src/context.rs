use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::NodeError;

/// The parameters a node supplies when asking its context to resolve a
/// credential (§4.5). The context owns the actual resolver chain
/// (vault → direct → context-var → env); a node only describes where to
/// look.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialRequest {
  pub credential_name: Option<String>,
  pub direct_param: Option<Value>,
  pub context_var: Option<String>,
  pub env_var: Option<String>,
  /// Which subvalue of the vault credential to return, when resolved from
  /// the vault tier.
  pub credential_field: Option<String>,
}

/// The surface a `NodeInstance` sees of its `ExecutionContext` (§3
/// ExecutionContext). Defined here, not in `casare-engine`, so this crate
/// never has to depend upward on the engine: `casare-engine::ExecutionContext`
/// implements this trait, and node plugins are written against the trait
/// alone.
#[async_trait]
pub trait NodeContext: Send {
  fn node_id(&self) -> &str;

  /// Read a resolved input port value — the data-edge source's cached
  /// output, or the node's literal `input_port_bindings` default.
  fn get_input(&self, port: &str) -> Option<Value>;

  fn get_variable(&self, name: &str) -> Option<Value>;

  fn set_variable(&mut self, name: &str, value: Value);

  /// Resolve a credential through the vault → direct → context-var → env
  /// chain (§4.5, P9). Returns `CREDENTIAL_NOT_FOUND` if every tier is
  /// empty.
  async fn resolve_credential(&mut self, request: CredentialRequest) -> Result<Value, NodeError>;

  /// Whether the owning job has been cancelled. Long-running node plugins
  /// should poll this and return early; the node timeout is the last
  /// resort otherwise (§5 Cancellation).
  fn is_cancelled(&self) -> bool;

  /// The attempt number of the innermost active retry frame, if any
  /// (§4.1.3). Exists for test/scenario nodes like `ConditionallyFailingNode`
  /// that need to vary behavior by retry attempt; ordinary business nodes
  /// have no reason to read it.
  fn retry_attempt(&self) -> Option<u32> {
    None
  }
}
