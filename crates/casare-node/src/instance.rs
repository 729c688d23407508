use async_trait::async_trait;

use crate::context::NodeContext;
use crate::port::PortSchema;

/// What a node plugin returns after `execute` runs to completion (§4.1.1).
/// Timeouts and context-cancel are not expressed here — the engine wraps
/// the call in its own timeout race and treats a cancelled context as
/// `CANCELLED` regardless of what the plugin returns.
#[derive(Debug, Clone)]
pub enum NodeOutcome {
  Success {
    outputs: std::collections::HashMap<String, serde_json::Value>,
    /// The exec-out ports this node signaled, in the order the engine
    /// should enqueue their targets (§4.1 step 8). Most nodes signal
    /// exactly one (`exec_out`); branching nodes may signal
    /// `exec_true`/`exec_false`, etc.
    exec_out: Vec<String>,
  },
  Failure {
    error: crate::error::NodeError,
  },
}

impl NodeOutcome {
  pub fn success(exec_out: impl Into<String>) -> Self {
    NodeOutcome::Success {
      outputs: std::collections::HashMap::new(),
      exec_out: vec![exec_out.into()],
    }
  }

  pub fn with_output(mut self, port: impl Into<String>, value: serde_json::Value) -> Self {
    if let NodeOutcome::Success { outputs, .. } = &mut self {
      outputs.insert(port.into(), value);
    }
    self
  }

  pub fn failure(error: crate::error::NodeError) -> Self {
    NodeOutcome::Failure { error }
  }
}

/// The contract every node plugin satisfies (§9 Design Notes). There is no
/// dynamic dispatch beyond this one interface — per-type state (e.g. a
/// retry node's attempt counter) lives in the concrete type behind it, not
/// in the trait.
///
/// Only `Component`-kind nodes (`casare_workflow::NodeKind::Component`) go
/// through this trait. `Start`, `Try`, `Retry`, `RetrySuccess`, `RetryFail`,
/// `Loop`, and `ForEach` are recognized structurally by the engine and never
/// instantiated through a `NodeRegistry`.
#[async_trait]
pub trait NodeInstance: Send + Sync {
  /// The ports this node exposes. The engine consults this for bypass
  /// routing (§4.1 step 5, P3) and for dispatch-time port validation.
  fn define_ports(&self) -> PortSchema;

  /// Validate the node's own configuration (not its wiring in the graph —
  /// that's the loader's job). Called once, before the node first runs.
  fn validate(&self) -> Result<(), crate::error::NodeError> {
    Ok(())
  }

  async fn execute(&self, ctx: &mut dyn NodeContext) -> NodeOutcome;
}
