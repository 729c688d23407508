use serde::{Deserialize, Serialize};

/// Whole-workflow settings (§3 Settings).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSettings {
  #[serde(default)]
  pub stop_on_error: bool,
  /// Whole-workflow wall clock timeout.
  #[serde(default = "default_timeout_seconds")]
  pub timeout_seconds: u64,
  /// Whole-workflow retry count, distinct from any per-node `RetryNode`.
  #[serde(default)]
  pub retry_count: u32,
}

fn default_timeout_seconds() -> u64 {
  3600
}

impl Default for WorkflowSettings {
  fn default() -> Self {
    Self {
      stop_on_error: false,
      timeout_seconds: default_timeout_seconds(),
      retry_count: 0,
    }
  }
}
