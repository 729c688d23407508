use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Workflow metadata. Immutable after submission (§3 Workflow).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowMetadata {
  pub name: String,
  #[serde(default)]
  pub version: String,
  #[serde(default)]
  pub author: Option<String>,
  #[serde(default)]
  pub description: Option<String>,
  pub created_at: chrono::DateTime<chrono::Utc>,
  #[serde(default)]
  pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
  /// Schema version of the workflow JSON format, not the app version.
  pub schema_version: u32,
  #[serde(default)]
  pub tags: HashSet<String>,
}
