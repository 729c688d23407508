use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::edge::Connection;
use crate::error::SchemaError;
use crate::metadata::WorkflowMetadata;
use crate::node::NodeDef;
use crate::settings::WorkflowSettings;

/// A workflow as persisted (§3, §6). This is the "opaque byte stream" the
/// spec treats workflow JSON as at the boundary — parsing it here only
/// decodes the documented schema; it never executes or evaluates anything
/// embedded in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDef {
  pub metadata: WorkflowMetadata,
  pub nodes: HashMap<String, NodeDef>,
  #[serde(default)]
  pub connections: Vec<Connection>,
  #[serde(default)]
  pub variables: HashMap<String, serde_json::Value>,
  #[serde(default)]
  pub settings: WorkflowSettings,
}

impl WorkflowDef {
  /// Parse and schema-validate a workflow from JSON text.
  ///
  /// Schema-validation here means "can be decoded into the documented
  /// shape" — graph-level invariants (I1-I5) are the loader's job
  /// (`casare-workflow-loader`), not this crate's.
  pub fn from_json(text: &str) -> Result<Self, SchemaError> {
    let def: WorkflowDef = serde_json::from_str(text)?;
    def.check_basic_shape()?;
    Ok(def)
  }

  /// As `from_json`, but decoding from an already-parsed `Value` — a job
  /// row's `workflow` column is stored and read back as JSONB, not text.
  pub fn from_value(value: serde_json::Value) -> Result<Self, SchemaError> {
    let def: WorkflowDef = serde_json::from_value(value)?;
    def.check_basic_shape()?;
    Ok(def)
  }

  fn check_basic_shape(&self) -> Result<(), SchemaError> {
    if self.metadata.name.trim().is_empty() {
      return Err(SchemaError::MissingField("metadata.name"));
    }
    if self.nodes.is_empty() {
      return Err(SchemaError::MissingField("nodes"));
    }
    for (node_id, node) in &self.nodes {
      if node_id != &node.node_id {
        return Err(SchemaError::NodeIdMismatch {
          key: node_id.clone(),
          declared: node.node_id.clone(),
        });
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sample_json() -> String {
    serde_json::json!({
      "metadata": {
        "name": "demo",
        "schema_version": 1,
        "created_at": "2026-01-01T00:00:00Z",
      },
      "nodes": {
        "start": { "node_id": "start", "node_type": "start" }
      },
      "connections": [],
      "variables": {},
      "settings": { "stop_on_error": true, "timeout_seconds": 60, "retry_count": 0 }
    })
    .to_string()
  }

  #[test]
  fn parses_well_formed_workflow() {
    let def = WorkflowDef::from_json(&sample_json()).unwrap();
    assert_eq!(def.metadata.name, "demo");
    assert_eq!(def.nodes.len(), 1);
    assert!(def.settings.stop_on_error);
  }

  #[test]
  fn rejects_mismatched_node_id() {
    let mut value: serde_json::Value = serde_json::from_str(&sample_json()).unwrap();
    value["nodes"]["start"]["node_id"] = serde_json::json!("not-start");
    let err = WorkflowDef::from_json(&value.to_string()).unwrap_err();
    assert!(matches!(err, SchemaError::NodeIdMismatch { .. }));
  }

  #[test]
  fn ignores_unknown_top_level_keys() {
    let mut value: serde_json::Value = serde_json::from_str(&sample_json()).unwrap();
    value["gui_layout_cache"] = serde_json::json!({"anything": true});
    let def = WorkflowDef::from_json(&value.to_string()).unwrap();
    assert_eq!(def.metadata.name, "demo");
  }
}
