use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A per-workflow per-node routing directive (§3 Node Override). Unique on
/// `(workflow_id, node_id)`. `reason`/`created_by` are audit metadata
/// carried by the original's `node_override_repository.py` that the
/// distilled data model omits; kept here as optional fields since they
/// round out a real persistence layer without changing dispatch semantics.
#[derive(Debug, Clone)]
pub struct NodeOverride {
  pub workflow_id: String,
  pub node_id: String,
  pub specific_robot_id: Option<Uuid>,
  pub required_capabilities: HashSet<String>,
  pub reason: Option<String>,
  pub created_by: Option<String>,
  pub created_at: DateTime<Utc>,
}

impl NodeOverride {
  pub fn new(workflow_id: impl Into<String>, node_id: impl Into<String>) -> Self {
    Self {
      workflow_id: workflow_id.into(),
      node_id: node_id.into(),
      specific_robot_id: None,
      required_capabilities: HashSet::new(),
      reason: None,
      created_by: None,
      created_at: Utc::now(),
    }
  }
}

/// In-process store of overrides, keyed by `(workflow_id, node_id)` (§3
/// Node Override "Unique on").
#[derive(Default)]
pub struct OverrideTable {
  overrides: HashMap<(String, String), NodeOverride>,
}

impl OverrideTable {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn upsert(&mut self, over: NodeOverride) {
    self.overrides.insert((over.workflow_id.clone(), over.node_id.clone()), over);
  }

  pub fn for_workflow<'a>(&'a self, workflow_id: &str) -> impl Iterator<Item = &'a NodeOverride> {
    self.overrides.values().filter(move |o| o.workflow_id == workflow_id)
  }

  /// §4.4 "Override application": refine a job's base required capabilities
  /// with every override that applies to its workflow.
  pub fn effective_required_capabilities(&self, workflow_id: &str, base_required: &HashSet<String>) -> HashSet<String> {
    let mut effective = base_required.clone();
    for over in self.for_workflow(workflow_id) {
      effective.extend(over.required_capabilities.iter().cloned());
    }
    effective
  }

  /// Any override pinning a specific robot for a node in this workflow
  /// (§4.4: "the agent can enforce per-node routing during execution").
  pub fn specific_robot_for(&self, workflow_id: &str, node_id: &str) -> Option<Uuid> {
    self.overrides.get(&(workflow_id.to_string(), node_id.to_string())).and_then(|o| o.specific_robot_id)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn effective_capabilities_is_union_of_base_and_overrides() {
    let mut table = OverrideTable::new();
    let mut over = NodeOverride::new("wf1", "n1");
    over.required_capabilities.insert("gpu".to_string());
    table.upsert(over);

    let base: HashSet<String> = ["browser".to_string()].into_iter().collect();
    let effective = table.effective_required_capabilities("wf1", &base);
    assert!(effective.contains("browser"));
    assert!(effective.contains("gpu"));
  }

  #[test]
  fn unrelated_workflow_is_untouched() {
    let mut table = OverrideTable::new();
    let mut over = NodeOverride::new("wf1", "n1");
    over.required_capabilities.insert("gpu".to_string());
    table.upsert(over);

    let base: HashSet<String> = ["browser".to_string()].into_iter().collect();
    let effective = table.effective_required_capabilities("wf2", &base);
    assert_eq!(effective, base);
  }

  #[test]
  fn specific_robot_override_is_looked_up_by_key() {
    let mut table = OverrideTable::new();
    let robot_id = Uuid::new_v4();
    let mut over = NodeOverride::new("wf1", "n1");
    over.specific_robot_id = Some(robot_id);
    over.reason = Some("pin to GPU box".to_string());
    over.created_by = Some("ops@example.com".to_string());
    table.upsert(over);

    assert_eq!(table.specific_robot_for("wf1", "n1"), Some(robot_id));
    assert_eq!(table.specific_robot_for("wf1", "n2"), None);
  }
}
