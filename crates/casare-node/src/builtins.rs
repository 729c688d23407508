//! The built-in node types every deployment gets for free: a handful of
//! control/utility nodes plus the scenario nodes used to exercise try/catch
//! and retry semantics (§8). Business-logic node types (~250 of them,
//! browser/desktop/LLM/file/database) are out of scope here — they are
//! registered by the embedding binary via `NodeRegistry::register`.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::context::NodeContext;
use crate::error::{ErrorKind, NodeError};
use crate::instance::{NodeInstance, NodeOutcome};
use crate::port::{PortDef, PortSchema};
use crate::registry::NodeRegistry;

pub fn register_all(registry: &mut NodeRegistry) {
  registry.register("end", std::sync::Arc::new(|_cfg| Ok(Box::new(EndNode) as Box<dyn NodeInstance>)));
  registry.register(
    "set_variable",
    std::sync::Arc::new(|cfg| Ok(Box::new(SetVariableNode::from_config(cfg)?) as Box<dyn NodeInstance>)),
  );
  registry.register(
    "increment",
    std::sync::Arc::new(|cfg| Ok(Box::new(IncrementNode::from_config(cfg)?) as Box<dyn NodeInstance>)),
  );
  registry.register(
    "throw_error",
    std::sync::Arc::new(|cfg| Ok(Box::new(ThrowErrorNode::from_config(cfg)?) as Box<dyn NodeInstance>)),
  );
  registry.register(
    "conditionally_failing",
    std::sync::Arc::new(|cfg| {
      Ok(Box::new(ConditionallyFailingNode::from_config(cfg)?) as Box<dyn NodeInstance>)
    }),
  );
}

fn require_str(config: &HashMap<String, Value>, key: &str) -> Result<String, NodeError> {
  config
    .get(key)
    .and_then(Value::as_str)
    .map(str::to_string)
    .ok_or_else(|| NodeError::validation(format!("missing required config field '{key}'")))
}

/// Terminal marker node. A workflow is not required to end here, but most
/// do (§8 scenario 1).
pub struct EndNode;

#[async_trait]
impl NodeInstance for EndNode {
  fn define_ports(&self) -> PortSchema {
    PortSchema {
      inputs: vec![PortDef::exec("exec_in")],
      outputs: vec![],
    }
  }

  async fn execute(&self, _ctx: &mut dyn NodeContext) -> NodeOutcome {
    NodeOutcome::Success {
      outputs: HashMap::new(),
      exec_out: vec![],
    }
  }
}

/// Sets a workflow variable to a literal configured value.
pub struct SetVariableNode {
  name: String,
  value: Value,
}

impl SetVariableNode {
  fn from_config(config: &HashMap<String, Value>) -> Result<Self, NodeError> {
    Ok(Self {
      name: require_str(config, "name")?,
      value: config.get("value").cloned().unwrap_or(Value::Null),
    })
  }
}

#[async_trait]
impl NodeInstance for SetVariableNode {
  fn define_ports(&self) -> PortSchema {
    PortSchema {
      inputs: vec![PortDef::exec("exec_in"), PortDef::data("value")],
      outputs: vec![PortDef::exec("exec_out")],
    }
  }

  async fn execute(&self, ctx: &mut dyn NodeContext) -> NodeOutcome {
    let value = ctx.get_input("value").unwrap_or_else(|| self.value.clone());
    ctx.set_variable(&self.name, value);
    NodeOutcome::success("exec_out")
  }
}

/// Adds `by` to a numeric workflow variable in place.
pub struct IncrementNode {
  name: String,
  by: f64,
}

impl IncrementNode {
  fn from_config(config: &HashMap<String, Value>) -> Result<Self, NodeError> {
    Ok(Self {
      name: require_str(config, "name")?,
      by: config.get("by").and_then(Value::as_f64).unwrap_or(1.0),
    })
  }
}

#[async_trait]
impl NodeInstance for IncrementNode {
  fn define_ports(&self) -> PortSchema {
    PortSchema {
      inputs: vec![PortDef::exec("exec_in")],
      outputs: vec![PortDef::exec("exec_out")],
    }
  }

  async fn execute(&self, ctx: &mut dyn NodeContext) -> NodeOutcome {
    let current = ctx
      .get_variable(&self.name)
      .and_then(|v| v.as_f64())
      .unwrap_or(0.0);
    ctx.set_variable(&self.name, Value::from(current + self.by));
    NodeOutcome::success("exec_out")
  }
}

/// Unconditionally fails with a configured message (§8 scenario 2).
pub struct ThrowErrorNode {
  message: String,
}

impl ThrowErrorNode {
  fn from_config(config: &HashMap<String, Value>) -> Result<Self, NodeError> {
    Ok(Self {
      message: require_str(config, "message")?,
    })
  }
}

#[async_trait]
impl NodeInstance for ThrowErrorNode {
  fn define_ports(&self) -> PortSchema {
    PortSchema {
      inputs: vec![PortDef::exec("exec_in")],
      outputs: vec![PortDef::exec("exec_out")],
    }
  }

  async fn execute(&self, _ctx: &mut dyn NodeContext) -> NodeOutcome {
    NodeOutcome::failure(NodeError::new(ErrorKind::NodeExecution, self.message.clone()))
  }
}

/// Fails until the owning retry frame's attempt reaches `succeed_at_attempt`,
/// then succeeds (§8 scenario 3). Exists to exercise `RetryNode` semantics;
/// has no business purpose of its own.
pub struct ConditionallyFailingNode {
  succeed_at_attempt: u32,
}

impl ConditionallyFailingNode {
  fn from_config(config: &HashMap<String, Value>) -> Result<Self, NodeError> {
    Ok(Self {
      succeed_at_attempt: config
        .get("succeed_at_attempt")
        .and_then(Value::as_u64)
        .unwrap_or(1) as u32,
    })
  }
}

#[async_trait]
impl NodeInstance for ConditionallyFailingNode {
  fn define_ports(&self) -> PortSchema {
    PortSchema {
      inputs: vec![PortDef::exec("exec_in")],
      outputs: vec![PortDef::exec("exec_out")],
    }
  }

  async fn execute(&self, ctx: &mut dyn NodeContext) -> NodeOutcome {
    let attempt = ctx.retry_attempt().unwrap_or(1);
    if attempt < self.succeed_at_attempt {
      NodeOutcome::failure(NodeError::new(
        ErrorKind::NodeExecution,
        format!("attempt {attempt} < required {}", self.succeed_at_attempt),
      ))
    } else {
      NodeOutcome::success("exec_out")
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::context::CredentialRequest;

  struct FakeContext {
    inputs: HashMap<String, Value>,
    variables: HashMap<String, Value>,
    retry_attempt: Option<u32>,
  }

  #[async_trait]
  impl NodeContext for FakeContext {
    fn node_id(&self) -> &str {
      "n1"
    }

    fn get_input(&self, port: &str) -> Option<Value> {
      self.inputs.get(port).cloned()
    }

    fn get_variable(&self, name: &str) -> Option<Value> {
      self.variables.get(name).cloned()
    }

    fn set_variable(&mut self, name: &str, value: Value) {
      self.variables.insert(name.to_string(), value);
    }

    async fn resolve_credential(&mut self, _request: CredentialRequest) -> Result<Value, NodeError> {
      unimplemented!("not exercised by builtin node tests")
    }

    fn is_cancelled(&self) -> bool {
      false
    }

    fn retry_attempt(&self) -> Option<u32> {
      self.retry_attempt
    }
  }

  fn ctx() -> FakeContext {
    FakeContext {
      inputs: HashMap::new(),
      variables: HashMap::new(),
      retry_attempt: None,
    }
  }

  #[tokio::test]
  async fn set_variable_writes_literal_config_value() {
    let mut config = HashMap::new();
    config.insert("name".to_string(), Value::from("x"));
    config.insert("value".to_string(), Value::from(10));
    let node = SetVariableNode::from_config(&config).unwrap();

    let mut c = ctx();
    node.execute(&mut c).await;
    assert_eq!(c.variables.get("x"), Some(&Value::from(10)));
  }

  #[tokio::test]
  async fn increment_adds_to_existing_variable() {
    let mut config = HashMap::new();
    config.insert("name".to_string(), Value::from("x"));
    config.insert("by".to_string(), Value::from(5));
    let node = IncrementNode::from_config(&config).unwrap();

    let mut c = ctx();
    c.variables.insert("x".to_string(), Value::from(10));
    node.execute(&mut c).await;
    assert_eq!(c.variables.get("x").and_then(Value::as_f64), Some(15.0));
  }

  #[tokio::test]
  async fn conditionally_failing_node_succeeds_at_target_attempt() {
    let mut config = HashMap::new();
    config.insert("succeed_at_attempt".to_string(), Value::from(3));
    let node = ConditionallyFailingNode::from_config(&config).unwrap();

    let mut c = ctx();
    c.retry_attempt = Some(2);
    assert!(matches!(node.execute(&mut c).await, NodeOutcome::Failure { .. }));

    c.retry_attempt = Some(3);
    assert!(matches!(node.execute(&mut c).await, NodeOutcome::Success { .. }));
  }
}
