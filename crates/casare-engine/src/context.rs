use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use casare_credentials::CredentialResolver;
use casare_node::{CredentialRequest, ErrorKind, NodeContext, NodeError};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::event::{Event, EventBus};
use crate::frames::{CapturedError, LoopFrame, RetryFrame, TryFrame};
use crate::resource::ManagedResource;

/// Per-job execution state, live in the agent process for the duration of
/// one job (§3 ExecutionContext). Owns the variables map, resource handles,
/// control-flow stacks, the event sink, and the credential resolver handle.
/// Created by the engine at job start; `cleanup` releases every resource on
/// every exit path.
pub struct ExecutionContext {
  pub job_id: String,
  variables: HashMap<String, Value>,
  resources: HashMap<String, Box<dyn ManagedResource>>,
  /// Cached output port values per node, keyed by node-id then port. Read
  /// by downstream nodes' data-edge resolution (P2) and by
  /// `ForEachNode`/loop item binding.
  node_outputs: HashMap<String, HashMap<String, Value>>,
  current_node_id: String,
  current_inputs: HashMap<String, Value>,
  pub try_stack: Vec<TryFrame>,
  pub retry_stack: Vec<RetryFrame>,
  pub loop_stack: Vec<LoopFrame>,
  cancel: CancellationToken,
  events: EventBus,
  credentials: CredentialResolver<Arc<dyn casare_credentials::CredentialBackend>>,
  /// Tally of nodes `Engine::run` has finished a step for (§4.1). Lives on
  /// `self`, not as a local in `run`, so a caller racing the whole run
  /// against a wall-clock timeout (see
  /// `casare-agent::supervisor::execute_job`) can still read how far it
  /// got after the driving future is dropped mid-step.
  executed_node_count: AtomicU64,
}

impl ExecutionContext {
  pub fn new(
    job_id: String,
    variables: HashMap<String, Value>,
    cancel: CancellationToken,
    events: EventBus,
    credential_backend: Arc<dyn casare_credentials::CredentialBackend>,
  ) -> Self {
    Self {
      job_id,
      variables,
      resources: HashMap::new(),
      node_outputs: HashMap::new(),
      current_node_id: String::new(),
      current_inputs: HashMap::new(),
      try_stack: Vec::new(),
      retry_stack: Vec::new(),
      loop_stack: Vec::new(),
      cancel,
      events,
      credentials: CredentialResolver::new(credential_backend),
      executed_node_count: AtomicU64::new(0),
    }
  }

  /// Record that one more node finished a step (§4.1). Called by the
  /// stepper rather than incremented locally, so the count survives a
  /// dropped `Engine::run` future (§4.1.5 workflow timeout).
  pub fn record_node_executed(&self) {
    self.executed_node_count.fetch_add(1, Ordering::Relaxed);
  }

  pub fn executed_node_count(&self) -> usize {
    self.executed_node_count.load(Ordering::Relaxed) as usize
  }

  pub fn cancel_token(&self) -> CancellationToken {
    self.cancel.clone()
  }

  pub fn cancel(&self) {
    self.cancel.cancel();
  }

  pub fn events(&self) -> &EventBus {
    &self.events
  }

  pub fn variables_snapshot(&self) -> HashMap<String, Value> {
    self.variables.clone()
  }

  /// Called by the stepper before invoking a node, so `NodeContext::get_input`
  /// and `node_id` read the right node's state (§4.1 step 4).
  pub fn enter_node(&mut self, node_id: &str, inputs: HashMap<String, Value>) {
    self.current_node_id = node_id.to_string();
    self.current_inputs = inputs;
  }

  pub fn cache_outputs(&mut self, node_id: &str, outputs: HashMap<String, Value>) {
    self.node_outputs.entry(node_id.to_string()).or_default().extend(outputs);
  }

  pub fn cached_output(&self, node_id: &str, port: &str) -> Option<Value> {
    self.node_outputs.get(node_id).and_then(|outputs| outputs.get(port)).cloned()
  }

  pub fn register_resource(&mut self, name: impl Into<String>, resource: Box<dyn ManagedResource>) {
    self.resources.insert(name.into(), resource);
  }

  /// Release every registered resource. Best-effort: a failing resource is
  /// logged and does not stop the rest from closing, and does not change
  /// the workflow's terminal status (§4.1.5).
  pub async fn cleanup(&mut self) {
    for (name, resource) in self.resources.iter_mut() {
      if let Err(err) = resource.close().await {
        tracing::warn!(resource = %name, error = %err, "resource cleanup failed");
      }
    }
    self.resources.clear();
  }
}

#[async_trait]
impl NodeContext for ExecutionContext {
  fn node_id(&self) -> &str {
    &self.current_node_id
  }

  fn get_input(&self, port: &str) -> Option<Value> {
    self.current_inputs.get(port).cloned()
  }

  fn get_variable(&self, name: &str) -> Option<Value> {
    self.variables.get(name).cloned()
  }

  fn set_variable(&mut self, name: &str, value: Value) {
    self.variables.insert(name.to_string(), value.clone());
    self.events.publish(Event::VariableSet {
      job_id: self.job_id.clone(),
      name: name.to_string(),
      value,
    });
  }

  async fn resolve_credential(&mut self, request: CredentialRequest) -> Result<Value, NodeError> {
    let context_var_value = request.context_var.as_ref().and_then(|name| self.variables.get(name).cloned());
    self.credentials.resolve(&request, context_var_value).await
  }

  fn is_cancelled(&self) -> bool {
    self.cancel.is_cancelled()
  }

  fn retry_attempt(&self) -> Option<u32> {
    self.retry_stack.last().map(|frame| frame.attempt)
  }
}

/// Turn a captured node failure into the shape stashed on a `TryFrame`
/// (§4.1.2 Error capture).
pub fn capture_from(kind: ErrorKind, message: impl Into<String>) -> CapturedError {
  CapturedError {
    error_message: message.into(),
    error_kind: kind,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::resource::FakeResource;
  use casare_credentials::InMemoryCredentialBackend;

  fn ctx() -> ExecutionContext {
    ExecutionContext::new(
      "job-1".into(),
      HashMap::new(),
      CancellationToken::new(),
      EventBus::new(8),
      Arc::new(InMemoryCredentialBackend::new()),
    )
  }

  #[test]
  fn set_then_get_variable_round_trips() {
    let mut context = ctx();
    context.set_variable("x", Value::from(10));
    assert_eq!(context.get_variable("x"), Some(Value::from(10)));
  }

  #[test]
  fn enter_node_scopes_input_lookup() {
    let mut context = ctx();
    let mut inputs = HashMap::new();
    inputs.insert("value".to_string(), Value::from("hello"));
    context.enter_node("n1", inputs);
    assert_eq!(context.node_id(), "n1");
    assert_eq!(context.get_input("value"), Some(Value::from("hello")));
    assert_eq!(context.get_input("missing"), None);
  }

  #[test]
  fn cached_outputs_are_keyed_per_node() {
    let mut context = ctx();
    let mut outputs = HashMap::new();
    outputs.insert("result".to_string(), Value::from(42));
    context.cache_outputs("n1", outputs);
    assert_eq!(context.cached_output("n1", "result"), Some(Value::from(42)));
    assert_eq!(context.cached_output("n2", "result"), None);
  }

  #[tokio::test]
  async fn cleanup_closes_every_resource_even_if_one_fails() {
    let mut context = ctx();
    context.register_resource("browser", Box::new(FakeResource { closed: false, fail: true }));
    context.register_resource("db", Box::new(FakeResource { closed: false, fail: false }));
    context.cleanup().await;
  }

  #[tokio::test]
  async fn credential_not_found_surfaces_the_right_error_kind() {
    let mut context = ctx();
    let err = context.resolve_credential(CredentialRequest::default()).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::CredentialNotFound);
  }
}
