use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use casare_node::{ErrorKind, NodeContext, NodeError, NodeOutcome, NodeRegistry};
use casare_workflow::{Node, NodeKind, Workflow};
use serde_json::Value;

use crate::context::ExecutionContext;
use crate::control::PauseController;
use crate::error::{ErrorRecord, TerminalStatus};
use crate::event::Event;
use crate::frames::{LoopFrame, RetryFrame, TryFrame};
use crate::metrics::NodeMetrics;

/// What `Engine::run` hands back once a workflow reaches a terminal status
/// (§4.1). The variables snapshot and executed/total counts are read by the
/// caller (`casare-agent`) to populate the job row's result and progress.
pub struct ExecutionSummary {
  pub status: TerminalStatus,
  pub error: Option<ErrorRecord>,
  pub variables: HashMap<String, Value>,
  pub executed_count: usize,
  pub total_reachable: usize,
}

/// A unit of work on the stepper's queue: a node-id to visit next. Re-entry
/// (retry body restarts, the owning `TryNode`'s synthetic catch visit) is
/// modeled as pushing the same node-id again, never as a distinct variant.
type WorkItem = String;

/// What `handle_node_failure` decided to do with a node's error, returned
/// up to the caller so it can publish the right event/metric pair (§4.1.2,
/// §4.1.3, §7). Emitting those is the caller's job, not
/// `handle_node_failure`'s, because the right event depends on which of
/// the three outcomes fired.
enum FailureRoute {
  /// An active `TryNode` stashed the error on its frame (§4.1.2): the
  /// failing node is "SUCCESS-with-captured-error", not failed — no
  /// `NODE_ERROR`, no failure metric.
  CapturedByTry,
  /// An active retry frame observed the failure and will either sleep and
  /// re-enter the body or exhaust out to `exec_failed` (§4.1.3). The node
  /// itself still failed this attempt.
  HandledByRetry,
  /// Nothing captured it; it propagates as the workflow's terminal error.
  Terminal(TerminalStatus, Option<ErrorRecord>),
}

/// The graph interpreter (§4.1). One instance executes exactly one
/// workflow run; create a fresh `Engine` per job.
pub struct Engine<'a> {
  workflow: &'a Workflow,
  registry: &'a NodeRegistry,
  pause: &'a PauseController,
  metrics: &'a NodeMetrics,
}

impl<'a> Engine<'a> {
  pub fn new(
    workflow: &'a Workflow,
    registry: &'a NodeRegistry,
    pause: &'a PauseController,
    metrics: &'a NodeMetrics,
  ) -> Self {
    Self {
      workflow,
      registry,
      pause,
      metrics,
    }
  }

  /// Run the workflow to completion against `ctx` (§4.1 steps 1-9). The
  /// caller is responsible for wrapping this in the whole-workflow wall
  /// clock timeout (`settings.timeout_seconds`) and for running
  /// `ctx.cleanup()` afterward, unconditionally, in its own budget (§4.1.5).
  pub async fn run(&self, ctx: &mut ExecutionContext, job_id: &str) -> ExecutionSummary {
    let total_reachable = self.workflow.reachable_node_count();
    ctx.events().publish(Event::WorkflowStarted {
      job_id: job_id.to_string(),
      workflow_id: self.workflow.workflow_id.clone(),
    });

    let mut queue: VecDeque<WorkItem> = VecDeque::new();
    queue.push_back(self.workflow.start_node.clone());

    let mut terminal: Option<(TerminalStatus, Option<ErrorRecord>)> = None;

    while let Some(node_id) = queue.pop_front() {
      self.pause.wait_until_running().await;
      if self.pause.is_paused() {
        // wait_until_running only returns once resumed; this branch exists
        // defensively and should be unreachable.
      }

      if ctx.is_cancelled() {
        terminal = Some((TerminalStatus::Cancelled, None));
        break;
      }

      let Some(node) = self.workflow.node(&node_id).cloned() else {
        terminal = Some((
          TerminalStatus::Error,
          Some(ErrorRecord::new(ErrorKind::Internal, format!("node '{node_id}' missing from workflow")).at_node(&node_id)),
        ));
        break;
      };

      match node.kind {
        NodeKind::Start => {
          ctx.record_node_executed();
          ctx.events().publish(Event::NodeStarted {
            job_id: ctx.job_id.clone(),
            node_id: node_id.clone(),
          });
          ctx.events().publish(Event::NodeCompleted {
            job_id: ctx.job_id.clone(),
            node_id: node_id.clone(),
            duration_ms: 0,
          });
          for target in self.workflow.graph().exec_successors(&node_id, "exec_out") {
            queue.push_back(target.0.clone());
          }
        }
        NodeKind::Try => {
          self.step_try(ctx, &node_id, &mut queue);
        }
        NodeKind::Retry => {
          self.step_retry_enter(ctx, &node_id, &node, &mut queue);
        }
        NodeKind::RetrySuccess => {
          self.step_retry_success(ctx, &mut queue);
        }
        NodeKind::RetryFail => {
          self.step_retry_fail(ctx, &mut queue).await;
        }
        NodeKind::Loop | NodeKind::ForEach => {
          self.step_loop(ctx, &node_id, &node, &mut queue);
        }
        NodeKind::Component => {
          ctx.record_node_executed();
          if let Some(stop) = self.step_component(ctx, &node, &mut queue).await {
            terminal = Some(stop);
            if self.workflow.settings.stop_on_error {
              break;
            }
          }
        }
      }

      if ctx.is_cancelled() && terminal.is_none() {
        terminal = Some((TerminalStatus::Cancelled, None));
        break;
      }
    }

    let (status, error) = terminal.unwrap_or((TerminalStatus::Success, None));

    match status {
      TerminalStatus::Success => {
        ctx.events().publish(Event::WorkflowCompleted { job_id: job_id.to_string() });
      }
      TerminalStatus::Cancelled => {
        ctx.events().publish(Event::WorkflowCancelled { job_id: job_id.to_string() });
      }
      TerminalStatus::Error | TerminalStatus::TimedOut => {
        if let Some(err) = &error {
          ctx.events().publish(Event::WorkflowFailed {
            job_id: job_id.to_string(),
            error: err.clone(),
          });
        }
      }
    }

    ExecutionSummary {
      status,
      error,
      variables: ctx.variables_snapshot(),
      executed_count: ctx.executed_node_count(),
      total_reachable,
    }
  }

  /// Component node FSM (§4.1.1): instantiate, bypass-check, run with
  /// timeout, cache outputs, route successors. Returns `Some(terminal)` if
  /// the node's failure was not captured by an active try or retry frame.
  async fn step_component(
    &self,
    ctx: &mut ExecutionContext,
    node: &Node,
    queue: &mut VecDeque<WorkItem>,
  ) -> Option<(TerminalStatus, Option<ErrorRecord>)> {
    let instance = match self.registry.create(&node.node_type, &node.config) {
      Ok(instance) => instance,
      Err(err) => {
        return match self.handle_node_failure(ctx, node, queue, err).await {
          FailureRoute::Terminal(status, error) => Some((status, error)),
          FailureRoute::CapturedByTry | FailureRoute::HandledByRetry => None,
        }
      }
    };

    let schema = instance.define_ports();
    let mut inputs = HashMap::new();
    for port in &schema.inputs {
      if port.exec {
        continue;
      }
      let value = self
        .workflow
        .graph()
        .data_source(&node.node_id, &port.name)
        .and_then(|(src_node, src_port)| ctx.cached_output(src_node, src_port))
        .or_else(|| node.input_port_bindings.get(&port.name).cloned());
      if let Some(value) = value {
        inputs.insert(port.name.clone(), value);
      }
    }

    if node.is_disabled() {
      self.bypass(ctx, node, &schema, &inputs, queue);
      return None;
    }

    ctx.enter_node(&node.node_id, inputs);

    if let Err(err) = instance.validate() {
      return match self.handle_node_failure(ctx, node, queue, err).await {
        FailureRoute::Terminal(status, error) => Some((status, error)),
        FailureRoute::CapturedByTry | FailureRoute::HandledByRetry => None,
      };
    }

    ctx.events().publish(Event::NodeStarted {
      job_id: ctx.job_id.clone(),
      node_id: node.node_id.clone(),
    });
    let started = Instant::now();

    let outcome = tokio::time::timeout(node.timeout(), instance.execute(ctx)).await;
    let duration_ms = started.elapsed().as_millis() as u64;

    match outcome {
      Ok(NodeOutcome::Success { outputs, exec_out }) => {
        ctx.cache_outputs(&node.node_id, outputs);
        self.metrics.record(&node.node_type, duration_ms, true);
        ctx.events().publish(Event::NodeCompleted {
          job_id: ctx.job_id.clone(),
          node_id: node.node_id.clone(),
          duration_ms,
        });
        for port in &exec_out {
          for target in self.workflow.graph().exec_successors(&node.node_id, port) {
            queue.push_back(target.0.clone());
          }
        }
        None
      }
      Ok(NodeOutcome::Failure { error }) => {
        let kind = error.kind;
        let message = error.message.clone();
        let route = self.handle_node_failure(ctx, node, queue, error).await;
        self.finish_failed_node(ctx, node, duration_ms, kind, message, route)
      }
      Err(_elapsed) => {
        let error = NodeError::new(ErrorKind::Timeout, format!("node '{}' exceeded its timeout", node.node_id));
        let kind = error.kind;
        let message = error.message.clone();
        let route = self.handle_node_failure(ctx, node, queue, error).await;
        self.finish_failed_node(ctx, node, duration_ms, kind, message, route)
      }
    }
  }

  /// Publishes the event/metric pair for a node that reached
  /// `NodeOutcome::Failure` or timed out, once `handle_node_failure` has
  /// already decided whether an active try captured it (§4.1.1, §4.1.2).
  /// A `TryNode` capture is "SUCCESS-with-captured-error" — `NODE_COMPLETED`
  /// and a success metric, never `NODE_ERROR` (§8 scenario 2). Everything
  /// else (retry-handled or terminal) is a real per-attempt failure and
  /// gets `NODE_ERROR` plus a failure metric; only the terminal case also
  /// propagates out of `step_component`.
  fn finish_failed_node(
    &self,
    ctx: &mut ExecutionContext,
    node: &Node,
    duration_ms: u64,
    kind: ErrorKind,
    message: String,
    route: FailureRoute,
  ) -> Option<(TerminalStatus, Option<ErrorRecord>)> {
    if matches!(route, FailureRoute::CapturedByTry) {
      self.metrics.record(&node.node_type, duration_ms, true);
      ctx.events().publish(Event::NodeCompleted {
        job_id: ctx.job_id.clone(),
        node_id: node.node_id.clone(),
        duration_ms,
      });
      return None;
    }

    self.metrics.record(&node.node_type, duration_ms, false);
    ctx.events().publish(Event::NodeError {
      job_id: ctx.job_id.clone(),
      node_id: node.node_id.clone(),
      duration_ms,
      error: ErrorRecord::new(kind, message).at_node(&node.node_id),
    });

    match route {
      FailureRoute::Terminal(status, error) => Some((status, error)),
      FailureRoute::CapturedByTry | FailureRoute::HandledByRetry => None,
    }
  }

  /// Bypass routing (§4.1 step 5, P3): copy connected inputs straight to
  /// matching outputs without running plugin logic, then continue along
  /// the node's `exec_out` successors as if it had run normally.
  fn bypass(
    &self,
    ctx: &mut ExecutionContext,
    node: &Node,
    schema: &casare_node::PortSchema,
    inputs: &HashMap<String, Value>,
    queue: &mut VecDeque<WorkItem>,
  ) {
    let mut outputs = HashMap::new();
    for port in &schema.inputs {
      if port.exec {
        continue;
      }
      let Some(value) = inputs.get(&port.name) else { continue };
      if schema.has_output(&port.name) {
        outputs.insert(port.name.clone(), value.clone());
      } else if let Some(stripped) = port.name.strip_suffix("_in") {
        let candidate = format!("{stripped}_out");
        if schema.has_output(&candidate) {
          outputs.insert(candidate, value.clone());
        }
      }
    }
    ctx.cache_outputs(&node.node_id, outputs);
    ctx.events().publish(Event::NodeBypassed {
      job_id: ctx.job_id.clone(),
      node_id: node.node_id.clone(),
    });
    for target in self.workflow.graph().exec_successors(&node.node_id, "exec_out") {
      queue.push_back(target.0.clone());
    }
  }

  /// Propagation policy (§4.1.5, §7): consult the try-stack, then the
  /// retry-stack, then surface as a workflow-terminal error. Does not
  /// publish any event itself — see `finish_failed_node`, which the caller
  /// uses once it knows which of the three outcomes fired.
  async fn handle_node_failure(
    &self,
    ctx: &mut ExecutionContext,
    node: &Node,
    queue: &mut VecDeque<WorkItem>,
    error: NodeError,
  ) -> FailureRoute {
    if let Some(frame) = ctx.try_stack.last_mut() {
      frame.captured = Some(crate::frames::CapturedError {
        error_message: error.message.clone(),
        error_kind: error.kind,
      });
      let try_node_id = frame.node_id.clone();
      queue.push_back(try_node_id);
      return FailureRoute::CapturedByTry;
    }

    if let Some(frame) = ctx.retry_stack.last().cloned() {
      self.advance_retry_frame(ctx, frame, queue).await;
      return FailureRoute::HandledByRetry;
    }

    FailureRoute::Terminal(TerminalStatus::Error, Some(ErrorRecord::new(error.kind, error.message).at_node(&node.node_id)))
  }

  /// `TryNode` entry/re-entry (§4.1.2). First visit pushes a frame and
  /// routes into the body. The synthetic second visit (engine-queued by
  /// `handle_node_failure`) pops the frame and routes to `exec_catch`,
  /// with `error_message`/`error_type` bound as this node's cached outputs
  /// so the catch branch's data edges can read them (P4).
  fn step_try(&self, ctx: &mut ExecutionContext, node_id: &str, queue: &mut VecDeque<WorkItem>) {
    if let Some(pos) = ctx.try_stack.iter().rposition(|f| f.node_id == node_id) {
      let frame = ctx.try_stack.remove(pos);
      if let Some(captured) = frame.captured {
        let mut outputs = HashMap::new();
        outputs.insert("error_message".to_string(), Value::String(captured.error_message));
        outputs.insert(
          "error_type".to_string(),
          serde_json::to_value(captured.error_kind).unwrap_or(Value::Null),
        );
        ctx.cache_outputs(node_id, outputs);
        for target in self.workflow.graph().exec_successors(node_id, "exec_catch") {
          queue.push_back(target.0.clone());
        }
      } else {
        for target in self.workflow.graph().exec_successors(node_id, "exec_success") {
          queue.push_back(target.0.clone());
        }
      }
      return;
    }

    ctx.try_stack.push(TryFrame {
      node_id: node_id.to_string(),
      captured: None,
    });
    for target in self.workflow.graph().exec_successors(node_id, "exec_try_body") {
      queue.push_back(target.0.clone());
    }
  }

  fn step_retry_enter(&self, ctx: &mut ExecutionContext, node_id: &str, node: &Node, queue: &mut VecDeque<WorkItem>) {
    let initial_delay_ms = node.config.get("initial_delay_ms").and_then(Value::as_u64).unwrap_or(0);
    let backoff_factor = node.config.get("backoff_factor").and_then(Value::as_f64).unwrap_or(2.0);
    let max_delay_ms = node.config.get("max_delay_ms").and_then(Value::as_u64).unwrap_or(u64::MAX);
    let max_attempts = node.config.get("max_attempts").and_then(Value::as_u64).unwrap_or(1) as u32;

    ctx.retry_stack.push(RetryFrame {
      node_id: node_id.to_string(),
      attempt: 1,
      max_attempts,
      initial_delay_ms,
      backoff_factor,
      max_delay_ms,
    });
    for target in self.workflow.graph().exec_successors(node_id, "exec_retry_body") {
      queue.push_back(target.0.clone());
    }
  }

  /// `RetrySuccessNode` (§4.1.3): unwinds the innermost retry frame and
  /// routes to that `RetryNode`'s `exec_success`.
  fn step_retry_success(&self, ctx: &mut ExecutionContext, queue: &mut VecDeque<WorkItem>) {
    let Some(frame) = ctx.retry_stack.pop() else { return };
    for target in self.workflow.graph().exec_successors(&frame.node_id, "exec_success") {
      queue.push_back(target.0.clone());
    }
  }

  /// `RetryFailNode` (§4.1.3): an explicit in-body signal that this attempt
  /// failed, handled identically to an uncaptured node error reaching an
  /// active retry frame.
  async fn step_retry_fail(&self, ctx: &mut ExecutionContext, queue: &mut VecDeque<WorkItem>) {
    let Some(frame) = ctx.retry_stack.last().cloned() else { return };
    self.advance_retry_frame(ctx, frame, queue).await;
  }

  /// Increment the given retry frame's attempt counter and either fail the
  /// scope out or sleep the backoff and re-enter the body (§4.1.3, P5).
  /// Interruptible by cancellation per §5 — the sleep is awaited inline,
  /// keeping the engine's single-threaded cooperative model: the next work
  /// item is only enqueued once the sleep (or cancellation) resolves.
  async fn advance_retry_frame(&self, ctx: &mut ExecutionContext, mut frame: RetryFrame, queue: &mut VecDeque<WorkItem>) {
    frame.attempt += 1;
    if frame.exhausted() {
      ctx.retry_stack.retain(|f| f.node_id != frame.node_id);
      for target in self.workflow.graph().exec_successors(&frame.node_id, "exec_failed") {
        queue.push_back(target.0.clone());
      }
      return;
    }

    if let Some(existing) = ctx.retry_stack.iter_mut().find(|f| f.node_id == frame.node_id) {
      existing.attempt = frame.attempt;
    }

    let delay_ms = frame.backoff_delay_ms();
    let cancel = ctx.cancel_token();
    let retry_node_id = frame.node_id.clone();

    tokio::select! {
      _ = tokio::time::sleep(std::time::Duration::from_millis(delay_ms)) => {}
      _ = cancel.cancelled() => {}
    }

    if !ctx.is_cancelled() {
      for target in self.workflow.graph().exec_successors(&retry_node_id, "exec_retry_body") {
        queue.push_back(target.0.clone());
      }
    }
  }

  /// `LoopNode`/`ForEachNode` (§9 Design Notes, §12): a bounded counter
  /// loop, or for `ForEach` an iteration over a materialized item list.
  /// Re-entry happens via the permitted exec back-edge from the body's
  /// last node straight into this same node-id (I4).
  fn step_loop(&self, ctx: &mut ExecutionContext, node_id: &str, node: &Node, queue: &mut VecDeque<WorkItem>) {
    let is_for_each = node.kind == NodeKind::ForEach;

    if let Some(pos) = ctx.loop_stack.iter().position(|f| f.node_id == node_id) {
      let mut frame = ctx.loop_stack[pos].clone();
      if frame.has_more() {
        if let Some(item) = frame.current_item().cloned() {
          let mut outputs = HashMap::new();
          outputs.insert("item".to_string(), item);
          outputs.insert("index".to_string(), Value::from(frame.index));
          ctx.cache_outputs(node_id, outputs);
        }
        frame.index += 1;
        ctx.loop_stack[pos] = frame;
        for target in self.workflow.graph().exec_successors(node_id, "exec_loop_body") {
          queue.push_back(target.0.clone());
        }
      } else {
        ctx.loop_stack.remove(pos);
        for target in self.workflow.graph().exec_successors(node_id, "exec_done") {
          queue.push_back(target.0.clone());
        }
      }
      return;
    }

    let items: Vec<Value> = if is_for_each {
      self
        .workflow
        .graph()
        .data_source(node_id, "items")
        .and_then(|(src_node, src_port)| ctx.cached_output(src_node, src_port))
        .or_else(|| node.config.get("items").cloned())
        .and_then(|v| v.as_array().cloned())
        .unwrap_or_default()
    } else {
      Vec::new()
    };
    let max_iterations = node.config.get("max_iterations").and_then(Value::as_u64).unwrap_or(0);

    let frame = LoopFrame {
      node_id: node_id.to_string(),
      is_for_each,
      index: 0,
      max_iterations,
      items,
    };

    if frame.has_more() {
      ctx.loop_stack.push(frame);
      self.step_loop(ctx, node_id, node, queue);
    } else {
      for target in self.workflow.graph().exec_successors(node_id, "exec_done") {
        queue.push_back(target.0.clone());
      }
    }
  }
}
