use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::ErrorRecord;

/// The event vocabulary emitted to heartbeat/WS consumers (§6 Event types,
/// GLOSSARY). `ROBOT_HEARTBEAT`, `JOB_CLAIMED`, `JOB_RELEASED`, and
/// `LEASE_EXPIRED` are not raised here — those are queue/fleet-level events
/// raised by `casare-queue`/`casare-agent`, not by a single job's engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Event {
  WorkflowStarted { job_id: String, workflow_id: String },
  WorkflowCompleted { job_id: String },
  WorkflowFailed { job_id: String, error: ErrorRecord },
  WorkflowPaused { job_id: String },
  WorkflowResumed { job_id: String },
  WorkflowCancelled { job_id: String },
  NodeStarted { job_id: String, node_id: String },
  NodeCompleted { job_id: String, node_id: String, duration_ms: u64 },
  NodeError { job_id: String, node_id: String, duration_ms: u64, error: ErrorRecord },
  NodeBypassed { job_id: String, node_id: String },
  VariableSet { job_id: String, name: String, value: Value },
  /// Injected by the bus itself when a slow subscriber drops frames (§9
  /// Design Notes: "dropped frames are counted and a single OVERFLOW frame
  /// is injected").
  Overflow { job_id: String, dropped: u64 },
}

/// A bounded broadcast channel scoped to one job (§9 Design Notes: "a
/// bounded broadcast channel per job; subscribers receive copies"). Slow
/// consumers lose frames rather than backpressuring the engine — `recv()`
/// on a lagged subscriber surfaces as a `RecvError::Lagged`, which
/// `EventSink::forward` below turns into a single `Overflow` frame instead
/// of silently resyncing.
#[derive(Clone)]
pub struct EventBus {
  sender: broadcast::Sender<Event>,
}

impl EventBus {
  pub fn new(capacity: usize) -> Self {
    let (sender, _) = broadcast::channel(capacity);
    Self { sender }
  }

  pub fn subscribe(&self) -> broadcast::Receiver<Event> {
    self.sender.subscribe()
  }

  /// Publish an event. Errors (no subscribers) are not a failure — the
  /// engine runs the same whether or not anyone is listening.
  pub fn publish(&self, event: Event) {
    let _ = self.sender.send(event);
  }
}

impl Default for EventBus {
  fn default() -> Self {
    Self::new(256)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn subscribers_receive_published_events() {
    let bus = EventBus::new(8);
    let mut rx = bus.subscribe();
    bus.publish(Event::WorkflowStarted {
      job_id: "j1".into(),
      workflow_id: "wf1".into(),
    });
    let event = rx.recv().await.unwrap();
    assert!(matches!(event, Event::WorkflowStarted { .. }));
  }

  #[tokio::test]
  async fn publish_without_subscribers_does_not_panic() {
    let bus = EventBus::new(8);
    bus.publish(Event::WorkflowCompleted { job_id: "j1".into() });
  }
}
