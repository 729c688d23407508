use casare_node::ErrorKind;

/// An active `TryNode` scope (§4.1.2). Pushed when the node is entered via
/// its `exec_in` port, popped when the body finishes — either by the
/// workflow's own `exec_try_done` back-edge (no error) or by the engine's
/// synthetic re-entry after capturing a failure.
///
/// Nesting is a plain stack: the innermost active `Try` is always
/// `try_stack.last()`, which gives "innermost try catches first" (P4) for
/// free from push/pop discipline.
#[derive(Debug, Clone)]
pub struct TryFrame {
  pub node_id: String,
  pub captured: Option<CapturedError>,
}

#[derive(Debug, Clone)]
pub struct CapturedError {
  pub error_message: String,
  pub error_kind: ErrorKind,
}

/// An active `RetryNode` scope (§4.1.3). Unlike `TryFrame`, re-entry into
/// the body never needs to pass back through the `RetryNode` itself — the
/// engine already knows the body's entry points (the `exec_retry_body`
/// successors) and re-dispatches them directly after the backoff sleep.
#[derive(Debug, Clone)]
pub struct RetryFrame {
  pub node_id: String,
  pub attempt: u32,
  pub max_attempts: u32,
  pub initial_delay_ms: u64,
  pub backoff_factor: f64,
  pub max_delay_ms: u64,
}

impl RetryFrame {
  /// `min(initial_delay * backoff_factor^(attempt-1), max_delay)` (§4.1.3).
  pub fn backoff_delay_ms(&self) -> u64 {
    let scaled = self.initial_delay_ms as f64 * self.backoff_factor.powi(self.attempt as i32 - 1);
    (scaled.round() as u64).min(self.max_delay_ms)
  }

  pub fn exhausted(&self) -> bool {
    self.attempt > self.max_attempts
  }
}

/// An active `LoopNode`/`ForEachNode` scope (§9 Design Notes: loop nodes are
/// the only other permitted back-edge targets besides `Retry`). The spec
/// leaves the operational contract of these two node kinds unspecified
/// beyond "permitted back-edge target"; the iteration model here — a
/// bounded counter plus, for `ForEach`, a materialized item list — is this
/// implementation's own choice, recorded in DESIGN.md.
#[derive(Debug, Clone)]
pub struct LoopFrame {
  pub node_id: String,
  pub is_for_each: bool,
  pub index: u64,
  pub max_iterations: u64,
  pub items: Vec<serde_json::Value>,
}

impl LoopFrame {
  pub fn current_item(&self) -> Option<&serde_json::Value> {
    self.items.get(self.index as usize)
  }

  pub fn has_more(&self) -> bool {
    if self.is_for_each {
      (self.index as usize) < self.items.len()
    } else {
      self.index < self.max_iterations
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn backoff_delay_grows_geometrically_and_caps() {
    let mut frame = RetryFrame {
      node_id: "r1".into(),
      attempt: 1,
      max_attempts: 5,
      initial_delay_ms: 100,
      backoff_factor: 2.0,
      max_delay_ms: 1000,
    };
    assert_eq!(frame.backoff_delay_ms(), 100);
    frame.attempt = 2;
    assert_eq!(frame.backoff_delay_ms(), 200);
    frame.attempt = 4;
    assert_eq!(frame.backoff_delay_ms(), 800);
    frame.attempt = 10;
    assert_eq!(frame.backoff_delay_ms(), 1000);
  }

  #[test]
  fn exhausted_once_attempt_exceeds_max() {
    let frame = RetryFrame {
      node_id: "r1".into(),
      attempt: 6,
      max_attempts: 5,
      initial_delay_ms: 10,
      backoff_factor: 1.0,
      max_delay_ms: 10,
    };
    assert!(frame.exhausted());
  }

  #[test]
  fn for_each_frame_has_more_tracks_item_list() {
    let frame = LoopFrame {
      node_id: "fe1".into(),
      is_for_each: true,
      index: 2,
      max_iterations: 0,
      items: vec![serde_json::json!(1), serde_json::json!(2), serde_json::json!(3)],
    };
    assert!(frame.has_more());
    assert_eq!(frame.current_item(), Some(&serde_json::json!(3)));
  }
}
