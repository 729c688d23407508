use std::collections::HashMap;
use std::sync::Mutex;

/// Per-node-type execution metrics: count, p50/p95 latency, success ratio
/// (§4.1.1, §12 supplemented from the original's `node_executor.py`
/// `get_metrics().record_node_*` calls). In-process only — exporting these
/// anywhere is explicitly out of scope (§1).
#[derive(Debug, Default)]
struct TypeMetrics {
  success_count: u64,
  failure_count: u64,
  /// Bounded ring of recent durations, newest overwrites oldest, used to
  /// estimate percentiles without unbounded memory growth.
  durations_ms: Vec<u64>,
  next_slot: usize,
}

const RING_CAPACITY: usize = 512;

impl TypeMetrics {
  fn record(&mut self, duration_ms: u64, success: bool) {
    if success {
      self.success_count += 1;
    } else {
      self.failure_count += 1;
    }
    if self.durations_ms.len() < RING_CAPACITY {
      self.durations_ms.push(duration_ms);
    } else {
      self.durations_ms[self.next_slot] = duration_ms;
      self.next_slot = (self.next_slot + 1) % RING_CAPACITY;
    }
  }

  fn percentile(&self, pct: f64) -> Option<u64> {
    if self.durations_ms.is_empty() {
      return None;
    }
    let mut sorted = self.durations_ms.clone();
    sorted.sort_unstable();
    let rank = ((sorted.len() - 1) as f64 * pct).round() as usize;
    sorted.get(rank).copied()
  }

  fn success_ratio(&self) -> f64 {
    let total = self.success_count + self.failure_count;
    if total == 0 {
      return 1.0;
    }
    self.success_count as f64 / total as f64
  }
}

/// A point-in-time snapshot of one node type's metrics, returned by
/// `NodeMetrics::snapshot` for reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
  pub count: u64,
  pub p50_ms: Option<u64>,
  pub p95_ms: Option<u64>,
  pub success_ratio: f64,
}

/// Registry of per-node-type metrics, keyed by `node_type` (the plugin
/// key, not the node-id — metrics aggregate across all instances of a
/// type). Shared across the whole engine run via `&` reference; internal
/// mutability keeps the FSM's hot path lock-free of any outer
/// synchronization concern.
#[derive(Default)]
pub struct NodeMetrics {
  by_type: Mutex<HashMap<String, TypeMetrics>>,
}

impl NodeMetrics {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn record(&self, node_type: &str, duration_ms: u64, success: bool) {
    let mut guard = self.by_type.lock().unwrap();
    guard.entry(node_type.to_string()).or_default().record(duration_ms, success);
  }

  pub fn snapshot(&self, node_type: &str) -> Option<MetricsSnapshot> {
    let guard = self.by_type.lock().unwrap();
    guard.get(node_type).map(|m| MetricsSnapshot {
      count: m.success_count + m.failure_count,
      p50_ms: m.percentile(0.50),
      p95_ms: m.percentile(0.95),
      success_ratio: m.success_ratio(),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tracks_count_and_success_ratio() {
    let metrics = NodeMetrics::new();
    metrics.record("http", 10, true);
    metrics.record("http", 20, true);
    metrics.record("http", 30, false);

    let snapshot = metrics.snapshot("http").unwrap();
    assert_eq!(snapshot.count, 3);
    assert!((snapshot.success_ratio - (2.0 / 3.0)).abs() < 1e-9);
  }

  #[test]
  fn percentiles_reflect_recorded_durations() {
    let metrics = NodeMetrics::new();
    for ms in [10, 20, 30, 40, 100] {
      metrics.record("slow", ms, true);
    }
    let snapshot = metrics.snapshot("slow").unwrap();
    assert_eq!(snapshot.p50_ms, Some(30));
    assert_eq!(snapshot.p95_ms, Some(100));
  }

  #[test]
  fn unknown_type_has_no_snapshot() {
    let metrics = NodeMetrics::new();
    assert!(metrics.snapshot("ghost").is_none());
  }
}
