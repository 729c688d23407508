use std::sync::{Arc, Mutex};

use casare_fleet::{AdmissionPolicy, OverrideTable, RobotStore};
use casare_queue::JobStore;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// A frame broadcast over `/events` (§6 Event types): `{type, ts, job_id,
/// node_id?, payload}`. Synthesized by `crate::poller` from job-row state
/// transitions it observes — the full node-level trace lives in the
/// agent's own `casare_engine::EventBus` and is not forwarded here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsFrame {
  #[serde(rename = "type")]
  pub frame_type: String,
  pub ts: chrono::DateTime<chrono::Utc>,
  pub job_id: uuid::Uuid,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub node_id: Option<String>,
  pub payload: serde_json::Value,
}

/// Shared handles every route handler needs. Cloning is cheap — everything
/// behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
  pub job_store: Arc<dyn JobStore>,
  pub robot_store: Arc<dyn RobotStore>,
  pub overrides: Arc<Mutex<OverrideTable>>,
  pub admission: Arc<dyn AdmissionPolicy>,
  pub events: broadcast::Sender<WsFrame>,
  pub api_secret: Option<String>,
}

impl AppState {
  pub fn new(
    job_store: Arc<dyn JobStore>,
    robot_store: Arc<dyn RobotStore>,
    admission: Arc<dyn AdmissionPolicy>,
    api_secret: Option<String>,
  ) -> Self {
    let (events, _) = broadcast::channel(1024);
    Self { job_store, robot_store, overrides: Arc::new(Mutex::new(OverrideTable::new())), admission, events, api_secret }
  }
}
