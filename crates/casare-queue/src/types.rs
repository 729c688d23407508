use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// A job's position in the state machine (§4.2). Terminal states
/// (`Succeeded`, `Failed`, `Cancelled`, `TimedOut`) never transition out (J3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "job_state", rename_all = "snake_case")]
pub enum JobState {
  Queued,
  Claimed,
  Running,
  Paused,
  Succeeded,
  Failed,
  Cancelled,
  TimedOut,
}

impl JobState {
  pub fn is_terminal(self) -> bool {
    matches!(self, JobState::Succeeded | JobState::Failed | JobState::Cancelled | JobState::TimedOut)
  }
}

/// A durable job row (§3 Job). `workflow` carries the inline workflow blob
/// rather than a separate workflow-id reference — the spec permits either;
/// this implementation always stores the resolved definition at submission
/// time so a later edit to a named workflow can't retroactively change a
/// queued job's behavior.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Job {
  pub job_id: Uuid,
  pub workflow: Json<Value>,
  pub inputs: Json<Value>,
  pub priority: i32,
  pub state: JobState,
  pub assigned_robot_id: Option<Uuid>,
  pub lease_expires_at: Option<DateTime<Utc>>,
  pub claimed_at: Option<DateTime<Utc>>,
  pub started_at: Option<DateTime<Utc>>,
  pub finished_at: Option<DateTime<Utc>>,
  pub attempt_count: i32,
  pub max_attempts: i32,
  pub required_capabilities: Vec<String>,
  pub tenant_id: Option<String>,
  pub result: Option<Json<Value>>,
  pub error: Option<Json<Value>>,
  pub created_at: DateTime<Utc>,
}

/// Fields accepted when submitting a new job (§4.6 `POST /jobs` body).
#[derive(Debug, Clone)]
pub struct NewJob {
  pub workflow: Value,
  pub inputs: Value,
  pub priority: i32,
  pub required_capabilities: HashSet<String>,
  pub tenant_id: Option<String>,
  pub max_attempts: i32,
}

impl Default for NewJob {
  fn default() -> Self {
    Self {
      workflow: Value::Null,
      inputs: Value::Object(serde_json::Map::new()),
      priority: 0,
      required_capabilities: HashSet::new(),
      tenant_id: None,
      max_attempts: 1,
    }
  }
}

/// What an agent presents when attempting to claim work (§4.2, §4.4 P8).
#[derive(Debug, Clone)]
pub struct ClaimRequest {
  pub robot_id: Uuid,
  pub capabilities: HashSet<String>,
  pub tenant_id: Option<String>,
  pub lease_ttl_ms: i64,
}

/// Outcome written back on a job's terminal transition (§4.2 RUNNING → {SUCCEEDED,FAILED,TIMED_OUT}).
#[derive(Debug, Clone)]
pub struct JobOutcome {
  pub state: JobState,
  pub result: Option<Value>,
  pub error: Option<Value>,
}

/// Heartbeat payload from an agent (§4.3): also renews the lease of every
/// job it's currently running.
#[derive(Debug, Clone)]
pub struct Heartbeat {
  pub robot_id: Uuid,
  pub running_job_ids: Vec<Uuid>,
  pub lease_ttl_ms: i64,
}

/// Per-tenant in-flight job counts used by admission control (§4.4).
pub type TenantConcurrency = HashMap<String, u32>;
