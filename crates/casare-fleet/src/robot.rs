use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The closed vocabulary of robot capabilities (§3 Robot). Required
/// capabilities on a job are checked as a subset of a robot's set (P8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
  Browser,
  Desktop,
  Gpu,
  HighMemory,
  Secure,
  Cloud,
  OnPremise,
}

impl Capability {
  pub const ALL: [Capability; 7] = [
    Capability::Browser,
    Capability::Desktop,
    Capability::Gpu,
    Capability::HighMemory,
    Capability::Secure,
    Capability::Cloud,
    Capability::OnPremise,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      Capability::Browser => "browser",
      Capability::Desktop => "desktop",
      Capability::Gpu => "gpu",
      Capability::HighMemory => "high_memory",
      Capability::Secure => "secure",
      Capability::Cloud => "cloud",
      Capability::OnPremise => "on_premise",
    }
  }

  /// Robots and jobs carry capabilities as plain strings (they round-trip
  /// through Postgres `TEXT[]` columns); this validates a string against
  /// the closed vocabulary at the API boundary (§3 Robot).
  pub fn is_known(name: &str) -> bool {
    Self::ALL.iter().any(|c| c.as_str() == name)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RobotStatus {
  Online,
  Busy,
  Offline,
  Error,
  Maintenance,
}

/// The default interval after which a robot with no heartbeat is
/// considered OFFLINE (§3 Robot lifecycle).
pub const DEFAULT_HEARTBEAT_TIMEOUT_SECS: i64 = 90;

/// What an agent reports on each heartbeat (§4.3). Creates the robot row
/// on first heartbeat; every field but `robot_id` is simply overwritten on
/// each call, since the agent is the sole owner of this information.
#[derive(Debug, Clone)]
pub struct RobotHeartbeat {
  pub robot_id: Uuid,
  pub name: String,
  pub capabilities: HashSet<String>,
  pub tags: HashSet<String>,
  pub max_concurrent_jobs: u32,
  pub environment: Option<String>,
  pub current_job_count: u32,
  pub tenant_scope: Option<String>,
}

/// A registered execution target (§3 Robot). `status` here is the value
/// most recently *computed*, not necessarily live — callers that need a
/// fresh answer should call `RobotStore::list`/`get` instead of reading
/// a stale `Robot` they're holding onto.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Robot {
  pub robot_id: Uuid,
  pub name: String,
  pub capabilities: HashSet<String>,
  pub tags: HashSet<String>,
  pub max_concurrent_jobs: u32,
  pub environment: Option<String>,
  pub last_heartbeat_at: DateTime<Utc>,
  pub status: RobotStatus,
  pub current_job_count: u32,
  pub tenant_scope: Option<String>,
}

impl Robot {
  pub fn new(robot_id: Uuid, name: impl Into<String>, capabilities: HashSet<String>) -> Self {
    Self {
      robot_id,
      name: name.into(),
      capabilities,
      tags: HashSet::new(),
      max_concurrent_jobs: 1,
      environment: None,
      last_heartbeat_at: Utc::now(),
      status: RobotStatus::Online,
      current_job_count: 0,
      tenant_scope: None,
    }
  }

  /// Re-derive `status` from `last_heartbeat_at`/`current_job_count` at the
  /// instant `now` (§3 Robot lifecycle). An explicit ERROR/MAINTENANCE
  /// status set by an operator is preserved unless the heartbeat has also
  /// gone stale, which always wins.
  pub fn effective_status(&self, now: DateTime<Utc>, heartbeat_timeout_secs: i64) -> RobotStatus {
    if (now - self.last_heartbeat_at).num_seconds() > heartbeat_timeout_secs {
      return RobotStatus::Offline;
    }
    match self.status {
      RobotStatus::Error | RobotStatus::Maintenance => self.status,
      _ if self.current_job_count >= self.max_concurrent_jobs => RobotStatus::Busy,
      _ => RobotStatus::Online,
    }
  }

  pub fn has_capabilities(&self, required: &HashSet<String>) -> bool {
    required.is_subset(&self.capabilities)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Duration;

  fn robot() -> Robot {
    Robot::new(Uuid::new_v4(), "robot-1", ["browser".to_string()].into_iter().collect())
  }

  #[test]
  fn stale_heartbeat_is_offline_even_if_marked_online() {
    let mut r = robot();
    r.last_heartbeat_at = Utc::now() - Duration::seconds(200);
    assert_eq!(r.effective_status(Utc::now(), DEFAULT_HEARTBEAT_TIMEOUT_SECS), RobotStatus::Offline);
  }

  #[test]
  fn full_capacity_reports_busy() {
    let mut r = robot();
    r.max_concurrent_jobs = 2;
    r.current_job_count = 2;
    assert_eq!(r.effective_status(Utc::now(), DEFAULT_HEARTBEAT_TIMEOUT_SECS), RobotStatus::Busy);
  }

  #[test]
  fn capability_subset_check() {
    let r = robot();
    let required: HashSet<String> = ["browser".to_string()].into_iter().collect();
    assert!(r.has_capabilities(&required));
    let required: HashSet<String> = ["browser".to_string(), "gpu".to_string()].into_iter().collect();
    assert!(!r.has_capabilities(&required));
  }
}
