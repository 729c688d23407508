use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::error::FleetError;
use crate::robot::{Robot, RobotHeartbeat, RobotStatus, DEFAULT_HEARTBEAT_TIMEOUT_SECS};
use crate::store::RobotStore;

/// In-process `RobotStore` used by this crate's own tests and by
/// `casare-agent`/`casare-orchestrator` tests that don't want a live
/// Postgres instance — mirrors `casare_queue::InMemoryJobStore`.
pub struct InMemoryRobotStore {
  robots: Mutex<HashMap<Uuid, Robot>>,
  heartbeat_timeout_secs: i64,
}

impl InMemoryRobotStore {
  pub fn new() -> Self {
    Self::with_heartbeat_timeout(DEFAULT_HEARTBEAT_TIMEOUT_SECS)
  }

  pub fn with_heartbeat_timeout(heartbeat_timeout_secs: i64) -> Self {
    Self {
      robots: Mutex::new(HashMap::new()),
      heartbeat_timeout_secs,
    }
  }
}

impl Default for InMemoryRobotStore {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl RobotStore for InMemoryRobotStore {
  async fn heartbeat(&self, heartbeat: RobotHeartbeat) -> Result<Robot, FleetError> {
    let mut robots = self.robots.lock().unwrap();
    let is_new = !robots.contains_key(&heartbeat.robot_id);
    let robot = robots
      .entry(heartbeat.robot_id)
      .or_insert_with(|| Robot::new(heartbeat.robot_id, &heartbeat.name, heartbeat.capabilities.clone()));
    robot.name = heartbeat.name.clone();
    robot.capabilities = heartbeat.capabilities;
    robot.tags = heartbeat.tags;
    robot.max_concurrent_jobs = heartbeat.max_concurrent_jobs;
    robot.environment = heartbeat.environment;
    robot.current_job_count = heartbeat.current_job_count;
    robot.tenant_scope = heartbeat.tenant_scope;
    robot.last_heartbeat_at = Utc::now();
    if is_new {
      info!(robot_id = %heartbeat.robot_id, name = %heartbeat.name, "robot registered");
    }
    Ok(robot.clone())
  }

  async fn get(&self, robot_id: Uuid) -> Result<Robot, FleetError> {
    self.robots.lock().unwrap().get(&robot_id).cloned().ok_or(FleetError::UnknownRobot(robot_id))
  }

  async fn list(&self) -> Result<Vec<Robot>, FleetError> {
    let now = Utc::now();
    Ok(
      self
        .robots
        .lock()
        .unwrap()
        .values()
        .cloned()
        .map(|mut robot| {
          robot.status = robot.effective_status(now, self.heartbeat_timeout_secs);
          robot
        })
        .collect(),
    )
  }

  async fn set_status(&self, robot_id: Uuid, status: RobotStatus) -> Result<(), FleetError> {
    let mut robots = self.robots.lock().unwrap();
    let robot = robots.get_mut(&robot_id).ok_or(FleetError::UnknownRobot(robot_id))?;
    robot.status = status;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn heartbeat(robot_id: Uuid) -> RobotHeartbeat {
    RobotHeartbeat {
      robot_id,
      name: "r1".to_string(),
      capabilities: ["browser".to_string()].into_iter().collect(),
      tags: Default::default(),
      max_concurrent_jobs: 1,
      environment: None,
      current_job_count: 0,
      tenant_scope: None,
    }
  }

  #[tokio::test]
  async fn first_heartbeat_creates_the_robot() {
    let store = InMemoryRobotStore::new();
    let id = Uuid::new_v4();
    store.heartbeat(heartbeat(id)).await.unwrap();
    let robot = store.get(id).await.unwrap();
    assert_eq!(robot.name, "r1");
  }

  #[tokio::test]
  async fn list_recomputes_offline_status_from_stale_heartbeat() {
    let store = InMemoryRobotStore::with_heartbeat_timeout(0);
    let id = Uuid::new_v4();
    store.heartbeat(heartbeat(id)).await.unwrap();
    std::thread::sleep(std::time::Duration::from_millis(10));
    let listed = store.list().await.unwrap();
    assert_eq!(listed[0].status, RobotStatus::Offline);
  }

  #[tokio::test]
  async fn unknown_robot_lookup_errors() {
    let store = InMemoryRobotStore::new();
    assert!(matches!(store.get(Uuid::new_v4()).await, Err(FleetError::UnknownRobot(_))));
  }
}
