use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use casare_fleet::{RobotHeartbeat, RobotStore};
use casare_queue::{Heartbeat as LeaseHeartbeat, JobStore};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

/// Tracks the set of job-ids this agent is currently running, shared
/// between job tasks and the heartbeat loop (§4.3: heartbeat payload
/// includes `running-jobs`).
#[derive(Default)]
pub struct RunningJobs {
  ids: Mutex<HashSet<Uuid>>,
  count: AtomicU32,
}

impl RunningJobs {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(&self, job_id: Uuid) {
    self.ids.lock().unwrap().insert(job_id);
    self.count.fetch_add(1, Ordering::SeqCst);
  }

  pub fn remove(&self, job_id: Uuid) {
    if self.ids.lock().unwrap().remove(&job_id) {
      self.count.fetch_sub(1, Ordering::SeqCst);
    }
  }

  pub fn snapshot(&self) -> Vec<Uuid> {
    self.ids.lock().unwrap().iter().copied().collect()
  }

  pub fn count(&self) -> u32 {
    self.count.load(Ordering::SeqCst)
  }
}

/// Periodic heartbeat (§4.3, default 30s): reports this robot's status to
/// the fleet and renews the lease of every job it currently holds. Runs
/// until `cancel` fires.
#[allow(clippy::too_many_arguments)]
pub async fn run_heartbeat_loop(
  robot_id: Uuid,
  name: String,
  capabilities: HashSet<String>,
  max_concurrent_jobs: u32,
  running: Arc<RunningJobs>,
  robot_store: Arc<dyn RobotStore>,
  job_store: Arc<dyn JobStore>,
  interval: Duration,
  lease_ttl_ms: i64,
  cancel: CancellationToken,
) {
  let mut ticker = tokio::time::interval(interval);
  loop {
    tokio::select! {
      _ = cancel.cancelled() => {
        info!(%robot_id, "heartbeat loop stopping");
        break;
      }
      _ = ticker.tick() => {
        let heartbeat = RobotHeartbeat {
          robot_id,
          name: name.clone(),
          capabilities: capabilities.clone(),
          tags: HashSet::new(),
          max_concurrent_jobs,
          environment: None,
          current_job_count: running.count(),
          tenant_scope: None,
        };
        if let Err(err) = robot_store.heartbeat(heartbeat).await {
          warn!(%robot_id, error = %err, "failed to publish heartbeat");
        }

        let running_job_ids = running.snapshot();
        if !running_job_ids.is_empty() {
          let lease_heartbeat = LeaseHeartbeat { robot_id, running_job_ids, lease_ttl_ms };
          if let Err(err) = job_store.renew_leases(&lease_heartbeat).await {
            warn!(%robot_id, error = %err, "failed to renew job leases");
          }
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use casare_fleet::InMemoryRobotStore;
  use casare_queue::{ClaimRequest, InMemoryJobStore, NewJob};

  #[tokio::test]
  async fn heartbeat_loop_registers_the_robot_and_renews_leases() {
    let robot_id = Uuid::new_v4();
    let job_store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
    let robot_store: Arc<dyn RobotStore> = Arc::new(InMemoryRobotStore::new());

    let job = job_store.submit(NewJob::default()).await.unwrap();
    job_store
      .claim_next(&ClaimRequest { robot_id, capabilities: Default::default(), tenant_id: None, lease_ttl_ms: 50 })
      .await
      .unwrap();

    let running = Arc::new(RunningJobs::new());
    running.insert(job.job_id);

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    let handle = tokio::spawn(run_heartbeat_loop(
      robot_id,
      "agent-1".to_string(),
      ["browser".to_string()].into_iter().collect(),
      1,
      running,
      robot_store.clone(),
      job_store.clone(),
      Duration::from_millis(5),
      60_000,
      cancel_clone,
    ));

    tokio::time::sleep(Duration::from_millis(30)).await;
    cancel.cancel();
    handle.await.unwrap();

    let robot = robot_store.get(robot_id).await.unwrap();
    assert_eq!(robot.name, "agent-1");

    let reloaded = job_store.get(job.job_id).await.unwrap();
    assert!(reloaded.lease_expires_at.unwrap() > chrono::Utc::now());
  }
}
