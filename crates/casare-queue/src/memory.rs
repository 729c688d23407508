use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::types::Json;
use uuid::Uuid;

use crate::error::QueueError;
use crate::store::JobStore;
use crate::types::{ClaimRequest, Heartbeat, Job, JobOutcome, JobState, NewJob};

/// An in-process `JobStore` used by this crate's own tests and by
/// `casare-agent`/`casare-orchestrator` tests that don't want a live
/// Postgres instance — mirrors how `fuschia-store::Store` is defined as a
/// trait specifically so it can be faked.
pub struct InMemoryJobStore {
  jobs: Mutex<HashMap<Uuid, Job>>,
  quotas: Mutex<HashMap<String, u32>>,
}

impl InMemoryJobStore {
  pub fn new() -> Self {
    Self { jobs: Mutex::new(HashMap::new()), quotas: Mutex::new(HashMap::new()) }
  }

  fn tenant_in_flight_locked(jobs: &HashMap<Uuid, Job>, tenant_id: &str) -> u32 {
    jobs
      .values()
      .filter(|j| j.tenant_id.as_deref() == Some(tenant_id) && matches!(j.state, JobState::Claimed | JobState::Running | JobState::Paused))
      .count() as u32
  }
}

impl Default for InMemoryJobStore {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
  async fn submit(&self, job: NewJob) -> Result<Job, QueueError> {
    let row = Job {
      job_id: Uuid::new_v4(),
      workflow: Json(job.workflow),
      inputs: Json(job.inputs),
      priority: job.priority,
      state: JobState::Queued,
      assigned_robot_id: None,
      lease_expires_at: None,
      claimed_at: None,
      started_at: None,
      finished_at: None,
      attempt_count: 0,
      max_attempts: job.max_attempts,
      required_capabilities: job.required_capabilities.into_iter().collect(),
      tenant_id: job.tenant_id,
      result: None,
      error: None,
      created_at: Utc::now(),
    };
    self.jobs.lock().unwrap().insert(row.job_id, row.clone());
    Ok(row)
  }

  async fn get(&self, job_id: Uuid) -> Result<Job, QueueError> {
    self.jobs.lock().unwrap().get(&job_id).cloned().ok_or(QueueError::NotFound(job_id))
  }

  async fn claim_next(&self, request: &ClaimRequest) -> Result<Option<Job>, QueueError> {
    let mut jobs = self.jobs.lock().unwrap();
    let quotas = self.quotas.lock().unwrap();

    let mut candidates: Vec<Uuid> = jobs
      .values()
      .filter(|j| {
        j.state == JobState::Queued
          && j.required_capabilities.iter().all(|c| request.capabilities.contains(c))
          && (j.tenant_id.is_none() || j.tenant_id == request.tenant_id)
      })
      .filter(|j| match j.tenant_id.as_deref().and_then(|t| quotas.get(t)) {
        Some(&quota) => Self::tenant_in_flight_locked(&jobs, j.tenant_id.as_deref().unwrap()) < quota,
        None => true,
      })
      .map(|j| j.job_id)
      .collect();
    drop(quotas);

    candidates.sort_by(|a, b| {
      let ja = &jobs[a];
      let jb = &jobs[b];
      jb.priority.cmp(&ja.priority).then(ja.created_at.cmp(&jb.created_at))
    });

    let Some(&job_id) = candidates.first() else { return Ok(None) };
    let job = jobs.get_mut(&job_id).unwrap();
    job.state = JobState::Claimed;
    job.assigned_robot_id = Some(request.robot_id);
    job.lease_expires_at = Some(Utc::now() + Duration::milliseconds(request.lease_ttl_ms));
    job.claimed_at = Some(Utc::now());
    Ok(Some(job.clone()))
  }

  async fn set_tenant_quota(&self, tenant_id: &str, max_concurrent_jobs: Option<u32>) -> Result<(), QueueError> {
    let mut quotas = self.quotas.lock().unwrap();
    match max_concurrent_jobs {
      Some(quota) => {
        quotas.insert(tenant_id.to_string(), quota);
      }
      None => {
        quotas.remove(tenant_id);
      }
    }
    Ok(())
  }

  async fn mark_running(&self, job_id: Uuid, robot_id: Uuid) -> Result<(), QueueError> {
    let mut jobs = self.jobs.lock().unwrap();
    if let Some(job) = jobs.get_mut(&job_id) {
      if job.assigned_robot_id == Some(robot_id) {
        job.state = JobState::Running;
        job.started_at = Some(Utc::now());
      }
    }
    Ok(())
  }

  async fn mark_paused(&self, job_id: Uuid, robot_id: Uuid) -> Result<(), QueueError> {
    let mut jobs = self.jobs.lock().unwrap();
    if let Some(job) = jobs.get_mut(&job_id) {
      if job.assigned_robot_id == Some(robot_id) {
        job.state = JobState::Paused;
      }
    }
    Ok(())
  }

  async fn mark_resumed(&self, job_id: Uuid, robot_id: Uuid) -> Result<(), QueueError> {
    let mut jobs = self.jobs.lock().unwrap();
    if let Some(job) = jobs.get_mut(&job_id) {
      if job.assigned_robot_id == Some(robot_id) {
        job.state = JobState::Running;
      }
    }
    Ok(())
  }

  async fn complete(&self, job_id: Uuid, robot_id: Uuid, outcome: JobOutcome) -> Result<bool, QueueError> {
    let mut jobs = self.jobs.lock().unwrap();
    let Some(job) = jobs.get_mut(&job_id) else { return Ok(false) };
    if job.assigned_robot_id != Some(robot_id) || job.lease_expires_at.is_none_or(|t| t <= Utc::now()) {
      return Ok(false);
    }

    if outcome.state == JobState::Failed {
      job.attempt_count += 1;
      if job.attempt_count < job.max_attempts {
        job.state = JobState::Queued;
        job.assigned_robot_id = None;
        job.lease_expires_at = None;
      } else {
        job.state = JobState::Failed;
        job.finished_at = Some(Utc::now());
      }
      job.error = outcome.error.map(Json);
    } else {
      job.state = outcome.state;
      job.result = outcome.result.map(Json);
      job.error = outcome.error.map(Json);
      job.finished_at = Some(Utc::now());
    }
    Ok(true)
  }

  async fn renew_leases(&self, heartbeat: &Heartbeat) -> Result<(), QueueError> {
    let mut jobs = self.jobs.lock().unwrap();
    for job_id in &heartbeat.running_job_ids {
      if let Some(job) = jobs.get_mut(job_id) {
        if job.assigned_robot_id == Some(heartbeat.robot_id) {
          job.lease_expires_at = Some(Utc::now() + Duration::milliseconds(heartbeat.lease_ttl_ms));
        }
      }
    }
    Ok(())
  }

  async fn request_cancel(&self, job_id: Uuid) -> Result<(), QueueError> {
    let mut jobs = self.jobs.lock().unwrap();
    if let Some(job) = jobs.get_mut(&job_id) {
      if !job.state.is_terminal() {
        job.state = JobState::Cancelled;
        job.finished_at = Some(Utc::now());
      }
    }
    Ok(())
  }

  async fn reap_expired_leases(&self) -> Result<Vec<Uuid>, QueueError> {
    let mut jobs = self.jobs.lock().unwrap();
    let mut swept = Vec::new();
    let now = Utc::now();
    for job in jobs.values_mut() {
      let expired = matches!(job.state, JobState::Claimed | JobState::Running | JobState::Paused)
        && job.lease_expires_at.is_some_and(|t| t < now);
      if !expired {
        continue;
      }
      if job.attempt_count < job.max_attempts {
        job.state = JobState::Queued;
        job.assigned_robot_id = None;
        job.lease_expires_at = None;
        job.attempt_count += 1;
      } else {
        job.state = JobState::Failed;
        job.finished_at = Some(now);
        job.error = Some(Json(serde_json::json!({"kind": "LEASE_EXPIRED", "message": "lease expired and max attempts exhausted"})));
      }
      swept.push(job.job_id);
    }
    Ok(swept)
  }

  async fn tenant_in_flight(&self, tenant_id: &str) -> Result<u32, QueueError> {
    let jobs = self.jobs.lock().unwrap();
    Ok(
      jobs
        .values()
        .filter(|j| j.tenant_id.as_deref() == Some(tenant_id) && matches!(j.state, JobState::Claimed | JobState::Running | JobState::Paused))
        .count() as u32,
    )
  }

  async fn queue_depth(&self) -> Result<Vec<(JobState, u32)>, QueueError> {
    let jobs = self.jobs.lock().unwrap();
    let mut counts: HashMap<JobState, u32> = HashMap::new();
    for job in jobs.values() {
      *counts.entry(job.state).or_insert(0) += 1;
    }
    Ok(counts.into_iter().collect())
  }

  async fn list_active(&self) -> Result<Vec<Job>, QueueError> {
    let jobs = self.jobs.lock().unwrap();
    Ok(jobs.values().filter(|j| !j.state.is_terminal()).cloned().collect())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn request(robot_id: Uuid, caps: &[&str]) -> ClaimRequest {
    ClaimRequest {
      robot_id,
      capabilities: caps.iter().map(|s| s.to_string()).collect(),
      tenant_id: None,
      lease_ttl_ms: 60_000,
    }
  }

  #[tokio::test]
  async fn claim_respects_capability_subset() {
    let store = InMemoryJobStore::new();
    let mut job = NewJob::default();
    job.required_capabilities.insert("gpu".to_string());
    store.submit(job).await.unwrap();

    let robot = Uuid::new_v4();
    let claimed = store.claim_next(&request(robot, &["browser"])).await.unwrap();
    assert!(claimed.is_none());

    let claimed = store.claim_next(&request(robot, &["browser", "gpu"])).await.unwrap();
    assert!(claimed.is_some());
  }

  #[tokio::test]
  async fn claim_orders_by_priority_then_fifo() {
    let store = InMemoryJobStore::new();
    let mut low = NewJob::default();
    low.priority = 1;
    let mut high = NewJob::default();
    high.priority = 10;
    store.submit(low).await.unwrap();
    let high_job = store.submit(high).await.unwrap();

    let robot = Uuid::new_v4();
    let claimed = store.claim_next(&request(robot, &[])).await.unwrap().unwrap();
    assert_eq!(claimed.job_id, high_job.job_id);
  }

  #[tokio::test]
  async fn tenant_at_quota_is_held_in_queue() {
    let store = InMemoryJobStore::new();
    store.set_tenant_quota("acme", Some(1)).await.unwrap();

    let mut first = NewJob::default();
    first.tenant_id = Some("acme".to_string());
    let mut second = NewJob::default();
    second.tenant_id = Some("acme".to_string());
    store.submit(first).await.unwrap();
    store.submit(second).await.unwrap();

    let robot = Uuid::new_v4();
    let req = ClaimRequest { robot_id: robot, capabilities: Default::default(), tenant_id: Some("acme".to_string()), lease_ttl_ms: 60_000 };

    let first_claim = store.claim_next(&req).await.unwrap();
    assert!(first_claim.is_some());

    let second_claim = store.claim_next(&req).await.unwrap();
    assert!(second_claim.is_none(), "acme is already at its quota of 1 in-flight job");

    store.set_tenant_quota("acme", None).await.unwrap();
    let second_claim = store.claim_next(&req).await.unwrap();
    assert!(second_claim.is_some(), "clearing the quota should let the held job through");
  }

  #[tokio::test]
  async fn failed_job_under_max_attempts_returns_to_queued() {
    let store = InMemoryJobStore::new();
    let mut new_job = NewJob::default();
    new_job.max_attempts = 3;
    let job = store.submit(new_job).await.unwrap();
    let robot = Uuid::new_v4();
    store.claim_next(&request(robot, &[])).await.unwrap();

    let requeued = store
      .complete(job.job_id, robot, JobOutcome { state: JobState::Failed, result: None, error: Some(serde_json::json!("boom")) })
      .await
      .unwrap();
    assert!(requeued);
    let reloaded = store.get(job.job_id).await.unwrap();
    assert_eq!(reloaded.state, JobState::Queued);
    assert_eq!(reloaded.attempt_count, 1);
  }

  #[tokio::test]
  async fn failed_job_at_max_attempts_terminally_fails() {
    let store = InMemoryJobStore::new();
    let mut new_job = NewJob::default();
    new_job.max_attempts = 1;
    let job = store.submit(new_job).await.unwrap();
    let robot = Uuid::new_v4();
    store.claim_next(&request(robot, &[])).await.unwrap();

    store
      .complete(job.job_id, robot, JobOutcome { state: JobState::Failed, result: None, error: Some(serde_json::json!("boom")) })
      .await
      .unwrap();
    let reloaded = store.get(job.job_id).await.unwrap();
    assert_eq!(reloaded.state, JobState::Failed);
  }

  #[tokio::test]
  async fn cancel_is_a_no_op_on_terminal_jobs() {
    let store = InMemoryJobStore::new();
    let job = store.submit(NewJob::default()).await.unwrap();
    let robot = Uuid::new_v4();
    store.claim_next(&request(robot, &[])).await.unwrap();
    store
      .complete(job.job_id, robot, JobOutcome { state: JobState::Succeeded, result: Some(serde_json::json!({})), error: None })
      .await
      .unwrap();
    store.request_cancel(job.job_id).await.unwrap();
    let reloaded = store.get(job.job_id).await.unwrap();
    assert_eq!(reloaded.state, JobState::Succeeded);
  }

  #[tokio::test]
  async fn reap_requeues_under_max_attempts_and_fails_when_exhausted() {
    let store = InMemoryJobStore::new();
    let mut new_job = NewJob::default();
    new_job.max_attempts = 2;
    let job = store.submit(new_job).await.unwrap();
    let robot = Uuid::new_v4();
    let claim_req = ClaimRequest { robot_id: robot, capabilities: Default::default(), tenant_id: None, lease_ttl_ms: -1 };
    store.claim_next(&claim_req).await.unwrap();

    let swept = store.reap_expired_leases().await.unwrap();
    assert_eq!(swept, vec![job.job_id]);
    let reloaded = store.get(job.job_id).await.unwrap();
    assert_eq!(reloaded.state, JobState::Queued);
    assert_eq!(reloaded.attempt_count, 1);

    store.claim_next(&claim_req).await.unwrap();
    let swept = store.reap_expired_leases().await.unwrap();
    assert_eq!(swept, vec![job.job_id]);
    let reloaded = store.get(job.job_id).await.unwrap();
    assert_eq!(reloaded.state, JobState::Failed);
  }

  #[tokio::test]
  async fn tenant_in_flight_counts_non_terminal_jobs() {
    let store = InMemoryJobStore::new();
    let mut job = NewJob::default();
    job.tenant_id = Some("acme".to_string());
    store.submit(job).await.unwrap();
    assert_eq!(store.tenant_in_flight("acme").await.unwrap(), 0);

    let mut claim_req = request(Uuid::new_v4(), &[]);
    claim_req.tenant_id = Some("acme".to_string());
    store.claim_next(&claim_req).await.unwrap();
    assert_eq!(store.tenant_in_flight("acme").await.unwrap(), 1);
  }
}
