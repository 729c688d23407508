use std::collections::HashSet;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use casare_queue::{JobState, NewJob};

use crate::error::OrchestratorError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SubmitJobRequest {
  pub workflow: Value,
  #[serde(default)]
  pub inputs: Value,
  #[serde(default)]
  pub priority: i32,
  #[serde(default)]
  pub required_capabilities: HashSet<String>,
  #[serde(default)]
  pub tenant_id: Option<String>,
  #[serde(default = "default_max_attempts")]
  pub max_attempts: i32,
}

fn default_max_attempts() -> i32 {
  1
}

#[derive(Debug, Serialize)]
pub struct SubmitJobResponse {
  pub job_id: Uuid,
}

/// `POST /jobs` (§6). The workflow's own `workflow_id` is what override
/// lookups key on, so capabilities are widened against whatever overrides
/// apply to that id before the job ever reaches the queue.
pub async fn submit_job(State(state): State<AppState>, Json(body): Json<SubmitJobRequest>) -> Result<(StatusCode, Json<SubmitJobResponse>), OrchestratorError> {
  let workflow_id = body.workflow.get("workflow_id").and_then(Value::as_str).unwrap_or_default().to_string();

  let required_capabilities = {
    let overrides = state.overrides.lock().unwrap();
    overrides.effective_required_capabilities(&workflow_id, &body.required_capabilities)
  };

  let new_job = NewJob {
    workflow: body.workflow,
    inputs: if body.inputs.is_null() { Value::Object(serde_json::Map::new()) } else { body.inputs },
    priority: body.priority,
    required_capabilities,
    tenant_id: body.tenant_id,
    max_attempts: body.max_attempts,
  };

  let job = state.job_store.submit(new_job).await?;
  Ok((StatusCode::CREATED, Json(SubmitJobResponse { job_id: job.job_id })))
}

#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
  pub state: JobState,
  pub progress: Option<f64>,
  pub assigned_robot_id: Option<Uuid>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub result: Option<Value>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<Value>,
}

/// `GET /jobs/:id` (§6). `progress` is derived from the `executed_count`/
/// `total_reachable` pair the agent stashes in `result` on completion; a
/// job that hasn't finished (or failed before executing a single node)
/// reports `null` rather than a guess.
pub async fn get_job(State(state): State<AppState>, Path(job_id): Path<Uuid>) -> Result<Json<JobStatusResponse>, OrchestratorError> {
  let job = state.job_store.get(job_id).await?;

  let progress = job.result.as_ref().and_then(|r| {
    let executed = r.0.get("executed_count")?.as_f64()?;
    let total = r.0.get("total_reachable")?.as_f64()?;
    if total > 0.0 {
      Some(executed / total)
    } else {
      None
    }
  });

  Ok(Json(JobStatusResponse {
    state: job.state,
    progress,
    assigned_robot_id: job.assigned_robot_id,
    result: job.result.map(|r| r.0),
    error: job.error.map(|e| e.0),
  }))
}

/// `POST /jobs/:id/cancel` (§6). Only flips `cancel_requested`; the agent
/// observes it on its own poll and tears the run down (§4.2 J4).
pub async fn cancel_job(State(state): State<AppState>, Path(job_id): Path<Uuid>) -> Result<StatusCode, OrchestratorError> {
  state.job_store.request_cancel(job_id).await?;
  Ok(StatusCode::ACCEPTED)
}

/// `POST /jobs/:id/pause` (§6). Requires the job to currently be assigned
/// to a robot — an unassigned job is still QUEUED and there is no running
/// execution to pause.
pub async fn pause_job(State(state): State<AppState>, Path(job_id): Path<Uuid>) -> Result<StatusCode, OrchestratorError> {
  let job = state.job_store.get(job_id).await?;
  let robot_id = job.assigned_robot_id.ok_or_else(|| OrchestratorError::BadRequest(format!("job {job_id} is not assigned to a robot")))?;
  state.job_store.mark_paused(job_id, robot_id).await?;
  Ok(StatusCode::ACCEPTED)
}

/// `POST /jobs/:id/resume` (§6).
pub async fn resume_job(State(state): State<AppState>, Path(job_id): Path<Uuid>) -> Result<StatusCode, OrchestratorError> {
  let job = state.job_store.get(job_id).await?;
  let robot_id = job.assigned_robot_id.ok_or_else(|| OrchestratorError::BadRequest(format!("job {job_id} is not assigned to a robot")))?;
  state.job_store.mark_resumed(job_id, robot_id).await?;
  Ok(StatusCode::ACCEPTED)
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use casare_fleet::{InMemoryRobotStore, UnlimitedAdmission};
  use casare_queue::InMemoryJobStore;

  use super::*;

  fn test_state() -> AppState {
    AppState::new(Arc::new(InMemoryJobStore::new()), Arc::new(InMemoryRobotStore::new()), Arc::new(UnlimitedAdmission), None)
  }

  #[tokio::test]
  async fn submit_then_fetch_round_trips_through_the_store() {
    let state = test_state();
    let body = SubmitJobRequest {
      workflow: serde_json::json!({"workflow_id": "wf1"}),
      inputs: serde_json::json!({}),
      priority: 0,
      required_capabilities: HashSet::new(),
      tenant_id: Some("acme".to_string()),
      max_attempts: 1,
    };

    let (status, Json(submitted)) = submit_job(State(state.clone()), Json(body)).await.unwrap();
    assert_eq!(status, StatusCode::CREATED);

    let Json(fetched) = get_job(State(state), Path(submitted.job_id)).await.unwrap();
    assert_eq!(fetched.state, JobState::Queued);
    assert_eq!(fetched.assigned_robot_id, None);
    assert!(fetched.progress.is_none());
  }

  #[tokio::test]
  async fn pause_without_assignment_is_a_bad_request() {
    let state = test_state();
    let body = SubmitJobRequest {
      workflow: serde_json::json!({"workflow_id": "wf1"}),
      inputs: serde_json::json!({}),
      priority: 0,
      required_capabilities: HashSet::new(),
      tenant_id: None,
      max_attempts: 1,
    };
    let (_, Json(submitted)) = submit_job(State(state.clone()), Json(body)).await.unwrap();
    let err = pause_job(State(state), Path(submitted.job_id)).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::BadRequest(_)));
  }
}
