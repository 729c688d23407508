use std::collections::HashMap;
use std::time::Duration;

use casare_fleet::AdmissionPolicy;
use casare_queue::{Job, JobState, JobStore};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

use crate::state::{AppState, WsFrame};

/// Diffs successive snapshots of non-terminal jobs to synthesize `/events`
/// frames and to keep `AppState.admission` (an in-process approximation
/// used for quick `admit` checks) in step with what `claim_next`'s own
/// `tenant_quotas` query actually enforces. There is no Postgres LISTEN/
/// NOTIFY wired up, so this is a plain poll loop (§6 event stream).
pub async fn run_event_poller(state: AppState, poll_interval: Duration, shutdown: CancellationToken) {
  let mut last_state: HashMap<Uuid, JobState> = HashMap::new();
  let mut ticker = tokio::time::interval(poll_interval);

  loop {
    tokio::select! {
      _ = shutdown.cancelled() => break,
      _ = ticker.tick() => {}
    }

    let active = match state.job_store.list_active().await {
      Ok(jobs) => jobs,
      Err(err) => {
        warn!(error = %err, "event poller failed to list active jobs");
        continue;
      }
    };

    let mut seen: HashMap<Uuid, JobState> = HashMap::with_capacity(active.len());
    for job in &active {
      seen.insert(job.job_id, job.state);
      if last_state.get(&job.job_id) != Some(&job.state) {
        emit_transition(&state, job);
        if job.state == JobState::Claimed {
          state.admission.on_claimed(job.tenant_id.as_deref());
        }
      }
    }

    for (job_id, prior) in &last_state {
      if !seen.contains_key(job_id) && !prior.is_terminal() {
        if let Ok(job) = state.job_store.get(*job_id).await {
          emit_transition(&state, &job);
          state.admission.on_terminal(job.tenant_id.as_deref());
        }
      }
    }

    last_state = seen;
  }
}

fn emit_transition(state: &AppState, job: &Job) {
  let frame = WsFrame {
    frame_type: format!("JOB_{:?}", job.state).to_uppercase(),
    ts: chrono::Utc::now(),
    job_id: job.job_id,
    node_id: None,
    payload: serde_json::json!({
      "state": job.state,
      "assigned_robot_id": job.assigned_robot_id,
    }),
  };
  let _ = state.events.send(frame);
}
