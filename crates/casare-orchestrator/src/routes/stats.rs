use std::collections::HashMap;

use axum::extract::State;
use axum::Json;
use casare_queue::JobState;
use serde::Serialize;

use crate::error::OrchestratorError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct StatsResponse {
  pub queue_depth: HashMap<JobState, u32>,
}

/// `GET /stats`: queue depth by state, for operators watching backlog grow.
pub async fn stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, OrchestratorError> {
  let queue_depth = state.job_store.queue_depth().await?.into_iter().collect();
  Ok(Json(StatsResponse { queue_depth }))
}
