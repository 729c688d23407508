use axum::extract::State;
use axum::Json;

use casare_fleet::Robot;

use crate::error::OrchestratorError;
use crate::state::AppState;

/// `GET /robots` (§6): the fleet listing clients poll to see what's
/// registered and how busy it is.
pub async fn list_robots(State(state): State<AppState>) -> Result<Json<Vec<Robot>>, OrchestratorError> {
  let robots = state.robot_store.list().await?;
  Ok(Json(robots))
}
