use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// Failures surfaced by the HTTP/WS API. Maps to a status code at the
/// response boundary; callers elsewhere in the crate just propagate it
/// with `?`.
#[derive(Debug, Error)]
pub enum OrchestratorError {
  #[error(transparent)]
  Config(#[from] casare_app_config::ConfigError),

  #[error(transparent)]
  Queue(#[from] casare_queue::QueueError),

  #[error(transparent)]
  Fleet(#[from] casare_fleet::FleetError),

  #[error("job {0} not found")]
  JobNotFound(Uuid),

  #[error("missing or invalid authorization header")]
  Unauthorized,

  #[error("malformed request body: {0}")]
  BadRequest(String),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

impl IntoResponse for OrchestratorError {
  fn into_response(self) -> Response {
    let status = match &self {
      OrchestratorError::JobNotFound(_) => StatusCode::NOT_FOUND,
      OrchestratorError::Unauthorized => StatusCode::UNAUTHORIZED,
      OrchestratorError::BadRequest(_) => StatusCode::BAD_REQUEST,
      OrchestratorError::Queue(casare_queue::QueueError::NotFound(_)) => StatusCode::NOT_FOUND,
      OrchestratorError::Config(_) | OrchestratorError::Queue(_) | OrchestratorError::Fleet(_) | OrchestratorError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({"error": self.to_string()}))).into_response()
  }
}
